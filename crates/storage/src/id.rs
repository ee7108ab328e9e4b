use std::fmt;

use serde::{Deserialize, Serialize};

/// Length of an activation id in bytes.
pub const ACTIVATION_ID_LENGTH: usize = 32;

/// Opaque identifier of a single activation: 32 lowercase hex characters.
///
/// Ids are assigned once by the producer when the activation is recorded;
/// this crate only parses and compares them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActivationId(String);

/// Reasons an activation id fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("activation id length is {actual} but must be {expected} bytes")]
    Length { actual: usize, expected: usize },

    #[error("activation id is malformed")]
    Malformed,
}

impl ActivationId {
    /// Parse an activation id, checking length before shape.
    pub fn parse(value: &str) -> Result<Self, IdError> {
        if value.len() != ACTIVATION_ID_LENGTH {
            return Err(IdError::Length {
                actual: value.len(),
                expected: ACTIVATION_ID_LENGTH,
            });
        }
        if !value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(IdError::Malformed);
        }
        Ok(Self(value.to_string()))
    }

    /// Generate a fresh random id.
    pub fn generate() -> Self {
        let bytes: [u8; ACTIVATION_ID_LENGTH / 2] = rand::random();
        let hex = bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Smallest possible key; sorts before every valid id.
    pub(crate) fn min_key() -> Self {
        Self(String::new())
    }
}

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ActivationId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ActivationId> for String {
    fn from(id: ActivationId) -> Self {
        id.0
    }
}
