//! Server configuration: TOML file, then environment, then command-line flags.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use actlog_query::{Identity, ListLimits, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use actlog_storage::Namespace;
use serde::Deserialize;

pub(crate) const ERR_INVALID_CONFIG: &str = "ERR_INVALID_CONFIG";
pub(crate) const ERR_CONFIG_UNREADABLE: &str = "ERR_CONFIG_UNREADABLE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StartupError {
    pub(crate) code: &'static str,
    pub(crate) message: String,
}

impl StartupError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: ERR_INVALID_CONFIG,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StartupError {}

/// One API key and the identity it authenticates as.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Credential {
    pub(crate) key: String,
    pub(crate) subject: String,
    pub(crate) namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServerConfig {
    pub(crate) bind: IpAddr,
    pub(crate) port: u16,
    pub(crate) list_limit_default: usize,
    pub(crate) list_limit_max: usize,
    /// Interval between view refreshes, in milliseconds.
    pub(crate) refresh_interval_ms: u64,
    /// Requests per minute per client IP.
    pub(crate) rate_limit: u64,
    pub(crate) credentials: Vec<Credential>,
    /// JSON-lines files loaded into the store at startup.
    pub(crate) records: Vec<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            port: 8080,
            list_limit_default: DEFAULT_LIST_LIMIT,
            list_limit_max: MAX_LIST_LIMIT,
            refresh_interval_ms: 100,
            rate_limit: 600,
            credentials: Vec::new(),
            records: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Read the config file, if any. Record paths in the file are resolved
    /// against the file's directory.
    pub(crate) fn from_file(path: &Path) -> Result<Self, StartupError> {
        let text = std::fs::read_to_string(path).map_err(|err| StartupError {
            code: ERR_CONFIG_UNREADABLE,
            message: format!("failed to read '{}': {err}", path.display()),
        })?;
        let mut config = Self::from_toml(&text)
            .map_err(|err| StartupError::invalid(format!("{}: {err}", path.display())))?;
        if let Some(dir) = path.parent() {
            for record in &mut config.records {
                if record.is_relative() {
                    *record = dir.join(&*record);
                }
            }
        }
        Ok(config)
    }

    pub(crate) fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `ACTLOG_*` overrides. Empty values are ignored.
    pub(crate) fn apply_env<F>(&mut self, lookup: F) -> Result<(), StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = parse_env(&lookup, "ACTLOG_PORT")? {
            self.port = port;
        }
        if let Some(rate_limit) = parse_env(&lookup, "ACTLOG_RATE_LIMIT")? {
            self.rate_limit = rate_limit;
        }
        if let Some(interval) = parse_env(&lookup, "ACTLOG_REFRESH_INTERVAL_MS")? {
            self.refresh_interval_ms = interval;
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<(), StartupError> {
        if self.list_limit_max == 0 {
            return Err(StartupError::invalid("list_limit_max must be positive"));
        }
        if self.list_limit_default == 0 || self.list_limit_default > self.list_limit_max {
            return Err(StartupError::invalid(format!(
                "list_limit_default must be between 1 and list_limit_max ({})",
                self.list_limit_max
            )));
        }
        if self.refresh_interval_ms == 0 {
            return Err(StartupError::invalid("refresh_interval_ms must be positive"));
        }
        if self.rate_limit == 0 {
            return Err(StartupError::invalid("rate_limit must be positive"));
        }
        let mut keys = HashSet::new();
        for credential in &self.credentials {
            if credential.key.is_empty() {
                return Err(StartupError::invalid("credential key must not be empty"));
            }
            if !keys.insert(credential.key.as_str()) {
                return Err(StartupError::invalid(format!(
                    "duplicate credential for subject '{}'",
                    credential.subject
                )));
            }
            credential_identity(credential)?;
        }
        Ok(())
    }

    pub(crate) fn limits(&self) -> ListLimits {
        ListLimits {
            default_limit: self.list_limit_default,
            max_limit: self.list_limit_max,
        }
    }

    /// Credential table keyed by API key.
    pub(crate) fn identities(&self) -> Result<Vec<(String, Identity)>, StartupError> {
        self.credentials
            .iter()
            .map(|c| Ok((c.key.clone(), credential_identity(c)?)))
            .collect()
    }
}

fn credential_identity(credential: &Credential) -> Result<Identity, StartupError> {
    if credential.subject.is_empty() {
        return Err(StartupError::invalid("credential subject must not be empty"));
    }
    let namespace = Namespace::parse(&credential.namespace).map_err(|err| {
        StartupError::invalid(format!(
            "credential namespace '{}': {err}",
            credential.namespace
        ))
    })?;
    if namespace.root() != credential.subject {
        return Err(StartupError::invalid(format!(
            "credential subject '{}' does not own namespace '{}'",
            credential.subject, namespace
        )));
    }
    Ok(Identity::new(credential.subject.clone(), namespace))
}

fn parse_env<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, StartupError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| StartupError::invalid(format!("{key} must be an integer"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.limits(), ListLimits::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_fields_and_credentials() {
        let config = ServerConfig::from_toml(
            r#"
            port = 9000
            list_limit_max = 50
            records = ["data/a.jsonl"]

            [[credentials]]
            key = "k1"
            subject = "a"
            namespace = "a/b"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.limits().max_limit, 50);
        let identities = config.identities().unwrap();
        assert_eq!(identities[0].0, "k1");
        assert_eq!(identities[0].1.namespace.to_string(), "a/b");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(ServerConfig::from_toml("prot = 1").is_err());
    }

    #[test]
    fn env_overrides_file() {
        let mut config = ServerConfig::default();
        config
            .apply_env(env(&[
                ("ACTLOG_PORT", "7001"),
                ("ACTLOG_RATE_LIMIT", ""),
                ("ACTLOG_REFRESH_INTERVAL_MS", "25"),
            ]))
            .unwrap();
        assert_eq!(config.port, 7001);
        assert_eq!(config.rate_limit, 600);
        assert_eq!(config.refresh_interval_ms, 25);

        let err = config
            .apply_env(env(&[("ACTLOG_RATE_LIMIT", "lots")]))
            .unwrap_err();
        assert_eq!(err.code, ERR_INVALID_CONFIG);
        assert!(err.message.contains("ACTLOG_RATE_LIMIT"));
    }

    #[test]
    fn invalid_settings_fail_validation() {
        let config = ServerConfig {
            list_limit_default: 300,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            credentials: vec![Credential {
                key: "k".into(),
                subject: "a".into(),
                namespace: "a//b".into(),
            }],
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let dup = Credential {
            key: "same".into(),
            subject: "a".into(),
            namespace: "a".into(),
        };
        let config = ServerConfig {
            credentials: vec![dup.clone(), dup],
            ..ServerConfig::default()
        };
        assert!(config.validate().unwrap_err().message.contains("duplicate"));
    }

    #[test]
    fn credential_subject_must_own_its_namespace() {
        let config = ServerConfig {
            credentials: vec![Credential {
                key: "k".into(),
                subject: "alice".into(),
                namespace: "a/b".into(),
            }],
            ..ServerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.code, ERR_INVALID_CONFIG);
        assert!(err.message.contains("does not own namespace 'a/b'"));

        let config = ServerConfig {
            credentials: vec![Credential {
                key: "k".into(),
                subject: "a".into(),
                namespace: "a/b".into(),
            }],
            ..ServerConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn relative_record_paths_follow_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actlog.toml");
        std::fs::write(&path, "records = [\"a.jsonl\", \"/abs/b.jsonl\"]\n").unwrap();
        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.records[0], dir.path().join("a.jsonl"));
        assert_eq!(config.records[1], PathBuf::from("/abs/b.jsonl"));

        let missing = ServerConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert_eq!(missing.code, ERR_CONFIG_UNREADABLE);
    }
}
