//! Bounded retry over idempotent queries.
//!
//! Views lag behind writes. A caller that needs to observe a particular write
//! re-issues the query until its predicate accepts the answer, with backoff
//! between attempts and an overall deadline.

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay after every attempt.
    Fixed { delay: Duration },

    /// Delay grows by `multiplier` per attempt, capped at `max_delay`.
    Exponential {
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            initial_delay: Duration::from_millis(25),
            max_delay: Duration::from_millis(400),
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    /// Delay after the given attempt (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => *delay,
            Self::Exponential {
                initial_delay,
                max_delay,
                multiplier,
            } => {
                let exponent = attempt.saturating_sub(1).min(63) as i32;
                let secs = initial_delay.as_secs_f64() * multiplier.powi(exponent);
                Duration::try_from_secs_f64(secs)
                    .unwrap_or(*max_delay)
                    .min(*max_delay)
            }
        }
    }
}

/// Attempt budget, backoff and deadline for [`retry_until`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            backoff: Backoff::default(),
            deadline: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A single attempt with no waiting.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Fixed {
                delay: Duration::ZERO,
            },
            deadline: Duration::MAX,
        }
    }
}

/// Why [`retry_until`] gave up.
///
/// `Exhausted` and `Deadline` carry the last observation, if any attempt
/// completed.
#[derive(Debug)]
pub enum RetryError<T, E> {
    Exhausted { attempts: u32, last: Option<T> },
    Deadline { attempts: u32, last: Option<T> },
    Failed(E),
}

impl<T, E> RetryError<T, E> {
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Exhausted { attempts, .. } | Self::Deadline { attempts, .. } => Some(*attempts),
            Self::Failed(_) => None,
        }
    }

    pub fn into_last(self) -> Option<T> {
        match self {
            Self::Exhausted { last, .. } | Self::Deadline { last, .. } => last,
            Self::Failed(_) => None,
        }
    }
}

impl<T, E: fmt::Display> fmt::Display for RetryError<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { attempts, .. } => {
                write!(f, "condition not met after {attempts} attempts")
            }
            Self::Deadline { attempts, .. } => {
                write!(f, "deadline elapsed after {attempts} attempts")
            }
            Self::Failed(err) => write!(f, "{err}"),
        }
    }
}

impl<T: fmt::Debug, E: std::error::Error + 'static> std::error::Error for RetryError<T, E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Run `op` until `accept` holds for its output.
///
/// An `Err` from `op` ends the loop immediately: only stale answers are
/// retried, never failures.
pub async fn retry_until<T, E, Op, Fut, Accept>(
    policy: &RetryPolicy,
    mut op: Op,
    mut accept: Accept,
) -> Result<T, RetryError<T, E>>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Accept: FnMut(&T) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0u32;
    let mut last: Option<T> = None;

    // `None` means the attempt budget ran out.
    let run = async {
        loop {
            attempts += 1;
            let output = match op().await {
                Ok(output) => output,
                Err(err) => return Some(Err(err)),
            };
            if accept(&output) {
                return Some(Ok(output));
            }
            last = Some(output);
            if attempts >= max_attempts {
                return None;
            }
            let delay = policy.backoff.delay_for_attempt(attempts);
            tracing::trace!(attempt = attempts, delay_ms = delay.as_millis() as u64, "retrying stale query");
            tokio::time::sleep(delay).await;
        }
    };

    match tokio::time::timeout(policy.deadline, run).await {
        Ok(Some(Ok(output))) => Ok(output),
        Ok(Some(Err(err))) => Err(RetryError::Failed(err)),
        Ok(None) => Err(RetryError::Exhausted { attempts, last }),
        Err(_elapsed) => Err(RetryError::Deadline { attempts, last }),
    }
}
