//! Polling of asynchronous Forge operations

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::errors::DeployError;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// How long to wait for an asynchronous operation
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Number of status checks before giving up
    pub max_attempts: u32,

    /// Delay between two checks
    pub backoff: CooldownOptions,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: 40,
            backoff: CooldownOptions {
                base_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(30),
                multiplier: 2.0,
            },
        }
    }
}

impl PollSettings {
    /// Budget for deployments, which run the whole deploy script
    pub fn deployment() -> Self {
        Self {
            max_attempts: 240,
            ..Self::default()
        }
    }

    /// Check without waiting, used by tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: CooldownOptions::immediate(),
        }
    }
}

/// Result of one status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    Pending,
    Done(T),
    /// Terminal failure with the remote status
    Failed(String),
}

/// Call `check` until it reports a terminal status or the budget runs out
pub async fn poll_until<T, F, Fut>(
    operation: &str,
    settings: &PollSettings,
    mut check: F,
) -> Result<T, DeployError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, DeployError>>,
{
    for attempt in 0..settings.max_attempts {
        match check().await? {
            PollStatus::Done(value) => return Ok(value),
            PollStatus::Failed(status) => {
                return Err(DeployError::OperationFailed {
                    operation: operation.to_string(),
                    status,
                })
            }
            PollStatus::Pending => {
                let delay = calc_exp_backoff(&settings.backoff, attempt);
                debug!("{} pending, next check in {:?}", operation, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(DeployError::PollTimeout {
        operation: operation.to_string(),
        attempts: settings.max_attempts,
    })
}
