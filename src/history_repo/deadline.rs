// Per-operation deadline with a bounded number of attempts.

use std::future::Future;
use std::time::Duration;

/// Deadline and attempt budget applied to every datastore operation.
#[derive(Debug, Clone, Copy)]
pub struct StorePolicy {
    pub op_timeout: Duration,
    pub attempts: u32,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(2),
            attempts: 2,
        }
    }
}

pub(super) async fn with_deadline<T, F, Fut>(
    policy: &StorePolicy,
    operation: &'static str,
    mut op: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match tokio::time::timeout(policy.op_timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                tracing::debug!(operation, attempt, error = %e, "store operation failed");
                last_err = Some(e);
            }
            Err(_) => {
                tracing::debug!(operation, attempt, "store operation timed out");
                last_err = Some(anyhow::anyhow!(
                    "{} timed out after {:?}",
                    operation,
                    policy.op_timeout
                ));
            }
        }
    }
    let err = last_err.unwrap_or_else(|| anyhow::anyhow!("{} did not run", operation));
    Err(err.context(format!("{} failed after {} attempt(s)", operation, attempts)))
}
