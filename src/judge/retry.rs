//! Generic retry wrapper for external judge calls.
//!
//! Every judge and meta-judge call goes through [`with_policy`]: a bounded
//! number of attempts with exponential backoff and jitter. The attempt index
//! is handed to the operation so callers can raise sampling temperature on
//! each retry.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.exponential_base.powi(attempt as i32);
        let factor = if self.jitter {
            1.0 + rand::thread_rng().gen::<f64>()
        } else {
            1.0
        };
        Duration::from_secs_f64(base * factor)
    }
}

/// Runs `op` until it succeeds, the error predicate rejects a retry, or the
/// attempt budget is exhausted. Returns the last error on exhaustion; mapping
/// that into a recorded-absent data point is the caller's concern.
pub async fn with_policy<T, F, Fut, P>(
    policy: &RetryPolicy,
    mut op: F,
    retryable: P,
) -> anyhow::Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    P: Fn(&anyhow::Error) -> bool,
{
    let mut last_err = None;
    for attempt in 0..policy.max_attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let keep_going = retryable(&err) && attempt + 1 < policy.max_attempts;
                tracing::warn!(attempt, error = %err, retrying = keep_going, "judge call failed");
                last_err = Some(err);
                if !keep_going {
                    break;
                }
                tokio::time::sleep(policy.delay_for(attempt)).await;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("retry budget was zero")))
}
