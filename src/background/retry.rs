use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Run `op` until it succeeds or the retries are used up. The last error
    /// is returned.
    pub async fn run<T, E, F, Fut>(&self, stage: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(stage, attempt, "Stage succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt <= self.max_retries => {
                    warn!(
                        stage,
                        attempt,
                        max_retries = self.max_retries,
                        delay_secs = self.delay.as_secs(),
                        "Stage failed, retrying: {}",
                        err
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(err) => {
                    warn!(stage, attempt, "Stage failed, no retries left: {}", err);
                    return Err(err);
                }
            }
        }
    }
}
