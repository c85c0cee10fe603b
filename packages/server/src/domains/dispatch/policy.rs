use std::time::Duration as StdDuration;

/// Bounds on re-dispatch and store-failure retries
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPolicy {
    /// Strategy runs recorded for a request before it is marked exhausted
    pub max_attempts: u32,
    /// Age of a request (since `created_at`) after which it is marked exhausted
    pub max_elapsed: chrono::Duration,
    /// Retries of a whole dispatch run after a store failure
    pub retry_limit: u32,
    /// Base delay between retries, doubled on each retry
    pub retry_backoff: StdDuration,
}

impl DispatchPolicy {
    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> StdDuration {
        self.retry_backoff
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            max_elapsed: chrono::Duration::seconds(900),
            retry_limit: 3,
            retry_backoff: StdDuration::from_millis(100),
        }
    }
}
