use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            max_attempts,
            interval: Duration::from_millis(interval_ms),
        }
    }

    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Done,
    Retry,
    Abort,
}

impl From<bool> for Attempt {
    fn from(value: bool) -> Self {
        if value { Attempt::Done } else { Attempt::Retry }
    }
}

/// Probes immediately, then after every `interval` until the predicate holds
/// or `max_attempts` probes have run. Returns the last probe's result.
pub async fn retry<F>(policy: RetryPolicy, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    retry_until(policy, |_| Attempt::from(predicate())).await
}

/// Like [`retry`], but the probe may abort polling early; an abort yields
/// `false`. The probe receives the 1-based attempt number.
pub async fn retry_until<F>(policy: RetryPolicy, mut probe: F) -> bool
where
    F: FnMut(u32) -> Attempt,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match probe(attempt) {
            Attempt::Done => return true,
            Attempt::Abort => return false,
            Attempt::Retry => {}
        }
        if attempt < attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    false
}
