//! Polling with a deadline
//!
//! The check is called immediately and then every `interval` until it reports
//! completion. Errors from the check abort the wait; checks that want to
//! tolerate transient failures map them to `Ok(false)` themselves.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{KubeError, Result};

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Control plane installation: every 5s for up to 10 minutes
    pub const INSTALL: PollConfig = PollConfig::new(Duration::from_secs(5), Duration::from_secs(600));

    /// Application deletion: every 2s for up to 5 minutes
    pub const DELETE: PollConfig = PollConfig::new(Duration::from_secs(2), Duration::from_secs(300));

    /// Addon disabling: every 5s for up to 5 minutes
    pub const ADDON: PollConfig = PollConfig::new(Duration::from_secs(5), Duration::from_secs(300));

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Poll `check` until it returns `true`, failing with `Timeout` after the deadline
pub async fn poll_until<F, Fut>(config: PollConfig, operation: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + config.timeout;
    loop {
        if check().await? {
            return Ok(());
        }
        if Instant::now() + config.interval > deadline {
            return Err(KubeError::Timeout {
                operation: operation.to_string(),
                elapsed: format_duration(config.timeout),
                hint: None,
            });
        }
        tracing::debug!(operation, "not ready, retrying in {:?}", config.interval);
        tokio::time::sleep(config.interval).await;
    }
}

/// Short human duration: `90s` -> `1m30s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return format!("{}ms", duration.as_millis());
    }
    let (m, s) = (secs / 60, secs % 60);
    match (m, s) {
        (0, s) => format!("{}s", s),
        (m, 0) => format!("{}m", m),
        (m, s) => format!("{}m{}s", m, s),
    }
}
