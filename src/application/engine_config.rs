use std::num::NonZeroU64;
use std::time::Duration;

/// Settings consumed by the polling engine. Built once at startup and injected.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub poll_interval: Duration,
    /// Clear the seen set every N cycles; `None` disables periodic resets.
    pub clear_cycles_limit: Option<NonZeroU64>,
    pub max_matches_per_notification: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            clear_cycles_limit: None,
            max_matches_per_notification: 10,
        }
    }
}
