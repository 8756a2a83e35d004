use std::time::Duration;

use toron_common::Config;

/// Tuning for one ingestion cycle.
#[derive(Debug, Clone)]
pub struct ScoutConfig {
    /// Consecutive already-stored pages after which forward paging stops.
    pub seen_page_threshold: u32,
    /// Pause before every remote call.
    pub request_delay: Duration,
    pub retry_attempts: u32,
    /// Base backoff between retry attempts; grows 3x per attempt.
    pub retry_backoff: Duration,
    /// Keys per store scan group during refresh, prune and rebuild.
    pub scan_group: usize,
    /// Ids per bulk-lookup call.
    pub info_batch: usize,
    /// Force a store commit every this many refresh groups.
    pub commit_every: usize,
    /// Posts older than this are candidates for pruning.
    pub prune_after: chrono::Duration,
    pub show_ttl: chrono::Duration,
    pub search_ttl: chrono::Duration,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            seen_page_threshold: 3,
            request_delay: Duration::from_millis(500),
            retry_attempts: 3,
            retry_backoff: Duration::from_secs(1),
            scan_group: 500,
            info_batch: reddit_client::MAX_INFO_IDS,
            commit_every: 10,
            prune_after: chrono::Duration::days(214),
            show_ttl: chrono::Duration::days(7),
            search_ttl: chrono::Duration::hours(1),
        }
    }
}

impl ScoutConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            request_delay: config.request_delay,
            retry_attempts: config.retry_attempts.max(1),
            ..Self::default()
        }
    }

    /// No pauses or backoff, for driving a cycle against in-process fakes.
    pub fn immediate() -> Self {
        Self {
            request_delay: Duration::ZERO,
            retry_backoff: Duration::ZERO,
            ..Self::default()
        }
    }
}
