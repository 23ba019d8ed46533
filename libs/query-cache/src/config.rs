use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CacheConfig {
    /// Freshness window: an entry older than this refetches on the
    /// next observation. Zero means entries are stale immediately.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// How long an unobserved entry is retained before eviction.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default = "default_gc_interval_secs")]
    pub gc_interval_secs: u64,
}

fn default_stale_after_secs() -> u64 { 0 }
fn default_retention_secs() -> u64 { 300 }
fn default_gc_interval_secs() -> u64 { 60 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
            retention_secs: default_retention_secs(),
            gc_interval_secs: default_gc_interval_secs(),
        }
    }
}

impl CacheConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }
}

/// Per-query overrides applied on top of [`CacheConfig`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub stale_after: Option<Duration>,
}

impl QueryOptions {
    pub fn stale_after(secs: u64) -> Self {
        Self {
            stale_after: Some(Duration::from_secs(secs)),
        }
    }
}
