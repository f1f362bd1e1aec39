//! Configuration for an [`AssetManager`](crate::AssetManager).

use crate::event::DEFAULT_EVENT_CAPACITY;

/// What happens to an entry once no handle refers to it anymore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Unload the asset when its last handle is dropped.
    #[default]
    UnloadUnused,

    /// Keep the asset cached until it is unloaded explicitly or the manager is
    /// disposed.
    KeepLoaded,
}

/// Settings for an asset manager.
#[derive(Debug, Clone)]
pub struct AssetSettings {
    /// Lifetime policy for unreferenced entries.
    pub cache_policy: CachePolicy,

    /// Turn loader panics into load failures instead of unwinding the worker.
    pub catch_panics: bool,

    /// Record [`AssetEvent`](crate::AssetEvent)s for `drain_events`.
    pub record_events: bool,

    /// Most events kept between two `drain_events` calls; older ones are
    /// dropped first.
    pub event_capacity: usize,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            cache_policy: CachePolicy::UnloadUnused,
            catch_panics: true,
            record_events: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl AssetSettings {
    /// Create default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache policy.
    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Set whether loader panics are caught.
    pub fn catch_panics(mut self, catch: bool) -> Self {
        self.catch_panics = catch;
        self
    }

    /// Set whether events are recorded.
    pub fn record_events(mut self, record: bool) -> Self {
        self.record_events = record;
        self
    }

    /// Set how many undrained events are kept.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}
