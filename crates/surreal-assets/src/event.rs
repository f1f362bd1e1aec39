//! Asset events for change detection.

use std::collections::VecDeque;

use crate::id::AssetId;

/// Events emitted by the asset manager.
#[derive(Debug, Clone)]
pub enum AssetEvent {
    /// An asset finished its first load.
    Created {
        /// The asset.
        id: AssetId,
        /// The version of the asset.
        version: u32,
    },

    /// An asset was reloaded.
    Modified {
        /// The asset.
        id: AssetId,
        /// The new version of the asset.
        version: u32,
    },

    /// A load or reload failed.
    LoadFailed {
        /// The asset.
        id: AssetId,
        /// Error message.
        error: String,
    },

    /// An in-flight load was cancelled.
    Cancelled {
        /// The asset.
        id: AssetId,
    },

    /// An asset was unloaded.
    Removed {
        /// The asset.
        id: AssetId,
    },
}

impl AssetEvent {
    /// Get the id of the asset this event relates to.
    pub fn id(&self) -> &AssetId {
        match self {
            AssetEvent::Created { id, .. } => id,
            AssetEvent::Modified { id, .. } => id,
            AssetEvent::LoadFailed { id, .. } => id,
            AssetEvent::Cancelled { id } => id,
            AssetEvent::Removed { id } => id,
        }
    }

    /// Check if this event relates to an asset of type `T`.
    pub fn is_for<T: 'static>(&self) -> bool {
        self.id().is::<T>()
    }

    /// Check if this is a creation event.
    pub fn is_created(&self) -> bool {
        matches!(self, AssetEvent::Created { .. })
    }

    /// Check if this is a modification event.
    pub fn is_modified(&self) -> bool {
        matches!(self, AssetEvent::Modified { .. })
    }

    /// Check if this is a removal event.
    pub fn is_removed(&self) -> bool {
        matches!(self, AssetEvent::Removed { .. })
    }

    /// Check if this is a failure event.
    pub fn is_failed(&self) -> bool {
        matches!(self, AssetEvent::LoadFailed { .. })
    }
}

/// Events kept when the host never drains them.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// A bounded buffer of asset events, drained by the host once per tick.
///
/// When full, the oldest event is dropped to make room; the first drop since
/// the last drain is logged.
#[derive(Debug)]
pub struct AssetEventBuffer {
    events: VecDeque<AssetEvent>,
    capacity: usize,
    dropped: usize,
}

impl Default for AssetEventBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl AssetEventBuffer {
    /// Create an empty buffer holding up to [`DEFAULT_EVENT_CAPACITY`] events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer holding up to `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Push an event, evicting the oldest one if the buffer is full.
    pub fn push(&mut self, event: AssetEvent) {
        if self.events.len() >= self.capacity {
            if self.dropped == 0 {
                tracing::warn!(
                    "Asset event buffer is full ({} events), dropping the oldest; call drain_events",
                    self.capacity
                );
            }
            self.dropped += 1;
            if self.events.pop_front().is_none() {
                return;
            }
        }
        self.events.push_back(event);
    }

    /// Take all events, oldest first.
    pub fn drain(&mut self) -> Vec<AssetEvent> {
        self.dropped = 0;
        self.events.drain(..).collect()
    }

    /// Get an iterator over events without draining.
    pub fn iter(&self) -> impl Iterator<Item = &AssetEvent> {
        self.events.iter()
    }

    /// Check if there are any events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events evicted since the last drain.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_drains_in_order() {
        let mut buffer = AssetEventBuffer::new();
        let id = AssetId::of::<String>("a.txt");
        buffer.push(AssetEvent::Created { id: id.clone(), version: 1 });
        buffer.push(AssetEvent::Removed { id: id.clone() });
        assert_eq!(buffer.len(), 2);

        let events = buffer.drain();
        assert!(events[0].is_created());
        assert!(events[1].is_removed());
        assert!(events[1].is_for::<String>());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_full_buffer_drops_oldest() {
        let mut buffer = AssetEventBuffer::with_capacity(2);
        for version in 1..=5 {
            buffer.push(AssetEvent::Created {
                id: AssetId::of::<String>("a.txt"),
                version,
            });
        }
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.dropped(), 3);

        let versions: Vec<_> = buffer
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                AssetEvent::Created { version, .. } => Some(version),
                _ => None,
            })
            .collect();
        assert_eq!(versions, vec![4, 5]);
        assert_eq!(buffer.dropped(), 0);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut buffer = AssetEventBuffer::with_capacity(0);
        buffer.push(AssetEvent::Removed {
            id: AssetId::of::<String>("a.txt"),
        });
        assert!(buffer.is_empty());
        assert_eq!(buffer.dropped(), 1);
    }
}
