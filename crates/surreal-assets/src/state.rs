//! Asset state machine and per-entry bookkeeping.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use surreal_core::alloc::Generation;

use crate::Asset;
use crate::cancel::CancellationToken;
use crate::dispatch::{Callback, Dispatcher};
use crate::error::AssetError;
use crate::id::AssetId;

/// Observable status of an asset.
///
/// Transitions only move forward: `Unknown → Loading → Ready | Failed | Cancelled`,
/// and `Unloaded` can be reached from any of them. `Unloaded` is also what an
/// id with no entry reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetStatus {
    /// The entry exists but loading has not started yet.
    Unknown,

    /// The loader is running.
    Loading,

    /// The asset has been loaded and its data is available.
    Ready,

    /// The loader failed; the error is available instead of data.
    Failed,

    /// The load was cancelled before it completed.
    Cancelled,

    /// There is no entry for the asset.
    Unloaded,
}

impl AssetStatus {
    /// Returns `true` once loading has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            AssetStatus::Ready | AssetStatus::Failed | AssetStatus::Cancelled
        )
    }

    /// Returns `true` if waiting any longer cannot change the outcome.
    pub fn is_done(&self) -> bool {
        self.is_settled() || *self == AssetStatus::Unloaded
    }

    /// Position in the lifecycle. Observed stages never decrease.
    pub fn stage(&self) -> u8 {
        match self {
            AssetStatus::Unknown => 0,
            AssetStatus::Loading => 1,
            AssetStatus::Ready | AssetStatus::Failed | AssetStatus::Cancelled => 2,
            AssetStatus::Unloaded => 3,
        }
    }
}

/// Type-erased payload stored in an entry.
pub(crate) trait ErasedAsset: Any + Send + Sync {
    fn dispose(&self);
    fn estimated_size(&self) -> usize;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Asset> ErasedAsset for T {
    fn dispose(&self) {
        Asset::dispose(self)
    }

    fn estimated_size(&self) -> usize {
        Asset::estimated_size(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub(crate) type Payload = Arc<dyn ErasedAsset>;

/// The current state of an entry. The payload only exists in `Ready`, so a
/// reader can never see data without the matching status.
pub(crate) enum AssetState {
    Unknown,
    Loading,
    Ready(Payload),
    Failed(Arc<AssetError>),
    Cancelled,
}

impl AssetState {
    pub(crate) fn status(&self) -> AssetStatus {
        match self {
            AssetState::Unknown => AssetStatus::Unknown,
            AssetState::Loading => AssetStatus::Loading,
            AssetState::Ready(_) => AssetStatus::Ready,
            AssetState::Failed(_) => AssetStatus::Failed,
            AssetState::Cancelled => AssetStatus::Cancelled,
        }
    }
}

/// A continuation waiting for an entry to settle, with the context it runs on.
pub(crate) struct PendingCallback {
    pub(crate) dispatcher: Arc<dyn Dispatcher>,
    pub(crate) callback: Callback,
}

impl PendingCallback {
    pub(crate) fn dispatch(self) {
        self.dispatcher.dispatch(self.callback);
    }
}

/// A dependency requested by a loader, kept alive for as long as the
/// dependent entry exists.
pub(crate) struct Dependency {
    pub(crate) id: AssetId,
    pub(crate) _keep_alive: Box<dyn Any + Send + Sync>,
}

/// One in-flight or completed load.
pub(crate) struct AssetEntry {
    pub(crate) id: AssetId,
    pub(crate) generation: Generation,
    pub(crate) state: AssetState,
    /// Bumped on every payload assignment.
    pub(crate) version: u32,
    /// Number of live handles.
    pub(crate) ref_count: usize,
    /// Only accessed through `&mut`; the mutex keeps the entry `Sync`.
    pub(crate) callbacks: Mutex<VecDeque<PendingCallback>>,
    pub(crate) cancel: CancellationToken,
    /// A reload is in flight while the old payload stays served.
    pub(crate) reloading: bool,
    /// Counts loads started on this entry; completions of older attempts are stale.
    pub(crate) attempt: u32,
    pub(crate) dependencies: Vec<Dependency>,
}

impl AssetEntry {
    pub(crate) fn new(id: AssetId, generation: Generation) -> Self {
        Self {
            id,
            generation,
            state: AssetState::Unknown,
            version: 0,
            ref_count: 0,
            callbacks: Mutex::new(VecDeque::new()),
            cancel: CancellationToken::new(),
            reloading: false,
            attempt: 0,
            dependencies: Vec::new(),
        }
    }

    pub(crate) fn status(&self) -> AssetStatus {
        self.state.status()
    }

    pub(crate) fn payload(&self) -> Option<&Payload> {
        match &self.state {
            AssetState::Ready(payload) => Some(payload),
            _ => None,
        }
    }

    pub(crate) fn error(&self) -> Option<&Arc<AssetError>> {
        match &self.state {
            AssetState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn begin_load(&mut self) {
        debug_assert!(matches!(self.state, AssetState::Unknown));
        self.attempt += 1;
        self.state = AssetState::Loading;
    }

    /// Start reloading a ready entry. The current payload stays in place until
    /// the reload completes. Returns the token for the new attempt.
    pub(crate) fn begin_reload(&mut self) -> CancellationToken {
        debug_assert!(matches!(self.state, AssetState::Ready(_)));
        self.attempt += 1;
        self.reloading = true;
        self.cancel = CancellationToken::new();
        self.cancel.clone()
    }

    /// Store a loaded payload. Returns the payload it replaced, if any.
    pub(crate) fn set_ready(&mut self, payload: Payload) -> Option<Payload> {
        self.version = self.version.wrapping_add(1);
        self.reloading = false;
        match std::mem::replace(&mut self.state, AssetState::Ready(payload)) {
            AssetState::Ready(old) => Some(old),
            _ => None,
        }
    }

    pub(crate) fn set_failed(&mut self, error: Arc<AssetError>) {
        self.reloading = false;
        self.state = AssetState::Failed(error);
    }

    /// Abandon an in-flight reload, keeping the current payload. Its result
    /// becomes stale.
    pub(crate) fn cancel_reload(&mut self) {
        self.cancel.cancel();
        self.reloading = false;
        self.attempt += 1;
    }

    pub(crate) fn set_cancelled(&mut self) {
        self.reloading = false;
        self.cancel.cancel();
        self.state = AssetState::Cancelled;
    }

    pub(crate) fn push_callback(&mut self, callback: PendingCallback) {
        self.callbacks.get_mut().push_back(callback);
    }

    /// Take every queued continuation, in registration order.
    pub(crate) fn take_callbacks(&mut self) -> VecDeque<PendingCallback> {
        std::mem::take(self.callbacks.get_mut())
    }

    /// Tear the entry down: stop any in-flight load and move everything that
    /// still needs releasing into `released`.
    pub(crate) fn teardown(mut self, released: &mut Released) {
        self.cancel.cancel();
        released.callbacks.extend(self.take_callbacks());
        released.dependencies.append(&mut self.dependencies);
        if let AssetState::Ready(payload) = std::mem::replace(&mut self.state, AssetState::Cancelled) {
            released.payloads.push(payload);
        }
    }
}

/// Work collected under the table lock and finished after it is released.
///
/// Disposing a payload runs user code and dropping a dependency handle
/// re-enters the manager, so neither may happen while the lock is held.
#[derive(Default)]
pub(crate) struct Released {
    pub(crate) payloads: Vec<Payload>,
    pub(crate) callbacks: Vec<PendingCallback>,
    pub(crate) dependencies: Vec<Dependency>,
}

impl Released {
    pub(crate) fn finish(self) {
        for payload in self.payloads {
            payload.dispose();
        }
        drop(self.dependencies);
        for callback in self.callbacks {
            callback.dispatch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surreal_core::alloc::GenerationCounter;

    struct Blob(usize);

    impl Asset for Blob {
        fn estimated_size(&self) -> usize {
            self.0
        }
    }

    fn entry() -> AssetEntry {
        AssetEntry::new(AssetId::of::<Blob>("blob.bin"), GenerationCounter::new().next())
    }

    #[test]
    fn test_stages_are_ordered() {
        assert!(AssetStatus::Unknown.stage() < AssetStatus::Loading.stage());
        assert!(AssetStatus::Loading.stage() < AssetStatus::Ready.stage());
        assert_eq!(AssetStatus::Failed.stage(), AssetStatus::Ready.stage());
        assert!(AssetStatus::Cancelled.stage() < AssetStatus::Unloaded.stage());
        assert!(AssetStatus::Unloaded.is_done());
        assert!(!AssetStatus::Unloaded.is_settled());
    }

    #[test]
    fn test_entry_lifecycle() {
        let mut entry = entry();
        assert_eq!(entry.status(), AssetStatus::Unknown);

        entry.begin_load();
        assert_eq!(entry.status(), AssetStatus::Loading);
        assert!(entry.payload().is_none());

        assert!(entry.set_ready(Arc::new(Blob(8))).is_none());
        assert_eq!(entry.status(), AssetStatus::Ready);
        assert_eq!(entry.version, 1);
        assert_eq!(entry.payload().map(|p| p.estimated_size()), Some(8));

        let first_token = entry.cancel.clone();
        let reload_token = entry.begin_reload();
        assert_eq!(entry.attempt, 2);
        assert!(entry.reloading);
        assert_eq!(entry.status(), AssetStatus::Ready);
        reload_token.cancel();
        assert!(!first_token.is_cancelled());

        let old = entry.set_ready(Arc::new(Blob(16)));
        assert_eq!(old.map(|p| p.estimated_size()), Some(8));
        assert_eq!(entry.version, 2);
        assert!(!entry.reloading);
    }

    #[test]
    fn test_cancel_trips_token() {
        let mut entry = entry();
        entry.begin_load();
        let token = entry.cancel.clone();
        entry.set_cancelled();
        assert!(token.is_cancelled());
        assert_eq!(entry.status(), AssetStatus::Cancelled);
    }

    #[test]
    fn test_teardown_releases_payload() {
        let mut entry = entry();
        entry.begin_load();
        entry.set_ready(Arc::new(Blob(1)));
        let token = entry.cancel.clone();

        let mut released = Released::default();
        entry.teardown(&mut released);
        assert_eq!(released.payloads.len(), 1);
        assert!(released.callbacks.is_empty());
        assert!(token.is_cancelled());
    }
}
