//! Asset handles - typed, reference-counted views of a manager entry.

use std::future::{Future, IntoFuture};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use surreal_core::alloc::Generation;

use crate::Asset;
use crate::dispatch::{Dispatcher, ImmediateDispatcher};
use crate::error::{AssetError, AssetResult};
use crate::id::AssetId;
use crate::manager::Shared;
use crate::path::VirtualPath;
use crate::state::AssetStatus;

/// A typed handle to an asset.
///
/// Handles never own the payload; every query goes through the manager, so
/// status and data are always current. Cloning a handle adds a reference to
/// the entry and dropping it releases one. Under
/// [`CachePolicy::UnloadUnused`](crate::CachePolicy::UnloadUnused) the entry is
/// unloaded when the last reference goes away.
///
/// A handle whose entry was unloaded (or replaced by a newer load of the same
/// id), or whose manager is gone, reports [`AssetStatus::Unloaded`].
///
/// # Example
///
/// ```ignore
/// let texture: Handle<Texture> = manager.load("sprites/hero.png")?;
///
/// if let Some(texture) = texture.try_data() {
///     // Use texture...
/// }
///
/// // Or wait for it.
/// let texture = texture.await?;
/// ```
pub struct Handle<T: Asset> {
    id: AssetId,
    generation: Generation,
    shared: Weak<Shared>,
    /// The manager's dispatcher, kept so callbacks stay off the caller's
    /// thread even after the manager is gone.
    dispatcher: Arc<dyn Dispatcher>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Asset> Handle<T> {
    /// Wrap a reference the manager already counted.
    pub(crate) fn new(
        id: AssetId,
        generation: Generation,
        shared: Weak<Shared>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        debug_assert!(id.is::<T>());
        Self {
            id,
            generation,
            shared,
            dispatcher,
            _marker: PhantomData,
        }
    }

    /// Get the asset id.
    pub fn id(&self) -> &AssetId {
        &self.id
    }

    /// Get the path the asset is loaded from.
    pub fn path(&self) -> &VirtualPath {
        self.id.path()
    }

    /// Get the type name of the asset.
    pub fn type_name(&self) -> &'static str {
        T::type_name()
    }

    /// Current status of the entry.
    pub fn status(&self) -> AssetStatus {
        match self.shared.upgrade() {
            Some(shared) => shared.status(&self.id, Some(self.generation)),
            None => AssetStatus::Unloaded,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.status() == AssetStatus::Unknown
    }

    pub fn is_loading(&self) -> bool {
        self.status() == AssetStatus::Loading
    }

    pub fn is_ready(&self) -> bool {
        self.status() == AssetStatus::Ready
    }

    pub fn is_failed(&self) -> bool {
        self.status() == AssetStatus::Failed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == AssetStatus::Cancelled
    }

    pub fn is_unloaded(&self) -> bool {
        self.status() == AssetStatus::Unloaded
    }

    /// Get the loaded data.
    ///
    /// Fails with `InvalidState` when the asset is not ready.
    pub fn data(&self) -> AssetResult<Arc<T>> {
        let payload = self
            .shared
            .upgrade()
            .and_then(|shared| shared.payload(&self.id, Some(self.generation)));

        match payload {
            Some(payload) => payload
                .into_any()
                .downcast::<T>()
                .map_err(|_| AssetError::TypeMismatch {
                    expected: T::type_name(),
                    actual: self.id.type_name(),
                }),
            None => Err(AssetError::InvalidState {
                path: self.id.path().to_string(),
                status: self.status(),
            }),
        }
    }

    /// Get the loaded data, if ready.
    pub fn try_data(&self) -> Option<Arc<T>> {
        self.data().ok()
    }

    /// The error that made the load fail, if it failed.
    pub fn error(&self) -> Option<Arc<AssetError>> {
        self.shared
            .upgrade()
            .and_then(|shared| shared.error(&self.id, Some(self.generation)))
    }

    /// How many times a payload was assigned (first load plus reloads).
    pub fn version(&self) -> u32 {
        self.shared
            .upgrade()
            .and_then(|shared| shared.version(&self.id, Some(self.generation)))
            .unwrap_or(0)
    }

    /// Number of live handles to the entry.
    pub fn ref_count(&self) -> usize {
        self.shared
            .upgrade()
            .map(|shared| shared.ref_count(&self.id, Some(self.generation)))
            .unwrap_or(0)
    }

    /// Run `callback` once the asset settles, on the dispatcher the manager
    /// was built with.
    ///
    /// Dispatched promptly if the asset has already settled or been unloaded,
    /// or if the manager itself is gone.
    pub fn on_ready(&self, callback: impl FnOnce() + Send + 'static) {
        self.on_ready_on(self.dispatcher.clone(), callback);
    }

    /// Like [`on_ready`](Self::on_ready), but runs `callback` on `dispatcher`.
    pub fn on_ready_on(
        &self,
        dispatcher: Arc<dyn Dispatcher>,
        callback: impl FnOnce() + Send + 'static,
    ) {
        match self.shared.upgrade() {
            Some(shared) => {
                shared.add_callback(&self.id, Some(self.generation), dispatcher, Box::new(callback))
            }
            None => dispatcher.dispatch(Box::new(callback)),
        }
    }

    /// A future resolving once the asset settles.
    pub fn ready(&self) -> HandleFuture<T> {
        HandleFuture::new(self.clone())
    }

    /// Release this handle's reference. Same as dropping it.
    pub fn dispose(self) {
        drop(self);
    }

    /// Unload the entry for every holder, regardless of other live handles.
    ///
    /// Returns `false` if the entry was already gone.
    pub fn force_unload(&self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.unload(&self.id, Some(self.generation)),
            None => false,
        }
    }
}

impl<T: Asset> Clone for Handle<T> {
    fn clone(&self) -> Self {
        if let Some(shared) = self.shared.upgrade() {
            shared.retain(&self.id, self.generation);
        }
        Self::new(
            self.id.clone(),
            self.generation,
            self.shared.clone(),
            self.dispatcher.clone(),
        )
    }
}

impl<T: Asset> Drop for Handle<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.release(&self.id, self.generation);
        }
    }
}

impl<T: Asset> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("type", &T::type_name())
            .field("path", &self.id.path().as_str())
            .field("generation", &self.generation.get())
            .finish()
    }
}

impl<T: Asset> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.generation == other.generation
    }
}

impl<T: Asset> Eq for Handle<T> {}

impl<T: Asset> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.generation.hash(state);
    }
}

impl<T: Asset> IntoFuture for Handle<T> {
    type Output = AssetResult<Handle<T>>;
    type IntoFuture = HandleFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        HandleFuture::new(self)
    }
}

/// Waits for a handle's asset to settle.
///
/// Resolves to the handle when the asset is ready, and to an error when it
/// failed, was cancelled or was unloaded first. The wakeup is delivered by a
/// completion callback, so no polling loop is involved.
pub struct HandleFuture<T: Asset> {
    handle: Option<Handle<T>>,
    waker: Option<Arc<Mutex<Option<Waker>>>>,
}

impl<T: Asset> HandleFuture<T> {
    fn new(handle: Handle<T>) -> Self {
        Self {
            handle: Some(handle),
            waker: None,
        }
    }

    /// Returns `true` once awaiting would not wait.
    pub fn is_completed(&self) -> bool {
        self.handle
            .as_ref()
            .is_none_or(|handle| handle.status().is_done())
    }

    fn outcome(handle: Handle<T>, status: AssetStatus) -> AssetResult<Handle<T>> {
        let path = handle.path().to_string();
        match status {
            AssetStatus::Ready => Ok(handle),
            AssetStatus::Failed => Err(AssetError::LoadFailed {
                cause: handle.error().unwrap_or_else(|| {
                    Arc::new(AssetError::Other {
                        message: "load failed".to_string(),
                    })
                }),
                path,
            }),
            AssetStatus::Cancelled => Err(AssetError::Cancelled { path }),
            status => Err(AssetError::InvalidState { path, status }),
        }
    }
}

impl<T: Asset> Future for HandleFuture<T> {
    type Output = AssetResult<Handle<T>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let status = match this.handle.as_ref() {
            Some(handle) => handle.status(),
            None => {
                return Poll::Ready(Err(AssetError::Other {
                    message: "HandleFuture polled after completion".to_string(),
                }));
            }
        };

        if status.is_done()
            && let Some(handle) = this.handle.take()
        {
            return Poll::Ready(Self::outcome(handle, status));
        }

        match &this.waker {
            Some(slot) => *slot.lock() = Some(cx.waker().clone()),
            None => {
                let Some(handle) = this.handle.as_ref() else {
                    return Poll::Pending;
                };
                let slot = Arc::new(Mutex::new(Some(cx.waker().clone())));
                let wake = slot.clone();
                handle.on_ready_on(Arc::new(ImmediateDispatcher), move || {
                    if let Some(waker) = wake.lock().take() {
                        waker.wake();
                    }
                });
                this.waker = Some(slot);
            }
        }

        Poll::Pending
    }
}

impl<T: Asset> std::fmt::Debug for HandleFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleFuture")
            .field("handle", &self.handle)
            .finish()
    }
}
