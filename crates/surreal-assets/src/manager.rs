//! Asset manager - the main coordinator for asset operations.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures_lite::FutureExt;
use parking_lot::{Mutex, RwLock};
use surreal_core::alloc::{Generation, GenerationCounter, HashMap};
use surreal_core::profiling::{profile_function, profile_scope};

use crate::Asset;
use crate::cancel::CancellationToken;
use crate::dispatch::{Callback, Dispatcher, Spawner};
use crate::error::{AssetError, AssetResult};
use crate::event::{AssetEvent, AssetEventBuffer};
use crate::handle::Handle;
use crate::id::AssetId;
use crate::loader::{AssetLoader, AssetResolver, ErasedAssetLoader, LoadContext, LoaderRegistry};
use crate::path::VirtualPath;
use crate::settings::{AssetSettings, CachePolicy};
use crate::state::{AssetEntry, AssetStatus, Dependency, Payload, PendingCallback, Released};

/// State shared between the manager, its handles and running loads.
///
/// Lock order: `loaders` may be held while taking `entries`, never the
/// other way around. Nothing that can re-enter the manager (payload
/// disposal, dependency handles, callbacks) runs while `entries` is held.
pub(crate) struct Shared {
    entries: RwLock<HashMap<AssetId, AssetEntry>>,
    loaders: RwLock<LoaderRegistry>,
    events: Mutex<AssetEventBuffer>,
    spawner: Arc<dyn Spawner>,
    dispatcher: Arc<dyn Dispatcher>,
    settings: AssetSettings,
    parent: Option<Weak<Shared>>,
    generations: GenerationCounter,
    disposed: AtomicBool,
}

impl Shared {
    pub(crate) fn load<T: Asset>(self: &Arc<Self>, path: VirtualPath) -> AssetResult<Handle<T>> {
        profile_function!();

        if self.disposed.load(Ordering::Acquire) {
            return Err(AssetError::Disposed);
        }

        let loader = self.loaders.read().resolve::<T>()?;
        let id = AssetId::of::<T>(path);

        if !self.contains(&id)
            && let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade)
            && parent.contains(&id)
        {
            tracing::trace!("Delegating {} to the parent manager", id);
            return Shared::load::<T>(&parent, id.path().clone());
        }

        let mut entries = self.entries.write();
        if self.disposed.load(Ordering::Acquire) {
            return Err(AssetError::Disposed);
        }

        if let Some(entry) = entries.get_mut(&id) {
            entry.ref_count += 1;
            return Ok(self.handle(id, entry.generation));
        }

        let generation = self.generations.next();
        let mut entry = AssetEntry::new(id.clone(), generation);
        entry.begin_load();
        entry.ref_count = 1;
        let attempt = entry.attempt;
        let token = entry.cancel.clone();
        entries.insert(id.clone(), entry);
        drop(entries);

        tracing::trace!("Loading {} with {}", id, loader.loader_name());
        self.spawn_load(loader, id.clone(), generation, attempt, token);

        Ok(self.handle(id, generation))
    }

    /// Wrap a reference already counted on the entry.
    fn handle<T: Asset>(self: &Arc<Self>, id: AssetId, generation: Generation) -> Handle<T> {
        Handle::new(id, generation, Arc::downgrade(self), self.dispatcher.clone())
    }

    /// Run `loader` on the spawner, racing it against `token`, and feed the
    /// outcome back through [`complete`](Self::complete).
    fn spawn_load(
        self: &Arc<Self>,
        loader: Arc<dyn ErasedAssetLoader>,
        id: AssetId,
        generation: Generation,
        attempt: u32,
        token: CancellationToken,
    ) {
        let dependencies = Arc::new(Mutex::new(Vec::new()));
        let ctx = LoadContext::new(
            id.clone(),
            token.clone(),
            AssetResolver::new(Arc::downgrade(self)),
            dependencies.clone(),
        );
        let catch_panics = self.settings.catch_panics;

        let panic_path = id.path().to_string();
        let load = async move {
            let future = AssertUnwindSafe(async move { loader.load_erased(ctx).await });
            if !catch_panics {
                return future.await;
            }
            match future.catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(AssetError::Panicked {
                    path: panic_path,
                    message: panic_message(&*panic),
                }),
            }
        };

        let cancel_path = id.path().to_string();
        let cancelled = async move {
            token.cancelled().await;
            Err::<Payload, _>(AssetError::Cancelled { path: cancel_path })
        };

        let shared = Arc::downgrade(self);
        let task = async move {
            let result = futures_lite::future::or(load, cancelled).await;
            let dependencies = std::mem::take(&mut *dependencies.lock());
            match shared.upgrade() {
                Some(shared) => shared.complete(&id, generation, attempt, result, dependencies),
                None => {
                    if let Ok(payload) = result {
                        payload.dispose();
                    }
                }
            }
        };

        self.spawner.spawn(Box::pin(task));
    }

    fn complete(
        &self,
        id: &AssetId,
        generation: Generation,
        attempt: u32,
        result: AssetResult<Payload>,
        dependencies: Vec<Dependency>,
    ) {
        profile_function!();

        let mut released = Released::default();
        let event;
        {
            let mut entries = self.entries.write();
            let current = entries.get(id).is_some_and(|entry| {
                entry.generation == generation
                    && entry.attempt == attempt
                    && (entry.reloading || entry.status() == AssetStatus::Loading)
            });

            if !current {
                drop(entries);
                tracing::trace!("Discarding stale completion for {}", id);
                if let Ok(payload) = result {
                    payload.dispose();
                }
                return;
            }

            let Some(entry) = entries.get_mut(id) else {
                return;
            };

            let reloading = entry.reloading;
            match result {
                Ok(payload) => {
                    if let Some(old) = entry.set_ready(payload) {
                        released.payloads.push(old);
                    }
                    released.dependencies = std::mem::replace(&mut entry.dependencies, dependencies);
                    tracing::trace!("Loaded {} (version {})", id, entry.version);
                    event = if reloading {
                        AssetEvent::Modified {
                            id: id.clone(),
                            version: entry.version,
                        }
                    } else {
                        AssetEvent::Created {
                            id: id.clone(),
                            version: entry.version,
                        }
                    };
                }
                Err(err) if reloading => {
                    tracing::warn!("Failed to reload {}, keeping the previous version: {}", id, err);
                    entry.reloading = false;
                    released.dependencies = dependencies;
                    event = AssetEvent::LoadFailed {
                        id: id.clone(),
                        error: err.to_string(),
                    };
                }
                Err(err) if err.is_cancelled() => {
                    tracing::debug!("Loading {} was cancelled by its loader", id);
                    entry.set_cancelled();
                    released.dependencies = dependencies;
                    event = AssetEvent::Cancelled { id: id.clone() };
                }
                Err(err) => {
                    if matches!(err, AssetError::Panicked { .. }) {
                        tracing::error!("Failed to load {}: {}", id, err);
                    } else {
                        tracing::debug!("Failed to load {}: {}", id, err);
                    }
                    event = AssetEvent::LoadFailed {
                        id: id.clone(),
                        error: err.to_string(),
                    };
                    entry.set_failed(Arc::new(err));
                    released.dependencies = dependencies;
                }
            }
            released.callbacks.extend(entry.take_callbacks());
        }

        self.record(event);
        released.finish();
    }

    fn record(&self, event: AssetEvent) {
        if self.settings.record_events {
            self.events.lock().push(event);
        }
    }

    fn with_entry<R>(
        &self,
        id: &AssetId,
        generation: Option<Generation>,
        f: impl FnOnce(&AssetEntry) -> R,
    ) -> Option<R> {
        let entries = self.entries.read();
        entries
            .get(id)
            .filter(|entry| generation.is_none_or(|g| entry.generation == g))
            .map(f)
    }

    pub(crate) fn status(&self, id: &AssetId, generation: Option<Generation>) -> AssetStatus {
        self.with_entry(id, generation, AssetEntry::status)
            .unwrap_or(AssetStatus::Unloaded)
    }

    pub(crate) fn payload(&self, id: &AssetId, generation: Option<Generation>) -> Option<Payload> {
        self.with_entry(id, generation, |entry| entry.payload().cloned())
            .flatten()
    }

    pub(crate) fn error(
        &self,
        id: &AssetId,
        generation: Option<Generation>,
    ) -> Option<Arc<AssetError>> {
        self.with_entry(id, generation, |entry| entry.error().cloned())
            .flatten()
    }

    pub(crate) fn version(&self, id: &AssetId, generation: Option<Generation>) -> Option<u32> {
        self.with_entry(id, generation, |entry| entry.version)
    }

    pub(crate) fn ref_count(&self, id: &AssetId, generation: Option<Generation>) -> usize {
        self.with_entry(id, generation, |entry| entry.ref_count)
            .unwrap_or(0)
    }

    pub(crate) fn contains(&self, id: &AssetId) -> bool {
        self.entries.read().contains_key(id)
    }

    pub(crate) fn dispatcher(&self) -> Arc<dyn Dispatcher> {
        self.dispatcher.clone()
    }

    /// Queue `callback` until the entry settles, or dispatch it right away if
    /// it already has (or is gone).
    pub(crate) fn add_callback(
        &self,
        id: &AssetId,
        generation: Option<Generation>,
        dispatcher: Arc<dyn Dispatcher>,
        callback: Callback,
    ) {
        let pending = PendingCallback {
            dispatcher,
            callback,
        };

        let late = {
            let mut entries = self.entries.write();
            match entries.get_mut(id) {
                Some(entry)
                    if generation.is_none_or(|g| entry.generation == g)
                        && !entry.status().is_settled() =>
                {
                    entry.push_callback(pending);
                    None
                }
                _ => Some(pending),
            }
        };

        if let Some(pending) = late {
            pending.dispatch();
        }
    }

    pub(crate) fn retain(&self, id: &AssetId, generation: Generation) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(id)
            && entry.generation == generation
        {
            entry.ref_count += 1;
        }
    }

    pub(crate) fn release(&self, id: &AssetId, generation: Generation) {
        let mut released = Released::default();
        {
            let mut entries = self.entries.write();
            let Some(entry) = entries.get_mut(id) else {
                return;
            };
            if entry.generation != generation {
                return;
            }

            entry.ref_count = entry.ref_count.saturating_sub(1);
            if entry.ref_count > 0 || self.settings.cache_policy == CachePolicy::KeepLoaded {
                return;
            }

            if let Some(entry) = entries.remove(id) {
                entry.teardown(&mut released);
            }
        }

        tracing::debug!("Unloaded {} (no handles left)", id);
        self.record(AssetEvent::Removed { id: id.clone() });
        released.finish();
    }

    pub(crate) fn unload(&self, id: &AssetId, generation: Option<Generation>) -> bool {
        profile_function!();

        let mut released = Released::default();
        {
            let mut entries = self.entries.write();
            let matches = entries
                .get(id)
                .is_some_and(|entry| generation.is_none_or(|g| entry.generation == g));
            if !matches {
                return false;
            }
            if let Some(entry) = entries.remove(id) {
                entry.teardown(&mut released);
            }
        }

        tracing::debug!("Unloaded {}", id);
        self.record(AssetEvent::Removed { id: id.clone() });
        released.finish();
        true
    }

    pub(crate) fn cancel(&self, id: &AssetId) -> bool {
        let callbacks = {
            let mut entries = self.entries.write();
            let Some(entry) = entries.get_mut(id) else {
                return false;
            };

            match entry.status() {
                AssetStatus::Unknown | AssetStatus::Loading => {
                    entry.set_cancelled();
                    entry.take_callbacks()
                }
                AssetStatus::Ready if entry.reloading => {
                    entry.cancel_reload();
                    Default::default()
                }
                _ => return false,
            }
        };

        tracing::debug!("Cancelled loading {}", id);
        self.record(AssetEvent::Cancelled { id: id.clone() });
        for callback in callbacks {
            callback.dispatch();
        }
        true
    }

    pub(crate) fn reload(self: &Arc<Self>, path: &VirtualPath) -> usize {
        profile_function!();

        let mut started = Vec::new();
        {
            let loaders = self.loaders.read();
            let mut entries = self.entries.write();
            for entry in entries.values_mut() {
                if !path.matches(entry.id.path())
                    || entry.status() != AssetStatus::Ready
                    || entry.reloading
                {
                    continue;
                }
                let Some(loader) = loaders.get(entry.id.type_id()) else {
                    tracing::warn!("No loader left to reload {}", entry.id);
                    continue;
                };
                let token = entry.begin_reload();
                started.push((loader, entry.id.clone(), entry.generation, entry.attempt, token));
            }
        }

        let count = started.len();
        for (loader, id, generation, attempt, token) in started {
            tracing::debug!("Reloading {}", id);
            self.spawn_load(loader, id, generation, attempt, token);
        }
        count
    }

    fn dispose(&self) {
        profile_function!();

        let mut released = Released::default();
        let count;
        {
            let mut entries = self.entries.write();
            if self.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
            count = entries.len();
            for (_, entry) in entries.drain() {
                entry.teardown(&mut released);
            }
        }
        released.finish();

        let loaders = self.loaders.write().drain_owned();
        tracing::debug!(
            "Disposed asset manager ({} entries, {} loaders)",
            count,
            loaders.len()
        );
        for loader in loaders {
            loader.dispose();
        }
        self.events.lock().drain();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// The main asset manager: deduplicated, asynchronous, type-keyed loading.
///
/// Every method takes `&self`; the manager can be shared across threads
/// behind an `Arc`. Loads run on the [`Spawner`] given at construction.
/// Callbacks registered without an explicit dispatcher run on the
/// [`Dispatcher`] given at construction, which stands for the host's own
/// context (usually a [`QueuedDispatcher`](crate::QueuedDispatcher) the main
/// loop drains).
///
/// # Example
///
/// ```ignore
/// let pool = Arc::new(TaskPool::default_threads()?);
/// let main_thread = Arc::new(QueuedDispatcher::new());
/// let manager = AssetManager::new(pool, main_thread.clone());
/// manager.add_loader(TextLoader::new(Arc::new(FileReader::new("assets"))));
///
/// let a = manager.load::<String>("story/intro.txt")?;
/// let b = manager.load::<String>("story/intro.txt")?; // same entry
///
/// b.on_ready(|| tracing::info!("intro loaded"));
/// main_thread.run_pending(); // once per frame
///
/// for event in manager.drain_events() {
///     match event {
///         AssetEvent::Created { .. } => {}
///         AssetEvent::Modified { .. } => {}
///         AssetEvent::LoadFailed { .. } => {}
///         AssetEvent::Cancelled { .. } => {}
///         AssetEvent::Removed { .. } => {}
///     }
/// }
/// ```
pub struct AssetManager {
    shared: Arc<Shared>,
}

impl AssetManager {
    /// Create a manager with default settings that runs loads on `spawner`
    /// and callbacks on `dispatcher`.
    pub fn new(spawner: Arc<dyn Spawner>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self::builder(spawner, dispatcher).build()
    }

    pub fn builder(spawner: Arc<dyn Spawner>, dispatcher: Arc<dyn Dispatcher>) -> AssetManagerBuilder {
        AssetManagerBuilder::new(spawner, dispatcher)
    }

    /// Register a loader for the type it produces, replacing any previous one.
    ///
    /// Returns `true` if a loader was replaced.
    pub fn add_loader<L: AssetLoader>(&self, loader: L) -> bool {
        self.shared.loaders.write().register(loader)
    }

    /// Check whether a loader produces `T`.
    pub fn has_loader_for<T: Asset>(&self) -> bool {
        self.shared.loaders.read().has_loader_for_type::<T>()
    }

    /// Names of every type with a registered loader.
    pub fn loader_type_names(&self) -> Vec<&'static str> {
        self.shared.loaders.read().type_names()
    }

    /// Request an asset.
    ///
    /// Returns a handle immediately; the load runs in the background. All
    /// requests for the same type and path share one entry. Fails right away
    /// with [`AssetError::UnsupportedType`] when no loader produces `T`, in
    /// which case no entry is created.
    pub fn load<T: Asset>(&self, path: impl Into<VirtualPath>) -> AssetResult<Handle<T>> {
        Shared::load::<T>(&self.shared, path.into())
    }

    /// Current status of an asset; `Unloaded` if there is no entry.
    pub fn status(&self, id: &AssetId) -> AssetStatus {
        self.shared.status(id, None)
    }

    /// The untyped payload of a ready asset.
    pub fn data(&self, id: &AssetId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.shared.payload(id, None).map(|payload| payload.into_any())
    }

    /// The payload of a ready asset, if `id` refers to a `T`.
    pub fn get<T: Asset>(&self, id: &AssetId) -> Option<Arc<T>> {
        if !id.is::<T>() {
            return None;
        }
        self.data(id)?.downcast::<T>().ok()
    }

    /// The error of a failed asset.
    pub fn error(&self, id: &AssetId) -> Option<Arc<AssetError>> {
        self.shared.error(id, None)
    }

    /// Run `callback` once the asset settles or is unloaded, on the
    /// dispatcher the manager was built with. Runs promptly if that already
    /// happened.
    pub fn add_callback(&self, id: &AssetId, callback: impl FnOnce() + Send + 'static) {
        self.shared
            .add_callback(id, None, self.shared.dispatcher(), Box::new(callback));
    }

    /// Like [`add_callback`](Self::add_callback), but on `dispatcher`.
    pub fn add_callback_on(
        &self,
        id: &AssetId,
        dispatcher: Arc<dyn Dispatcher>,
        callback: impl FnOnce() + Send + 'static,
    ) {
        self.shared
            .add_callback(id, None, dispatcher, Box::new(callback));
    }

    /// Remove an entry regardless of how many handles refer to it.
    ///
    /// An in-flight load is cancelled, a loaded payload is disposed and
    /// queued callbacks run. Returns `false` if there was no entry.
    pub fn unload(&self, id: &AssetId) -> bool {
        self.shared.unload(id, None)
    }

    /// Cancel an in-flight load. The entry stays, in the `Cancelled` state.
    ///
    /// For a ready asset that is being reloaded, only the reload is abandoned.
    /// Returns `false` if nothing was in flight.
    pub fn cancel(&self, id: &AssetId) -> bool {
        self.shared.cancel(id)
    }

    /// Re-run the loader of every ready asset loaded from `path`, whatever its
    /// type. Returns the number of reloads started.
    ///
    /// A `path` without a scheme covers that location under every scheme,
    /// which is how file watchers report changes.
    ///
    /// The current payload keeps being served until the reload succeeds. If
    /// it fails the asset keeps its previous version.
    pub fn reload(&self, path: impl Into<VirtualPath>) -> usize {
        self.shared.reload(&path.into())
    }

    /// Reload every asset whose file the watcher saw change.
    #[cfg(feature = "hot-reload")]
    pub fn process_hot_reload(&self, watcher: &mut crate::hot_reload::AssetWatcher) -> usize {
        profile_function!();
        watcher
            .poll_changes()
            .into_iter()
            .map(|path| self.reload(path))
            .sum()
    }

    /// Check whether an entry exists for `T` at `path`.
    pub fn contains<T: 'static>(&self, path: impl Into<VirtualPath>) -> bool {
        self.shared.contains(&AssetId::of::<T>(path))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.shared.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries.read().is_empty()
    }

    /// Ids of every entry.
    pub fn ids(&self) -> Vec<AssetId> {
        self.shared.entries.read().keys().cloned().collect()
    }

    /// Number of live handles to an asset.
    pub fn ref_count(&self, id: &AssetId) -> usize {
        self.shared.ref_count(id, None)
    }

    /// How many times the asset's payload was assigned.
    pub fn version(&self, id: &AssetId) -> Option<u32> {
        self.shared.version(id, None)
    }

    /// Sum of [`Asset::estimated_size`] over every ready asset.
    pub fn estimated_size(&self) -> usize {
        profile_scope!("estimated_size");
        self.shared
            .entries
            .read()
            .values()
            .filter_map(|entry| entry.payload())
            .map(|payload| payload.estimated_size())
            .sum()
    }

    /// Assets requested by the loader of `id`, kept alive by it.
    pub fn dependencies(&self, id: &AssetId) -> Vec<AssetId> {
        self.shared
            .with_entry(id, None, |entry| {
                entry.dependencies.iter().map(|dep| dep.id.clone()).collect()
            })
            .unwrap_or_default()
    }

    /// Take the events recorded since the last call, oldest first.
    pub fn drain_events(&self) -> Vec<AssetEvent> {
        self.shared.events.lock().drain()
    }

    /// A capability to request assets without access to the whole manager.
    pub fn resolver(&self) -> AssetResolver {
        AssetResolver::new(Arc::downgrade(&self.shared))
    }

    pub fn settings(&self) -> &AssetSettings {
        &self.shared.settings
    }

    /// The dispatcher used by [`add_callback`](Self::add_callback).
    pub fn dispatcher(&self) -> Arc<dyn Dispatcher> {
        self.shared.dispatcher()
    }

    /// Unload every asset, dispose every owned loader and clear the table.
    ///
    /// Idempotent. Loads requested afterwards fail with
    /// [`AssetError::Disposed`]. Also runs when the manager is dropped.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl std::fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetManager")
            .field("entries", &self.len())
            .field("loaders", &self.shared.loaders.read().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Builder for [`AssetManager`].
pub struct AssetManagerBuilder {
    spawner: Arc<dyn Spawner>,
    dispatcher: Arc<dyn Dispatcher>,
    settings: AssetSettings,
    parent: Option<Weak<Shared>>,
    loaders: LoaderRegistry,
}

impl AssetManagerBuilder {
    fn new(spawner: Arc<dyn Spawner>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            spawner,
            dispatcher,
            settings: AssetSettings::default(),
            parent: None,
            loaders: LoaderRegistry::new(),
        }
    }

    pub fn settings(mut self, settings: AssetSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Make this a child of `parent`.
    ///
    /// The child inherits the parent's loaders as registered at build time,
    /// and requests for assets the parent already holds return the parent's
    /// entry. Only a weak reference to the parent is kept.
    pub fn parent(mut self, parent: &AssetManager) -> Self {
        self.parent = Some(Arc::downgrade(&parent.shared));
        self
    }

    /// Register a loader up front.
    pub fn loader<L: AssetLoader>(mut self, loader: L) -> Self {
        self.loaders.register(loader);
        self
    }

    pub fn build(self) -> AssetManager {
        let mut loaders = self.loaders;
        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            loaders.inherit(&parent.loaders.read());
        }

        tracing::debug!("Created asset manager with {} loaders", loaders.len());

        AssetManager {
            shared: Arc::new(Shared {
                entries: RwLock::new(HashMap::default()),
                loaders: RwLock::new(loaders),
                events: Mutex::new(AssetEventBuffer::with_capacity(self.settings.event_capacity)),
                spawner: self.spawner,
                dispatcher: self.dispatcher,
                settings: self.settings,
                parent: self.parent,
                generations: GenerationCounter::new(),
                disposed: AtomicBool::new(false),
            }),
        }
    }
}
