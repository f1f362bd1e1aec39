//! Asset loader traits and infrastructure.

use std::any::TypeId;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use surreal_core::alloc::HashMap;

use crate::Asset;
use crate::cancel::CancellationToken;
use crate::error::{AssetError, AssetResult};
use crate::handle::Handle;
use crate::id::AssetId;
use crate::io::BytesReader;
use crate::manager::Shared;
use crate::path::VirtualPath;
use crate::state::{AssetStatus, Dependency, Payload};

/// Future returned by [`AssetLoader::load`].
pub type LoadFuture<A> = Pin<Box<dyn Future<Output = AssetResult<A>> + Send + 'static>>;

/// Trait for producing assets of one type.
///
/// Implement this trait to add support for loading a specific asset type.
/// A manager holds at most one loader per asset type.
///
/// # Example
///
/// ```ignore
/// struct LevelLoader {
///     reader: Arc<dyn BytesReader>,
/// }
///
/// impl AssetLoader for LevelLoader {
///     type Asset = Level;
///
///     fn load(&self, ctx: LoadContext) -> LoadFuture<Level> {
///         let reader = self.reader.clone();
///         Box::pin(async move {
///             let bytes = reader.read_bytes(ctx.path()).await?;
///             let tileset = ctx.load_data::<Tileset>("tiles/overworld.png").await?;
///             Level::parse(&bytes, tileset)
///         })
///     }
/// }
/// ```
pub trait AssetLoader: Send + Sync + 'static {
    /// The asset type this loader produces.
    type Asset: Asset;

    /// Start loading the asset described by `ctx`.
    ///
    /// The returned future is polled on the manager's spawner, never on the
    /// thread that requested the asset. Failing (or panicking) marks the
    /// entry as failed.
    fn load(&self, ctx: LoadContext) -> LoadFuture<Self::Asset>;

    /// Release resources held by the loader. Called when the owning manager
    /// is disposed.
    fn dispose(&self) {}
}

pub(crate) type ErasedLoadFuture =
    Pin<Box<dyn Future<Output = AssetResult<Payload>> + Send + 'static>>;

/// Type-erased asset loader for dynamic dispatch.
pub(crate) trait ErasedAssetLoader: Send + Sync {
    fn asset_type_id(&self) -> TypeId;

    fn asset_type_name(&self) -> &'static str;

    fn loader_name(&self) -> &'static str;

    fn load_erased(&self, ctx: LoadContext) -> ErasedLoadFuture;

    fn dispose(&self);
}

impl<L: AssetLoader> ErasedAssetLoader for L {
    fn asset_type_id(&self) -> TypeId {
        TypeId::of::<L::Asset>()
    }

    fn asset_type_name(&self) -> &'static str {
        <L::Asset as Asset>::type_name()
    }

    fn loader_name(&self) -> &'static str {
        std::any::type_name::<L>()
    }

    fn load_erased(&self, ctx: LoadContext) -> ErasedLoadFuture {
        let future = self.load(ctx);
        Box::pin(async move {
            let asset = future.await?;
            Ok(Arc::new(asset) as Payload)
        })
    }

    fn dispose(&self) {
        AssetLoader::dispose(self)
    }
}

struct RegisteredLoader {
    loader: Arc<dyn ErasedAssetLoader>,
    /// Copied from a parent manager; the parent disposes it.
    inherited: bool,
}

/// Registry of asset loaders, indexed by the asset type they produce.
///
/// Registration is last-write-wins: adding a loader for a type that already
/// has one replaces it, and the replacement is logged. Loads already running
/// on the old loader finish normally.
#[derive(Default)]
pub struct LoaderRegistry {
    by_type: HashMap<TypeId, RegisteredLoader>,
}

impl LoaderRegistry {
    /// Create a new empty loader registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loader for the type it produces.
    ///
    /// Returns `true` if a loader for the same type was replaced.
    pub fn register<L: AssetLoader>(&mut self, loader: L) -> bool {
        self.insert(Arc::new(loader), false)
    }

    fn insert(&mut self, loader: Arc<dyn ErasedAssetLoader>, inherited: bool) -> bool {
        let type_name = loader.asset_type_name();
        let loader_name = loader.loader_name();
        let previous = self
            .by_type
            .insert(loader.asset_type_id(), RegisteredLoader { loader, inherited });

        match previous {
            Some(previous) => {
                tracing::warn!(
                    "Replacing loader {} for {} with {}",
                    previous.loader.loader_name(),
                    type_name,
                    loader_name
                );
                true
            }
            None => {
                tracing::debug!("Registered loader {} for {}", loader_name, type_name);
                false
            }
        }
    }

    /// Copy every loader of `parent` for types this registry does not cover.
    pub(crate) fn inherit(&mut self, parent: &LoaderRegistry) {
        for (type_id, registered) in &parent.by_type {
            self.by_type.entry(*type_id).or_insert_with(|| RegisteredLoader {
                loader: registered.loader.clone(),
                inherited: true,
            });
        }
    }

    /// Find the loader for `T`, or fail with `UnsupportedType`.
    pub(crate) fn resolve<T: Asset>(&self) -> AssetResult<Arc<dyn ErasedAssetLoader>> {
        self.get(TypeId::of::<T>())
            .ok_or(AssetError::UnsupportedType {
                type_name: T::type_name(),
            })
    }

    pub(crate) fn get(&self, type_id: TypeId) -> Option<Arc<dyn ErasedAssetLoader>> {
        self.by_type.get(&type_id).map(|r| r.loader.clone())
    }

    /// Check whether a loader produces `T`.
    pub fn has_loader_for_type<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Get the number of registered loaders.
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// Check if no loaders are registered.
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Names of every type with a registered loader.
    pub fn type_names(&self) -> Vec<&'static str> {
        self.by_type
            .values()
            .map(|r| r.loader.asset_type_name())
            .collect()
    }

    /// Empty the registry, returning the loaders it owns.
    pub(crate) fn drain_owned(&mut self) -> Vec<Arc<dyn ErasedAssetLoader>> {
        self.by_type
            .drain()
            .filter(|(_, r)| !r.inherited)
            .map(|(_, r)| r.loader)
            .collect()
    }
}

/// The narrow capability loaders get for requesting other assets.
///
/// Holds only a weak reference, so a resolver kept past the manager's
/// lifetime fails with [`AssetError::Disposed`].
#[derive(Clone)]
pub struct AssetResolver {
    shared: Weak<Shared>,
}

impl AssetResolver {
    pub(crate) fn new(shared: Weak<Shared>) -> Self {
        Self { shared }
    }

    /// Request an asset. Same semantics as [`AssetManager::load`](crate::AssetManager::load).
    pub fn load<T: Asset>(&self, path: impl Into<VirtualPath>) -> AssetResult<Handle<T>> {
        let shared = self.shared.upgrade().ok_or(AssetError::Disposed)?;
        Shared::load::<T>(&shared, path.into())
    }

    /// Current status of an asset.
    pub fn status(&self, id: &AssetId) -> AssetStatus {
        match self.shared.upgrade() {
            Some(shared) => shared.status(id, None),
            None => AssetStatus::Unloaded,
        }
    }
}

impl std::fmt::Debug for AssetResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetResolver")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

/// Context provided to asset loaders during loading.
#[derive(Clone)]
pub struct LoadContext {
    id: AssetId,
    cancel: CancellationToken,
    resolver: AssetResolver,
    dependencies: Arc<Mutex<Vec<Dependency>>>,
}

impl LoadContext {
    pub(crate) fn new(
        id: AssetId,
        cancel: CancellationToken,
        resolver: AssetResolver,
        dependencies: Arc<Mutex<Vec<Dependency>>>,
    ) -> Self {
        Self {
            id,
            cancel,
            resolver,
            dependencies,
        }
    }

    /// The id of the asset being loaded.
    pub fn id(&self) -> &AssetId {
        &self.id
    }

    /// The path of the asset being loaded.
    pub fn path(&self) -> &VirtualPath {
        self.id.path()
    }

    /// Token tripped when the load is cancelled or the entry unloaded.
    ///
    /// The manager already abandons the load future on cancellation; loaders
    /// doing blocking work can check it between steps.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    /// Request another asset this one depends on.
    ///
    /// The dependency is kept loaded for as long as the entry being loaded
    /// exists. Requesting the asset being loaded fails, since waiting on it
    /// would never finish.
    pub fn load<U: Asset>(&self, path: impl Into<VirtualPath>) -> AssetResult<Handle<U>> {
        let path = path.into();
        if AssetId::of::<U>(path.clone()) == self.id {
            return Err(AssetError::loader(&path, "asset depends on itself"));
        }
        let handle = self.resolver.load::<U>(path)?;
        self.dependencies.lock().push(Dependency {
            id: handle.id().clone(),
            _keep_alive: Box::new(handle.clone()),
        });
        Ok(handle)
    }

    /// Request a dependency and wait for its data.
    pub async fn load_data<U: Asset>(&self, path: impl Into<VirtualPath>) -> AssetResult<Arc<U>> {
        let handle = self.load::<U>(path)?.await?;
        handle.data()
    }
}

/// Loads UTF-8 text files as `String`.
pub struct TextLoader {
    reader: Arc<dyn BytesReader>,
}

impl TextLoader {
    pub fn new(reader: Arc<dyn BytesReader>) -> Self {
        Self { reader }
    }
}

impl AssetLoader for TextLoader {
    type Asset = String;

    fn load(&self, ctx: LoadContext) -> LoadFuture<String> {
        let reader = self.reader.clone();
        Box::pin(async move {
            let bytes = reader.read_bytes(ctx.path()).await?;
            String::from_utf8(bytes)
                .map_err(|e| AssetError::loader(ctx.path(), format!("Invalid UTF-8: {}", e)))
        })
    }
}

/// Loads raw bytes as `Vec<u8>`.
pub struct BytesLoader {
    reader: Arc<dyn BytesReader>,
}

impl BytesLoader {
    pub fn new(reader: Arc<dyn BytesReader>) -> Self {
        Self { reader }
    }
}

impl AssetLoader for BytesLoader {
    type Asset = Vec<u8>;

    fn load(&self, ctx: LoadContext) -> LoadFuture<Vec<u8>> {
        let reader = self.reader.clone();
        Box::pin(async move { reader.read_bytes(ctx.path()).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;

    struct Texture;

    impl Asset for Texture {}

    struct TextureLoader;

    impl AssetLoader for TextureLoader {
        type Asset = Texture;

        fn load(&self, _ctx: LoadContext) -> LoadFuture<Texture> {
            Box::pin(async { Ok(Texture) })
        }
    }

    struct OtherTextureLoader;

    impl AssetLoader for OtherTextureLoader {
        type Asset = Texture;

        fn load(&self, _ctx: LoadContext) -> LoadFuture<Texture> {
            Box::pin(async { Err(AssetError::Other { message: "unused".into() }) })
        }
    }

    fn context(path: &str) -> LoadContext {
        LoadContext::new(
            AssetId::of::<String>(path),
            CancellationToken::new(),
            AssetResolver::new(Weak::new()),
            Arc::default(),
        )
    }

    #[test]
    fn test_registry_last_write_wins() {
        let mut registry = LoaderRegistry::new();
        assert!(!registry.register(TextureLoader));
        assert!(registry.register(OtherTextureLoader));
        assert_eq!(registry.len(), 1);
        assert!(registry.has_loader_for_type::<Texture>());

        let loader = registry.resolve::<Texture>().unwrap();
        assert!(loader.loader_name().contains("OtherTextureLoader"));
    }

    #[test]
    fn test_resolve_unsupported_type() {
        let registry = LoaderRegistry::new();
        let err = registry.resolve::<Texture>().err().unwrap();
        assert!(matches!(err, AssetError::UnsupportedType { .. }));
        assert!(!registry.has_loader_for_type::<Texture>());
    }

    #[test]
    fn test_inherited_loaders_are_not_drained() {
        let mut parent = LoaderRegistry::new();
        parent.register(TextureLoader);

        let mut child = LoaderRegistry::new();
        child.register(TextLoader::new(Arc::new(MemoryReader::new())));
        child.inherit(&parent);
        assert_eq!(child.len(), 2);
        assert!(child.has_loader_for_type::<Texture>());

        let owned = child.drain_owned();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].asset_type_id(), TypeId::of::<String>());
        assert!(child.is_empty());
    }

    #[test]
    fn test_text_loader() {
        let reader = Arc::new(MemoryReader::new().with("hello.txt", "hello world"));
        let loader = TextLoader::new(reader);
        let text = pollster::block_on(loader.load(context("hello.txt"))).unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn test_text_loader_rejects_invalid_utf8() {
        let reader = Arc::new(MemoryReader::new().with("bad.txt", vec![0xff, 0xfe]));
        let loader = TextLoader::new(reader);
        let err = pollster::block_on(loader.load(context("bad.txt"))).err().unwrap();
        assert!(matches!(err, AssetError::Loader { .. }));
    }

    #[test]
    fn test_self_dependency_is_rejected() {
        let ctx = context("Notes.txt");
        let err = ctx.load::<String>("notes.txt").err().unwrap();
        assert!(matches!(err, AssetError::Loader { .. }));
        assert!(err.to_string().contains("depends on itself"));

        // Same path as another type is a different asset.
        let err = ctx.load::<Vec<u8>>("notes.txt").err().unwrap();
        assert!(matches!(err, AssetError::Disposed));
    }

    #[test]
    fn test_resolver_without_manager() {
        let ctx = context("a.txt");
        let err = ctx.load::<String>("b.txt").err().unwrap();
        assert!(matches!(err, AssetError::Disposed));
        assert_eq!(ctx.resolver().status(ctx.id()), AssetStatus::Unloaded);
    }
}
