//! Surreal Assets
//!
//! Asynchronous, deduplicated, type-keyed asset loading and caching.
//!
//! - [`AssetManager`] owns the entry table and the loader registry. Loading
//!   returns a [`Handle`] immediately; the loader runs on the host's
//!   [`Spawner`].
//! - At most one load is ever in flight per `(type, path)` pair: every
//!   request for the same [`AssetId`] shares one entry.
//! - Handles are reference counted. With the default
//!   [`CachePolicy::UnloadUnused`] an asset is unloaded when its last handle is
//!   dropped.
//! - Completion callbacks run on the [`Dispatcher`] they were registered with,
//!   and handles can be awaited.
//!
//! ```ignore
//! let main_thread = Arc::new(QueuedDispatcher::new());
//! let manager = AssetManager::new(Arc::new(TaskPool::default_threads()?), main_thread.clone());
//! manager.add_loader(TextLoader::new(Arc::new(FileReader::new("assets"))));
//!
//! let greeting = manager.load::<String>("greeting.txt")?;
//! let greeting = greeting.await?;
//! println!("{}", greeting.data()?);
//! ```

mod cancel;
mod dispatch;
mod error;
mod event;
mod handle;
#[cfg(feature = "hot-reload")]
mod hot_reload;
mod id;
mod io;
mod loader;
mod manager;
mod path;
mod settings;
mod state;

pub use cancel::{CancellationToken, Cancelled};
pub use dispatch::{
    BoxedTask, Callback, Dispatcher, ImmediateDispatcher, QueuedDispatcher, Spawner,
};
pub use error::{AssetError, AssetResult};
pub use event::{AssetEvent, AssetEventBuffer, DEFAULT_EVENT_CAPACITY};
pub use handle::{Handle, HandleFuture};
#[cfg(feature = "hot-reload")]
pub use hot_reload::AssetWatcher;
pub use id::AssetId;
pub use io::{BytesFuture, BytesReader, ExistsFuture, FileReader, MemoryReader};
pub use loader::{
    AssetLoader, AssetResolver, BytesLoader, LoadContext, LoadFuture, LoaderRegistry, TextLoader,
};
pub use manager::{AssetManager, AssetManagerBuilder};
pub use path::VirtualPath;
pub use settings::{AssetSettings, CachePolicy};
pub use state::AssetStatus;

/// A type that can be produced by a loader and cached by the manager.
pub trait Asset: Send + Sync + 'static {
    /// Human-readable name used in logs and errors.
    fn type_name() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }

    /// Approximate memory footprint in bytes, used for cache accounting.
    fn estimated_size(&self) -> usize {
        0
    }

    /// Release resources held by the asset.
    ///
    /// Called exactly once when the manager lets go of the payload (unload,
    /// reload replacement, manager dispose). Handles that already cloned the
    /// `Arc` keep the value alive; `Drop` runs when the last of them goes.
    fn dispose(&self) {}
}

impl Asset for String {
    fn type_name() -> &'static str {
        "String"
    }

    fn estimated_size(&self) -> usize {
        self.len()
    }
}

impl Asset for Vec<u8> {
    fn type_name() -> &'static str {
        "Vec<u8>"
    }

    fn estimated_size(&self) -> usize {
        self.len()
    }
}
