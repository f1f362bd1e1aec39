//! Test utilities for the Surreal engine.
//!
//! Scripted loaders and observation helpers for exercising the asset manager
//! without real files or real resource types:
//!
//! - [`ScriptedLoader`] - a loader whose outcome (success, failure, panic)
//!   and timing (held behind a [`Gate`]) the test controls
//! - [`Texture`] / [`Sound`] - stand-in asset types
//! - [`DisposeTracker`] - records every `dispose` call
//! - [`ThreadDispatcher`] / [`RecordingDispatcher`] - execution contexts that
//!   let tests see where and how callbacks ran
//!
//! # Example
//!
//! ```ignore
//! let gate = Gate::new();
//! let calls = LoadCounter::new();
//! manager.add_loader(ScriptedLoader::new(Texture::new).gated(&gate).counted(&calls));
//!
//! let a = manager.load::<Texture>("sprites/hero.png")?;
//! let b = manager.load::<Texture>("sprites/hero.png")?;
//! assert!(a.is_loading() && b.is_loading());
//!
//! gate.open();
//! // ...drive the spawner...
//! assert_eq!(calls.get(), 1);
//! ```

mod dispatchers;
mod loaders;

pub use dispatchers::{RecordingDispatcher, ThreadDispatcher};
pub use loaders::{DisposeTracker, Gate, LoadCounter, ScriptedLoader, Sound, Texture};
