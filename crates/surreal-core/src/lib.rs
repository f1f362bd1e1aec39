//! Surreal Core
//!
//! Shared building blocks for the Surreal engine crates: fast hash
//! collections, logging setup, profiling scopes and the background task pool.

pub mod alloc;
pub mod logging;
pub mod profiling;
pub mod task_pool;

pub use task_pool::TaskPool;
