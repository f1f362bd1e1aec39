//! Profiling utilities based on the `puffin` crate.
//!
//! With the `profiling` feature disabled the scope macros expand to nothing.

#[cfg(feature = "profiling")]
pub use puffin::{profile_function, profile_scope};

#[cfg(not(feature = "profiling"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __surreal_profile_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "profiling"))]
pub use crate::__surreal_profile_noop as profile_function;
#[cfg(not(feature = "profiling"))]
pub use crate::__surreal_profile_noop as profile_scope;

/// Turn scope collection on or off.
#[cfg(feature = "profiling")]
pub fn set_enabled(enabled: bool) {
    puffin::set_scopes_on(enabled);
}

#[cfg(not(feature = "profiling"))]
pub fn set_enabled(_enabled: bool) {}

/// Mark the start of a new frame for profiling.
///
/// Hosts that pump the asset manager from a game loop call this once per tick.
#[inline]
pub fn new_frame() {
    #[cfg(feature = "profiling")]
    puffin::GlobalProfiler::lock().new_frame();
}
