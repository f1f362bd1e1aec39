//! Error types for the asset system.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::state::AssetStatus;

/// Errors that can occur during asset operations.
#[derive(Debug)]
pub enum AssetError {
    /// No loader is registered for the requested asset type.
    UnsupportedType {
        /// Human-readable name of the requested type.
        type_name: &'static str,
    },

    /// The asynchronous load of an asset failed.
    LoadFailed {
        /// The path that failed to load.
        path: String,
        /// What the loader (or the runtime around it) reported.
        cause: Arc<AssetError>,
    },

    /// The requested asset was not found by the byte reader.
    NotFound {
        /// The path or identifier of the asset.
        path: String,
    },

    /// Failed to read asset data from the source.
    Io {
        /// The path that failed to load.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The loader failed to parse/decode the asset.
    Loader {
        /// The path being loaded.
        path: String,
        /// Description of the error.
        message: String,
    },

    /// The loader panicked while producing the asset.
    Panicked {
        /// The path being loaded.
        path: String,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// Asset data was requested while the asset was not ready.
    InvalidState {
        /// The path of the asset.
        path: String,
        /// The status observed at the time of the request.
        status: AssetStatus,
    },

    /// Type mismatch when accessing an asset.
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Type name the asset was registered under.
        actual: &'static str,
    },

    /// The load was cancelled before it completed.
    Cancelled {
        /// The path of the asset.
        path: String,
    },

    /// The asset manager has been disposed.
    Disposed,

    /// Generic error with a message.
    Other {
        /// Error message.
        message: String,
    },
}

impl AssetError {
    /// Shorthand for a loader error.
    pub fn loader(path: impl fmt::Display, message: impl Into<String>) -> Self {
        AssetError::Loader {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// The error at the root of a `LoadFailed` chain, or `self`.
    pub fn root_cause(&self) -> &AssetError {
        match self {
            AssetError::LoadFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Returns `true` for `Cancelled`, including a cancelled cause of `LoadFailed`.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), AssetError::Cancelled { .. })
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::UnsupportedType { type_name } => {
                write!(f, "An unsupported asset type was requested: {}", type_name)
            }
            AssetError::LoadFailed { path, cause } => {
                write!(f, "Failed to load '{}': {}", path, cause)
            }
            AssetError::NotFound { path } => {
                write!(f, "Asset not found: {}", path)
            }
            AssetError::Io { path, source } => {
                write!(f, "IO error loading '{}': {}", path.display(), source)
            }
            AssetError::Loader { path, message } => {
                write!(f, "Loader error for '{}': {}", path, message)
            }
            AssetError::Panicked { path, message } => {
                write!(f, "Loader panicked for '{}': {}", path, message)
            }
            AssetError::InvalidState { path, status } => {
                write!(f, "Asset '{}' is not ready (status: {:?})", path, status)
            }
            AssetError::TypeMismatch { expected, actual } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, actual)
            }
            AssetError::Cancelled { path } => {
                write!(f, "Loading '{}' was cancelled", path)
            }
            AssetError::Disposed => {
                write!(f, "The asset manager has been disposed")
            }
            AssetError::Other { message } => {
                write!(f, "Asset error: {}", message)
            }
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::Io { source, .. } => Some(source),
            AssetError::LoadFailed { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_root_cause_unwraps_load_failures() {
        let err = AssetError::LoadFailed {
            path: "a.txt".into(),
            cause: Arc::new(AssetError::Cancelled { path: "a.txt".into() }),
        };
        assert!(err.is_cancelled());
        assert!(matches!(err.root_cause(), AssetError::Cancelled { .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_display_names_the_type() {
        let err = AssetError::UnsupportedType { type_name: "Texture" };
        assert_eq!(err.to_string(), "An unsupported asset type was requested: Texture");
    }
}
