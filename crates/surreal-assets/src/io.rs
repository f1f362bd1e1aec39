//! Byte sources for loaders.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use surreal_core::alloc::HashMap;

use crate::error::{AssetError, AssetResult};
use crate::path::VirtualPath;

/// Future type for async byte loading.
pub type BytesFuture = Pin<Box<dyn Future<Output = AssetResult<Vec<u8>>> + Send + 'static>>;

/// Future type for existence checks.
pub type ExistsFuture = Pin<Box<dyn Future<Output = bool> + Send + 'static>>;

/// Trait for loading bytes from various sources.
pub trait BytesReader: Send + Sync {
    /// Read all bytes at a path.
    fn read_bytes(&self, path: &VirtualPath) -> BytesFuture;

    /// Check if a path exists.
    fn exists(&self, path: &VirtualPath) -> ExistsFuture;
}

/// Reads files relative to a base directory.
///
/// The scheme of a virtual path is ignored; only its location is resolved.
/// The read itself happens when the returned future is first polled, so it
/// runs on whichever thread drives the load.
pub struct FileReader {
    base_path: PathBuf,
}

impl FileReader {
    /// Create a new file reader with a base path.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// The directory relative paths are resolved against.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a virtual path to a file system path.
    pub fn resolve(&self, path: &VirtualPath) -> PathBuf {
        let location = Path::new(path.location());
        if location.is_absolute() {
            location.to_path_buf()
        } else {
            self.base_path.join(location)
        }
    }

    /// Read bytes synchronously.
    pub fn read_bytes_sync(&self, path: &VirtualPath) -> AssetResult<Vec<u8>> {
        read_file(self.resolve(path))
    }
}

fn read_file(full_path: PathBuf) -> AssetResult<Vec<u8>> {
    std::fs::read(&full_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AssetError::NotFound {
                path: full_path.display().to_string(),
            }
        } else {
            AssetError::Io {
                path: full_path.clone(),
                source: e,
            }
        }
    })
}

impl BytesReader for FileReader {
    fn read_bytes(&self, path: &VirtualPath) -> BytesFuture {
        let full_path = self.resolve(path);
        Box::pin(async move { read_file(full_path) })
    }

    fn exists(&self, path: &VirtualPath) -> ExistsFuture {
        let full_path = self.resolve(path);
        Box::pin(async move { full_path.exists() })
    }
}

/// In-memory bytes reader for tests and embedded assets.
///
/// Lookups use the normalized path key, so `Fonts/Mono.ttf` finds bytes
/// inserted as `fonts/mono.ttf`.
#[derive(Default)]
pub struct MemoryReader {
    files: RwLock<HashMap<VirtualPath, Arc<[u8]>>>,
}

impl MemoryReader {
    /// Create a new empty memory reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the bytes for a path.
    pub fn insert(&self, path: impl Into<VirtualPath>, bytes: impl Into<Vec<u8>>) {
        self.files.write().insert(path.into(), Arc::from(bytes.into()));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(self, path: impl Into<VirtualPath>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    /// Remove the bytes for a path.
    pub fn remove(&self, path: impl Into<VirtualPath>) -> bool {
        self.files.write().remove(&path.into()).is_some()
    }

    /// Check if bytes exist for a path.
    pub fn contains(&self, path: impl Into<VirtualPath>) -> bool {
        self.files.read().contains_key(&path.into())
    }
}

impl BytesReader for MemoryReader {
    fn read_bytes(&self, path: &VirtualPath) -> BytesFuture {
        let result = self
            .files
            .read()
            .get(path)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| AssetError::NotFound {
                path: path.to_string(),
            });
        Box::pin(async move { result })
    }

    fn exists(&self, path: &VirtualPath) -> ExistsFuture {
        let exists = self.files.read().contains_key(path);
        Box::pin(async move { exists })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reader_uses_normalized_keys() {
        let reader = MemoryReader::new().with("Fonts/Mono.ttf", b"font".to_vec());
        let bytes = pollster::block_on(reader.read_bytes(&VirtualPath::new("fonts/mono.ttf")));
        assert_eq!(bytes.unwrap(), b"font");
        assert!(reader.contains("./fonts/mono.ttf"));
        assert!(reader.remove("fonts/mono.ttf"));
        assert!(!pollster::block_on(reader.exists(&VirtualPath::new("fonts/mono.ttf"))));
    }

    #[test]
    fn test_memory_reader_missing_path() {
        let reader = MemoryReader::new();
        let result = pollster::block_on(reader.read_bytes(&VirtualPath::new("nope.bin")));
        assert!(matches!(result, Err(AssetError::NotFound { .. })));
    }

    #[test]
    fn test_file_reader_resolves_location() {
        let reader = FileReader::new("assets");
        let resolved = reader.resolve(&VirtualPath::new("local://textures/a.png"));
        assert_eq!(resolved, Path::new("assets").join("textures/a.png"));
    }

    #[test]
    fn test_file_reader_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), b"hello").unwrap();

        let reader = FileReader::new(dir.path());
        let path = VirtualPath::new("hello.txt");
        assert!(pollster::block_on(reader.exists(&path)));
        assert_eq!(pollster::block_on(reader.read_bytes(&path)).unwrap(), b"hello");

        let missing = reader.read_bytes_sync(&VirtualPath::new("missing.txt"));
        assert!(matches!(missing, Err(AssetError::NotFound { .. })));
    }
}
