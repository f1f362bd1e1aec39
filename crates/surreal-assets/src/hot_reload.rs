//! Hot reload support for assets during development.
//!
//! Watches a directory of asset files and reports which virtual paths
//! changed, so the manager can reload them.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use surreal_core::alloc::HashSet;

use crate::path::VirtualPath;

/// File watcher for hot-reloading assets.
///
/// Changed files are reported as virtual paths relative to the watched root,
/// which matches how assets are requested from a
/// [`FileReader`](crate::FileReader) with the same base path.
pub struct AssetWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
    root: PathBuf,
}

impl AssetWatcher {
    /// Watch `root` recursively.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, notify::Error> {
        let root = root.as_ref();
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        let (sender, receiver) = channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = sender.send(res);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        tracing::debug!("Watching directory for changes: {}", root.display());

        Ok(Self {
            _watcher: watcher,
            receiver,
            root,
        })
    }

    /// The watched directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a file system path below the root to a virtual path.
    pub fn virtual_path(&self, path: &Path) -> Option<VirtualPath> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        if segments.is_empty() {
            return None;
        }
        Some(VirtualPath::new(segments.join("/")))
    }

    /// Drain pending file events.
    ///
    /// Returns each changed path once, however many events it produced.
    pub fn poll_changes(&mut self) -> Vec<VirtualPath> {
        let mut seen = HashSet::new();
        let mut changed = Vec::new();

        while let Ok(event) = self.receiver.try_recv() {
            match event {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        continue;
                    }
                    for path in &event.paths {
                        let Some(virtual_path) = self.virtual_path(path) else {
                            continue;
                        };
                        if seen.insert(virtual_path.clone()) {
                            tracing::debug!("File changed, marking for reload: {}", virtual_path);
                            changed.push(virtual_path);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("File watcher error: {}", e);
                }
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_virtual_path_mapping() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = AssetWatcher::new(temp_dir.path()).unwrap();

        let file = watcher.root().join("textures").join("hero.png");
        assert_eq!(
            watcher.virtual_path(&file),
            Some(VirtualPath::new("textures/hero.png"))
        );
        assert_eq!(watcher.virtual_path(Path::new("/elsewhere/a.png")), None);
        assert_eq!(watcher.virtual_path(watcher.root()), None);
    }

    #[test]
    fn test_poll_changes_no_events() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher = AssetWatcher::new(temp_dir.path()).unwrap();
        assert!(watcher.poll_changes().is_empty());
    }

    #[test]
    fn test_poll_changes_deduplicates() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher = AssetWatcher::new(temp_dir.path()).unwrap();
        let file_path = watcher.root().join("test.txt");

        fs::write(&file_path, "initial content").unwrap();
        thread::sleep(Duration::from_millis(100));
        let _ = watcher.poll_changes();

        fs::write(&file_path, "modified content 1").unwrap();
        fs::write(&file_path, "modified content 2").unwrap();
        thread::sleep(Duration::from_millis(200));

        let changes = watcher.poll_changes();
        assert!(changes.len() <= 1, "Expected at most 1 change, got {}", changes.len());
    }
}
