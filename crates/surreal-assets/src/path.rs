//! Virtual paths - where assets come from.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

const SCHEME_SEPARATOR: &str = "://";

/// An opaque, comparable location of an asset.
///
/// A path is either plain (`sprites/hero.png`) or carries a scheme
/// (`local://sprites/hero.png`, `memory://fonts/mono.ttf`). The original text is
/// kept for display; equality and hashing use a normalized key so that
/// requests differing only in case or separator style collide:
/// - lowercased
/// - `\` converted to `/`
/// - a leading `./` removed
#[derive(Clone)]
pub struct VirtualPath {
    raw: Arc<str>,
    key: Arc<str>,
}

impl VirtualPath {
    /// Create a virtual path from its textual form.
    pub fn new(path: impl AsRef<str>) -> Self {
        let raw: Arc<str> = Arc::from(path.as_ref());
        let key: Arc<str> = Arc::from(Self::normalize(&raw));
        Self { raw, key }
    }

    fn normalize(path: &str) -> String {
        let (scheme, location) = match path.split_once(SCHEME_SEPARATOR) {
            Some((scheme, location)) => (Some(scheme), location),
            None => (None, path),
        };

        let location = location.replace('\\', "/");
        let location = location.trim_start_matches("./");

        match scheme {
            Some(scheme) => format!("{}{}{}", scheme, SCHEME_SEPARATOR, location).to_lowercase(),
            None => location.to_lowercase(),
        }
    }

    /// The path exactly as it was provided.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The normalized key used for comparison and hashing.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The normalized key without its scheme.
    pub fn location_key(&self) -> &str {
        match self.key.split_once(SCHEME_SEPARATOR) {
            Some((_, location)) => location,
            None => &self.key,
        }
    }

    /// Whether `self` names the asset at `other`.
    ///
    /// A path without a scheme matches that location under any scheme, so a
    /// plain `textures/a.png` matches `local://textures/a.png`. A path with a
    /// scheme only matches the same scheme.
    pub fn matches(&self, other: &VirtualPath) -> bool {
        if self.scheme().is_some() {
            self == other
        } else {
            self.location_key() == other.location_key()
        }
    }

    /// The scheme, if the path has one.
    pub fn scheme(&self) -> Option<&str> {
        self.raw.split_once(SCHEME_SEPARATOR).map(|(scheme, _)| scheme)
    }

    /// The path without its scheme.
    pub fn location(&self) -> &str {
        match self.raw.split_once(SCHEME_SEPARATOR) {
            Some((_, location)) => location,
            None => &self.raw,
        }
    }

    /// The file extension (without the dot), if any.
    pub fn extension(&self) -> Option<&str> {
        let file_name = self.location().rsplit(['/', '\\']).next()?;
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Append a segment, inserting a separator when needed.
    pub fn join(&self, segment: impl AsRef<str>) -> Self {
        let segment = segment.as_ref().trim_start_matches(['/', '\\']);
        if self.raw.ends_with('/') || self.raw.ends_with('\\') || self.location().is_empty() {
            Self::new(format!("{}{}", self.raw, segment))
        } else {
            Self::new(format!("{}/{}", self.raw, segment))
        }
    }
}

impl PartialEq for VirtualPath {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for VirtualPath {}

impl Hash for VirtualPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VirtualPath").field(&self.raw).finish()
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for VirtualPath {
    fn from(path: &str) -> Self {
        VirtualPath::new(path)
    }
}

impl From<String> for VirtualPath {
    fn from(path: String) -> Self {
        VirtualPath::new(path)
    }
}

impl From<&String> for VirtualPath {
    fn from(path: &String) -> Self {
        VirtualPath::new(path)
    }
}

impl From<&Path> for VirtualPath {
    fn from(path: &Path) -> Self {
        VirtualPath::new(path.to_string_lossy())
    }
}

impl From<&VirtualPath> for VirtualPath {
    fn from(path: &VirtualPath) -> Self {
        path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(path: &VirtualPath) -> u64 {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_case_insensitive_equality_matches_hash() {
        let a = VirtualPath::new("Sprites/Hero.PNG");
        let b = VirtualPath::new("sprites/hero.png");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        // Display keeps the original text.
        assert_eq!(a.to_string(), "Sprites/Hero.PNG");
    }

    #[test]
    fn test_separators_and_leading_dot_are_normalized() {
        assert_eq!(VirtualPath::new("./maps\\level1.json"), VirtualPath::new("maps/level1.json"));
    }

    #[test]
    fn test_scheme_and_location() {
        let path = VirtualPath::new("local://textures/player.png");
        assert_eq!(path.scheme(), Some("local"));
        assert_eq!(path.location(), "textures/player.png");
        assert_ne!(path, VirtualPath::new("textures/player.png"));
        assert_eq!(VirtualPath::new("player.png").scheme(), None);
    }

    #[test]
    fn test_plain_path_matches_any_scheme() {
        let local = VirtualPath::new("local://Textures/A.png");
        let memory = VirtualPath::new("memory://textures/a.png");
        let plain = VirtualPath::new("textures\\a.png");

        assert_eq!(local.location_key(), "textures/a.png");
        assert!(plain.matches(&local));
        assert!(plain.matches(&memory));
        assert!(local.matches(&VirtualPath::new("LOCAL://textures/a.png")));
        assert!(!local.matches(&memory));
        assert!(!local.matches(&plain));
        assert!(!plain.matches(&VirtualPath::new("textures/b.png")));
    }

    #[test]
    fn test_extension_extraction() {
        assert_eq!(VirtualPath::new("textures/player.png").extension(), Some("png"));
        assert_eq!(VirtualPath::new("memory://model.gltf").extension(), Some("gltf"));
        assert_eq!(VirtualPath::new("config/.hidden").extension(), None);
        assert_eq!(VirtualPath::new("some.dir/readme").extension(), None);
    }

    #[test]
    fn test_join() {
        let root = VirtualPath::new("local://assets");
        assert_eq!(root.join("a.txt").as_str(), "local://assets/a.txt");
        assert_eq!(VirtualPath::new("assets/").join("/b.txt").as_str(), "assets/b.txt");
    }
}
