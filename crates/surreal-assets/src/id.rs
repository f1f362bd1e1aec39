//! Asset identifiers.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::path::VirtualPath;

/// Uniquely identifies a loadable asset: the type it is loaded as plus the
/// path it is loaded from.
///
/// The same path requested as two different types yields two different ids,
/// so a payload can never be observed under a type it was not loaded as.
/// Any type/path pair is a legal id; whether a loader exists is only checked
/// when loading.
#[derive(Clone)]
pub struct AssetId {
    type_id: TypeId,
    type_name: &'static str,
    path: VirtualPath,
}

impl AssetId {
    /// Create an id for type `T` at `path`.
    pub fn of<T: 'static>(path: impl Into<VirtualPath>) -> Self {
        Self::new(TypeId::of::<T>(), std::any::type_name::<T>(), path)
    }

    /// Create an id from raw type information.
    pub fn new(type_id: TypeId, type_name: &'static str, path: impl Into<VirtualPath>) -> Self {
        Self {
            type_id,
            type_name,
            path: path.into(),
        }
    }

    /// The type the asset is loaded as.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Human-readable name of the asset type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The path the asset is loaded from.
    pub fn path(&self) -> &VirtualPath {
        &self.path
    }

    /// Returns `true` if this id refers to an asset of type `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for AssetId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.path == other.path
    }
}

impl Eq for AssetId {}

impl Hash for AssetId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.path.hash(state);
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetId")
            .field("type", &self.type_name)
            .field("path", &self.path.as_str())
            .finish()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} as {}", self.path, self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surreal_core::alloc::HashSet;

    struct Texture;
    struct Sound;

    #[test]
    fn test_same_type_and_path_collide() {
        let mut ids = HashSet::new();
        ids.insert(AssetId::of::<Texture>("sprites/hero.png"));
        assert!(ids.contains(&AssetId::of::<Texture>("Sprites/HERO.png")));
    }

    #[test]
    fn test_type_separates_same_path() {
        let texture = AssetId::of::<Texture>("shared.bin");
        let sound = AssetId::of::<Sound>("shared.bin");
        assert_ne!(texture, sound);
        assert!(texture.is::<Texture>());
        assert!(!texture.is::<Sound>());
    }

    #[test]
    fn test_display_includes_type() {
        let id = AssetId::of::<String>("hello.txt");
        assert!(id.to_string().starts_with("hello.txt as "));
        assert!(id.type_name().contains("String"));
    }
}
