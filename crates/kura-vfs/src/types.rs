//! Core VFS types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::path::{SEPARATOR, TenantRoot, base_name};

/// An authenticated tenant identifier.
///
/// Opaque to this crate: whoever verified the caller's credentials hands it
/// over, and it is only ever used to derive the tenant root.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(u64);

impl TenantId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// The key prefix owning every object of this tenant.
    pub fn root(&self) -> TenantRoot {
        TenantRoot::for_tenant(*self)
    }
}

impl From<u64> for TenantId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

/// Resource type, derived from the key alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceType {
    /// Regular object.
    File,
    /// Marker object or common prefix (key ends with `/`).
    Directory,
}

impl ResourceType {
    /// Classify a key: a trailing separator means directory, nothing else does.
    pub fn of_key(key: &str) -> Self {
        if key.ends_with(SEPARATOR) {
            ResourceType::Directory
        } else {
            ResourceType::File
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, ResourceType::Directory)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, ResourceType::File)
    }
}

/// A listing entry as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Path with the tenant root stripped (`/docs/report.pdf`).
    pub path: String,
    /// Last path segment.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: ResourceType,
}

impl Resource {
    /// Build a listing entry from a full object key.
    pub fn from_key(root: &TenantRoot, key: &str, size: u64) -> Self {
        let path = root.strip(key);
        Self {
            name: base_name(&path).to_string(),
            path,
            size,
            kind: ResourceType::of_key(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_of_key() {
        assert!(ResourceType::of_key("user-1-files/a/").is_directory());
        assert!(ResourceType::of_key("user-1-files/a").is_file());
    }

    #[test]
    fn test_resource_from_key() {
        let root = TenantId::new(3).root();
        let file = Resource::from_key(&root, "user-3-files/docs/report.pdf", 42);
        assert_eq!(file.path, "/docs/report.pdf");
        assert_eq!(file.name, "report.pdf");
        assert_eq!(file.size, 42);
        assert!(file.kind.is_file());

        let dir = Resource::from_key(&root, "user-3-files/docs/", 0);
        assert_eq!(dir.path, "/docs/");
        assert_eq!(dir.name, "docs");
        assert!(dir.kind.is_directory());
    }

    #[test]
    fn test_resource_json_shape() {
        let root = TenantId::new(1).root();
        let json = serde_json::to_value(Resource::from_key(&root, "user-1-files/d/", 0)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"path": "/d/", "name": "d", "size": 0, "type": "DIRECTORY"})
        );
    }
}
