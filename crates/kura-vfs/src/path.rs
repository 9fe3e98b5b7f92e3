//! Path resolution: user-facing paths to tenant-scoped object keys.
//!
//! Resolution is purely lexical. It never touches the store, so it can run
//! before any I/O and reject bad input with no side effects.

use std::fmt;

use crate::error::{VfsError, VfsResult};
use crate::types::TenantId;

/// Key separator. Object stores are flat; `/` is only a naming convention.
pub const SEPARATOR: char = '/';

/// The key prefix owning all objects of one tenant (`user-<id>-files`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantRoot(String);

impl TenantRoot {
    pub fn for_tenant(tenant: TenantId) -> Self {
        Self(format!("user-{}-files", tenant.get()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The root with a trailing separator, for prefix listings.
    pub fn prefix(&self) -> String {
        format!("{}{}", self.0, SEPARATOR)
    }

    /// True if `key` is the root itself or lies below it.
    ///
    /// A bare `starts_with` is not enough: `user-1-files-x/...` starts with
    /// `user-1-files` but belongs to nobody.
    pub fn contains(&self, key: &str) -> bool {
        match key.strip_prefix(self.0.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
            None => false,
        }
    }

    /// Strip the root from a key, keeping the leading separator.
    pub fn strip(&self, key: &str) -> String {
        match key.strip_prefix(self.0.as_str()) {
            Some("") => SEPARATOR.to_string(),
            Some(rest) => rest.to_string(),
            None => key.to_string(),
        }
    }
}

impl fmt::Display for TenantRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated path, bound to one tenant.
///
/// `key` is canonical: no `.`/`..` segments, no doubled or trailing
/// separators, and always inside the tenant root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    tenant: TenantId,
    original: String,
    is_directory: bool,
    key: String,
}

impl ResolvedPath {
    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    /// The raw string the caller supplied.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// True iff the raw path ended with a separator.
    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Canonical object key, without trailing separator.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Key with a trailing separator, for directory-scoped listings.
    pub fn key_with_slash(&self) -> String {
        format!("{}{}", self.key, SEPARATOR)
    }

    /// The directory holding this path: the key itself for directories,
    /// otherwise everything before the last separator.
    pub fn dir_key(&self) -> &str {
        if self.is_directory {
            return &self.key;
        }
        match self.key.rfind(SEPARATOR) {
            Some(idx) => &self.key[..idx],
            None => &self.key,
        }
    }

    /// Last segment of the key.
    pub fn base_name(&self) -> &str {
        base_name(&self.key)
    }

    pub fn root(&self) -> TenantRoot {
        self.tenant.root()
    }

    /// True if the path resolved to the tenant root itself.
    pub fn is_tenant_root(&self) -> bool {
        self.key == self.root().as_str()
    }

    /// Tenant-relative form of the key (`/docs/a.txt`, or `/` for the root).
    pub fn relative(&self) -> String {
        self.root().strip(&self.key)
    }
}

/// Resolve a user path for a tenant.
///
/// The path is joined onto the tenant root and normalized lexically. Any
/// result outside the root fails with [`VfsError::TraversalDetected`]; this
/// is the only thing keeping tenants out of each other's keys.
pub fn resolve(tenant: TenantId, raw: &str) -> VfsResult<ResolvedPath> {
    if raw.is_empty() {
        return Err(VfsError::EmptyPath);
    }

    let is_directory = raw.ends_with(SEPARATOR);
    let root = tenant.root();

    let mut segments: Vec<&str> = root.as_str().split(SEPARATOR).collect();
    for segment in raw.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(VfsError::traversal(raw));
                }
            }
            s => segments.push(s),
        }
    }

    let key = segments.join("/");
    if !root.contains(&key) {
        return Err(VfsError::traversal(raw));
    }

    Ok(ResolvedPath {
        tenant,
        original: raw.to_string(),
        is_directory,
        key,
    })
}

/// Last non-empty segment of a key (`a/b/` → `b`).
pub(crate) fn base_name(key: &str) -> &str {
    let trimmed = key.trim_end_matches(SEPARATOR);
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}
