//! Upload inputs: files and their filename → destination mapping.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

use crate::error::{VfsError, VfsResult};
use crate::path::{ResolvedPath, SEPARATOR, resolve};
use crate::store::{ByteStream, bytes_stream};

/// One uploaded file.
pub struct UploadFile {
    /// Original filename as sent by the client; the mapping key.
    pub filename: String,
    /// Declared size, if known.
    pub size: Option<u64>,
    pub body: ByteStream,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, body: ByteStream, size: Option<u64>) -> Self {
        Self {
            filename: filename.into(),
            size,
            body,
        }
    }

    /// File backed by an in-memory buffer.
    pub fn from_bytes(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self::new(filename, bytes_stream(data), Some(size))
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Where each uploaded file goes, keyed by original filename.
///
/// Values are interpreted against the upload directory, which is the upload
/// path itself whether or not it ends in `/`:
///
/// - a value starting with `/` is tenant-relative (`/f1/sub/`),
/// - anything else is relative to the upload directory (`sub/y.txt`),
/// - a value ending with `/` (or empty) names a directory and the file keeps
///   its own name.
///
/// Either way the destination must land inside the upload directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMapping(HashMap<String, String>);

impl UploadMapping {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self(entries)
    }

    /// Parse the JSON object clients send (`{"a.txt": "/docs/"}`).
    pub fn from_json(json: &str) -> VfsResult<Self> {
        serde_json::from_str(json)
            .map(Self)
            .map_err(|e| VfsError::malformed_mapping(format!("invalid paths JSON: {e}")))
    }

    pub fn get(&self, filename: &str) -> Option<&str> {
        self.0.get(filename).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve the destination for one file.
    ///
    /// Fails with `MalformedMapping` if the file has no entry or the entry
    /// points outside `base`, and with `TraversalDetected` if it escapes the
    /// tenant root.
    pub fn destination(&self, base: &ResolvedPath, filename: &str) -> VfsResult<ResolvedPath> {
        let mapped = self
            .get(filename)
            .ok_or_else(|| VfsError::malformed_mapping(format!("no path for {filename}")))?;
        if filename.is_empty() {
            return Err(VfsError::malformed_mapping("file without a name"));
        }

        let mut target = if mapped.starts_with(SEPARATOR) {
            mapped.to_string()
        } else {
            format!("{}/{}", base.relative().trim_end_matches(SEPARATOR), mapped)
        };
        if target.ends_with(SEPARATOR) {
            target.push_str(filename);
        }

        let resolved = resolve(base.tenant(), &target)?;
        let inside = resolved
            .key()
            .strip_prefix(base.key())
            .is_some_and(|rest| rest.len() > 1 && rest.starts_with(SEPARATOR));
        if !inside || resolved.is_directory() {
            return Err(VfsError::malformed_mapping(format!(
                "{filename} maps outside the upload directory"
            )));
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::TenantId;

    fn mapping(entries: &[(&str, &str)]) -> UploadMapping {
        UploadMapping::new(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn base(raw: &str) -> ResolvedPath {
        resolve(TenantId::new(1), raw).unwrap()
    }

    #[test]
    fn test_from_json() {
        let m = UploadMapping::from_json(r#"{"x.txt": "/f1/", "y.txt": "sub/"}"#).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("x.txt"), Some("/f1/"));

        let err = UploadMapping::from_json("not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedMapping);
        let err = UploadMapping::from_json(r#"["x.txt"]"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedMapping);
    }

    #[test]
    fn test_tenant_relative_directories() {
        let m = mapping(&[("x.txt", "/f1/"), ("y.txt", "/f1/sub/")]);
        let base = base("/f1/");
        assert_eq!(m.destination(&base, "x.txt").unwrap().key(), "user-1-files/f1/x.txt");
        assert_eq!(
            m.destination(&base, "y.txt").unwrap().key(),
            "user-1-files/f1/sub/y.txt"
        );
    }

    #[test]
    fn test_relative_entries() {
        let m = mapping(&[("a.txt", "nested/renamed.txt"), ("b.txt", ""), ("c.txt", "deep/")]);
        let base = base("/f1/");
        assert_eq!(
            m.destination(&base, "a.txt").unwrap().key(),
            "user-1-files/f1/nested/renamed.txt"
        );
        assert_eq!(m.destination(&base, "b.txt").unwrap().key(), "user-1-files/f1/b.txt");
        assert_eq!(m.destination(&base, "c.txt").unwrap().key(), "user-1-files/f1/deep/c.txt");
    }

    #[test]
    fn test_upload_into_tenant_root() {
        let m = mapping(&[("a.txt", "")]);
        let root = base("/");
        assert_eq!(m.destination(&root, "a.txt").unwrap().key(), "user-1-files/a.txt");
    }

    #[test]
    fn test_base_without_trailing_slash() {
        let m = mapping(&[("x.txt", "x.txt"), ("y.txt", "/f1/"), ("z.txt", "")]);
        let base = base("/f1");
        assert_eq!(m.destination(&base, "x.txt").unwrap().key(), "user-1-files/f1/x.txt");
        assert_eq!(m.destination(&base, "y.txt").unwrap().key(), "user-1-files/f1/y.txt");
        assert_eq!(m.destination(&base, "z.txt").unwrap().key(), "user-1-files/f1/z.txt");

        let outside = mapping(&[("x.txt", "/f1x.txt")]);
        let err = outside.destination(&base, "x.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedMapping);
    }

    #[test]
    fn test_missing_entry() {
        let m = mapping(&[("x.txt", "/f1/")]);
        let err = m.destination(&base("/f1/"), "other.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedMapping);
    }

    #[test]
    fn test_outside_upload_directory() {
        let m = mapping(&[("x.txt", "/elsewhere/"), ("y.txt", "../y.txt"), ("z.txt", "/f10/")]);
        let base = base("/f1/");
        for name in ["x.txt", "y.txt", "z.txt"] {
            let err = m.destination(&base, name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedMapping, "{name}");
        }
    }

    #[test]
    fn test_escaping_tenant_root() {
        let m = mapping(&[("x.txt", "../../../x.txt")]);
        let err = m.destination(&base("/f1/"), "x.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TraversalDetected);
    }
}
