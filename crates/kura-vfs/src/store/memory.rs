//! In-memory object store.
//!
//! Used for testing and ephemeral runs. All data is lost when dropped.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use parking_lot::RwLock;

use super::{ByteStream, ListOptions, ObjectInfo, ObjectStore, ObjectStream, bytes_stream, collect_bytes};
use crate::error::{VfsError, VfsResult};
use crate::path::SEPARATOR;

/// In-memory object store.
///
/// Keys are kept in a `BTreeMap`, so listings come back in lexicographic
/// order like an S3 bucket. Deleting a missing key fails with `NotFound`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects (markers included).
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Collect a listing eagerly while holding the read lock.
    fn snapshot(&self, prefix: &str, opts: &ListOptions) -> Vec<ObjectInfo> {
        let objects = self.objects.read();
        let mut result: Vec<ObjectInfo> = Vec::new();

        let range = objects.range::<str, _>((Bound::Included(prefix), Bound::Unbounded));
        for (key, data) in range {
            if !key.starts_with(prefix) {
                break;
            }

            let entry = if opts.recursive {
                ObjectInfo::new(key.clone(), data.len() as u64)
            } else {
                let rest = &key[prefix.len()..];
                match rest.find(SEPARATOR) {
                    // Deeper key: fold into its first-level common prefix
                    Some(idx) => ObjectInfo::new(format!("{}{}", prefix, &rest[..=idx]), 0),
                    None => ObjectInfo::new(key.clone(), data.len() as u64),
                }
            };

            if let Some(after) = &opts.start_after {
                if entry.key.as_str() <= after.as_str() {
                    continue;
                }
            }

            // Common prefixes repeat once per key underneath them
            if result.last().is_some_and(|last| last.key == entry.key) {
                continue;
            }
            result.push(entry);
        }

        result
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn stat(&self, key: &str) -> VfsResult<ObjectInfo> {
        self.objects
            .read()
            .get(key)
            .map(|data| ObjectInfo::new(key, data.len() as u64))
            .ok_or_else(|| VfsError::not_found(key))
    }

    async fn get(&self, key: &str) -> VfsResult<ByteStream> {
        let data = self
            .objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| VfsError::not_found(key))?;
        Ok(bytes_stream(data))
    }

    async fn put(&self, key: &str, body: ByteStream, size: Option<u64>) -> VfsResult<ObjectInfo> {
        let data = collect_bytes(body).await?;
        if let Some(expected) = size {
            if expected != data.len() as u64 {
                return Err(VfsError::store_unavailable(format!(
                    "size mismatch for {key}: expected {expected}, got {}",
                    data.len()
                )));
            }
        }

        let info = ObjectInfo::new(key, data.len() as u64);
        self.objects.write().insert(key.to_string(), data);
        Ok(info)
    }

    fn list<'a>(&'a self, prefix: &'a str, opts: ListOptions) -> ObjectStream<'a> {
        let entries = self.snapshot(prefix, &opts);
        stream::iter(entries.into_iter().map(Ok)).boxed()
    }

    async fn copy(&self, from: &str, to: &str) -> VfsResult<ObjectInfo> {
        let mut objects = self.objects.write();
        let data = objects
            .get(from)
            .cloned()
            .ok_or_else(|| VfsError::not_found(from))?;
        let info = ObjectInfo::new(to, data.len() as u64);
        objects.insert(to.to_string(), data);
        Ok(info)
    }

    async fn delete(&self, key: &str) -> VfsResult<()> {
        self.objects
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| VfsError::not_found(key))
    }
}
