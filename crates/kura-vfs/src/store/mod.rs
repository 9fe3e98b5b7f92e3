//! Object store capability interface.
//!
//! The service depends only on [`ObjectStore`]; backends implement it for
//! different storage systems. Each call is assumed atomic on its own, and
//! nothing is transactional across calls.

mod memory;
#[cfg(feature = "s3")]
mod s3;

pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::{S3Store, S3StoreConfig};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::{self, BoxStream};

use crate::error::VfsResult;
use crate::path::SEPARATOR;

/// Object contents as a stream of chunks.
pub type ByteStream = BoxStream<'static, VfsResult<Bytes>>;

/// Lazy listing of objects. Items may individually fail.
pub type ObjectStream<'a> = BoxStream<'a, VfsResult<ObjectInfo>>;

/// Key and size of a stored object (or a common prefix in a shallow listing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

impl ObjectInfo {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }

    /// True for marker objects and common prefixes.
    pub fn is_directory(&self) -> bool {
        self.key.ends_with(SEPARATOR)
    }
}

/// Listing options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// List the whole subtree. When false, keys deeper than one level are
    /// folded into their first-level common prefix (`prefix/sub/`).
    pub recursive: bool,
    /// Only return keys strictly greater than this one.
    pub start_after: Option<String>,
}

impl ListOptions {
    /// Whole subtree.
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            start_after: None,
        }
    }

    /// Direct children only.
    pub fn shallow() -> Self {
        Self::default()
    }

    /// Skip keys up to and including `key`.
    pub fn start_after(mut self, key: impl Into<String>) -> Self {
        self.start_after = Some(key.into());
        self
    }
}

/// Core object store trait.
///
/// Keys are full keys (tenant root included); backends never interpret them
/// beyond prefix matching on `/`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Object metadata. Fails with `NotFound` if the key is absent.
    async fn stat(&self, key: &str) -> VfsResult<ObjectInfo>;

    /// Object contents.
    async fn get(&self, key: &str) -> VfsResult<ByteStream>;

    /// Store an object, replacing any previous one.
    ///
    /// `size` is the expected length when the caller knows it.
    async fn put(&self, key: &str, body: ByteStream, size: Option<u64>) -> VfsResult<ObjectInfo>;

    /// List keys starting with `prefix`, in lexicographic key order.
    fn list<'a>(&'a self, prefix: &'a str, opts: ListOptions) -> ObjectStream<'a>;

    /// Server-side copy.
    async fn copy(&self, from: &str, to: &str) -> VfsResult<ObjectInfo>;

    /// Remove an object.
    async fn delete(&self, key: &str) -> VfsResult<()>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Make sure the backing bucket exists. No-op for backends without one.
    async fn ensure_bucket(&self) -> VfsResult<()> {
        Ok(())
    }

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> bool {
        self.stat(key).await.is_ok()
    }

    /// Read an entire object into memory.
    async fn get_bytes(&self, key: &str) -> VfsResult<Bytes> {
        collect_bytes(self.get(key).await?).await
    }

    /// Store an in-memory buffer.
    async fn put_bytes(&self, key: &str, data: Bytes) -> VfsResult<ObjectInfo> {
        let size = data.len() as u64;
        self.put(key, bytes_stream(data), Some(size)).await
    }
}

/// Single-chunk stream over a buffer.
pub fn bytes_stream(data: Bytes) -> ByteStream {
    stream::once(async move { Ok(data) }).boxed()
}

/// Empty body, for marker objects.
pub fn empty_stream() -> ByteStream {
    stream::empty().boxed()
}

/// Drain a byte stream into one buffer.
pub async fn collect_bytes(mut body: ByteStream) -> VfsResult<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
