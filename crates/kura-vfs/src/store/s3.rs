//! S3-compatible object store (AWS S3, MinIO).

use std::collections::VecDeque;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream as S3Body;
use futures::stream;
use futures::{StreamExt, TryStreamExt};
use tokio_util::io::ReaderStream;

use super::{ByteStream, ListOptions, ObjectInfo, ObjectStore, ObjectStream, collect_bytes};
use crate::error::{VfsError, VfsResult};
use crate::path::SEPARATOR;

/// Connection settings for [`S3Store`].
#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    pub bucket: String,
    /// Custom endpoint (MinIO); `None` uses AWS.
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Path-style addressing, required by most MinIO deployments.
    pub force_path_style: bool,
}

/// Object store backed by an S3 bucket.
///
/// Uploads are buffered before `PutObject`; downloads stream.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl S3Store {
    /// Wrap an existing client.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from static credentials.
    pub fn connect(config: &S3StoreConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "kura-static",
        );

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.clone());
        }

        Self::new(Client::from_conf(builder.build()), config.bucket.clone())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// `CopySource` header value: `bucket/key`, URL-encoded.
    fn copy_source(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split(SEPARATOR)
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.bucket, encoded.join("/"))
    }
}

/// Pagination state for `ListObjectsV2`.
struct ListState<'a> {
    store: &'a S3Store,
    prefix: &'a str,
    opts: ListOptions,
    token: Option<String>,
    buffered: VecDeque<ObjectInfo>,
    exhausted: bool,
}

impl ListState<'_> {
    async fn fetch_page(&mut self) -> VfsResult<()> {
        let mut request = self
            .store
            .client
            .list_objects_v2()
            .bucket(&self.store.bucket)
            .prefix(self.prefix);
        if !self.opts.recursive {
            request = request.delimiter(SEPARATOR.to_string());
        }
        if let Some(after) = &self.opts.start_after {
            request = request.start_after(after.clone());
        }
        if let Some(token) = self.token.take() {
            request = request.continuation_token(token);
        }

        let page = request.send().await.map_err(|err| {
            VfsError::store_unavailable(format!("list_objects_v2 failed: {err}"))
        })?;

        let mut entries: Vec<ObjectInfo> = page
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                Some(ObjectInfo::new(key, object.size().unwrap_or_default().max(0) as u64))
            })
            .collect();
        entries.extend(
            page.common_prefixes()
                .iter()
                .filter_map(|cp| cp.prefix())
                .map(|prefix| ObjectInfo::new(prefix, 0)),
        );
        // Objects and common prefixes come back as separate lists
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        self.buffered.extend(entries);

        self.token = page.next_continuation_token().map(str::to_owned);
        self.exhausted = !page.is_truncated().unwrap_or(false) || self.token.is_none();
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn stat(&self, key: &str) -> VfsResult<ObjectInfo> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    VfsError::not_found(key)
                } else {
                    VfsError::store_unavailable(format!("head_object failed: {err}"))
                }
            })?;

        let size = response.content_length().unwrap_or_default().max(0) as u64;
        Ok(ObjectInfo::new(key, size))
    }

    async fn get(&self, key: &str) -> VfsResult<ByteStream> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    VfsError::not_found(key)
                } else {
                    VfsError::store_unavailable(format!("get_object failed: {err}"))
                }
            })?;

        let reader = response.body.into_async_read();
        Ok(ReaderStream::new(reader)
            .map_err(|err| VfsError::store_unavailable(format!("read body failed: {err}")))
            .boxed())
    }

    async fn put(&self, key: &str, body: ByteStream, size: Option<u64>) -> VfsResult<ObjectInfo> {
        // Buffered whole for a single PutObject. Uploads arriving through
        // ResourceController are capped at `api.upload_max_size_mb` per file.
        let data = collect_bytes(body).await?;
        if let Some(expected) = size {
            if expected != data.len() as u64 {
                return Err(VfsError::store_unavailable(format!(
                    "size mismatch for {key}: expected {expected}, got {}",
                    data.len()
                )));
            }
        }

        let len = data.len() as u64;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(len as i64)
            .body(S3Body::from(data))
            .send()
            .await
            .map_err(|err| VfsError::store_unavailable(format!("put_object failed: {err}")))?;

        Ok(ObjectInfo::new(key, len))
    }

    fn list<'a>(&'a self, prefix: &'a str, opts: ListOptions) -> ObjectStream<'a> {
        let state = ListState {
            store: self,
            prefix,
            opts,
            token: None,
            buffered: VecDeque::new(),
            exhausted: false,
        };

        stream::unfold(Some(state), |state| async move {
            let mut state = state?;
            loop {
                if let Some(info) = state.buffered.pop_front() {
                    return Some((Ok(info), Some(state)));
                }
                if state.exhausted {
                    return None;
                }
                if let Err(err) = state.fetch_page().await {
                    // A failed page ends the listing
                    return Some((Err(err), None));
                }
            }
        })
        .boxed()
    }

    async fn copy(&self, from: &str, to: &str) -> VfsResult<ObjectInfo> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(self.copy_source(from))
            .key(to)
            .send()
            .await
            .map_err(|err| VfsError::store_unavailable(format!("copy_object failed: {err}")))?;

        self.stat(to).await
    }

    async fn delete(&self, key: &str) -> VfsResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| VfsError::store_unavailable(format!("delete_object failed: {err}")))?;
        Ok(())
    }

    async fn ensure_bucket(&self) -> VfsResult<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }

        tracing::info!(bucket = %self.bucket, "creating bucket");
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| VfsError::store_unavailable(format!("create_bucket failed: {err}")))?;
        Ok(())
    }
}
