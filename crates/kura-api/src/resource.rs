//! Resource and directory endpoints.
//!
//! Each method takes the raw request parameters, validates them, calls the
//! [`FileService`] and maps the outcome to a [`Response`]. Failures are
//! logged here with full detail; clients only ever see the fixed messages of
//! [`ApiError`].

use futures::StreamExt;

use kura_vfs::{
    ByteStream, ErrorKind, FileService, OpContext, ResolvedPath, UploadFile, UploadMapping,
    VfsError, VfsResult,
};

use crate::response::{ApiError, Payload, Response, StatusCode};

/// Name given to directory downloads.
pub const ARCHIVE_NAME: &str = "archive.zip";

/// Request boundary over a [`FileService`].
#[derive(Debug, Clone)]
pub struct ResourceController {
    service: FileService,
    upload_max_bytes: u64,
}

impl ResourceController {
    pub fn new(service: FileService, upload_max_bytes: u64) -> Self {
        Self {
            service,
            upload_max_bytes,
        }
    }

    pub fn service(&self) -> &FileService {
        &self.service
    }

    /// Metadata of one resource.
    pub async fn show(&self, ctx: &OpContext, path: Option<&str>) -> Response {
        let path = match requested_path(ctx, path) {
            Ok(path) => path,
            Err(_) => return ApiError::NotFound.into(),
        };

        match self.service.stat(ctx, &path).await {
            Ok(resource) => Response::json(StatusCode::OK, &resource),
            Err(e) => {
                tracing::warn!(op = "show", error = %e, "stat failed");
                ApiError::NotFound.into()
            }
        }
    }

    /// Upload files below `path`, placing each according to the `paths` JSON
    /// mapping.
    pub async fn store(
        &self,
        ctx: &OpContext,
        path: Option<&str>,
        paths_json: Option<&str>,
        files: Vec<UploadFile>,
    ) -> Response {
        let path = match requested_path(ctx, path) {
            Ok(path) => path,
            Err(_) => return ApiError::BadRequest.into(),
        };

        let mapping = match UploadMapping::from_json(paths_json.unwrap_or_default()) {
            Ok(mapping) => mapping,
            Err(e) => {
                tracing::warn!(op = "store", error = %e, "rejecting upload");
                return ApiError::BadRequest.into();
            }
        };

        let mut limited = Vec::with_capacity(files.len());
        for file in files {
            if file.size.is_some_and(|size| size > self.upload_max_bytes) {
                tracing::warn!(
                    op = "store",
                    file = %file.filename,
                    size = ?file.size,
                    limit = self.upload_max_bytes,
                    "upload exceeds size limit"
                );
                return ApiError::BadRequest.into();
            }
            limited.push(self.limit_body(file));
        }

        match self.service.upload(ctx, &path, limited, &mapping).await {
            Ok(created) => Response::json(StatusCode::CREATED, &created),
            Err(e) => {
                tracing::warn!(op = "store", error = %e, "upload failed");
                ApiError::BadRequest.into()
            }
        }
    }

    /// Delete a file or a whole directory.
    pub async fn delete(&self, ctx: &OpContext, path: Option<&str>) -> Response {
        let path = match requested_path(ctx, path) {
            Ok(path) => path,
            Err(_) => return ApiError::BadRequest.into(),
        };

        match self.service.delete(ctx, &path).await {
            Ok(()) => Response::no_content(),
            Err(e) => {
                tracing::warn!(op = "delete", error = %e, "delete failed");
                ApiError::NotFound.into()
            }
        }
    }

    /// Move `from` to `to`. Every failure is a bad request.
    pub async fn move_resource(
        &self,
        ctx: &OpContext,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Response {
        let (from, to) = match (requested_path(ctx, from), requested_path(ctx, to)) {
            (Ok(from), Ok(to)) => (from, to),
            _ => return ApiError::BadRequest.into(),
        };

        match self.service.move_resource(ctx, &from, &to).await {
            Ok(()) => Response::no_content(),
            Err(e) => {
                tracing::warn!(op = "move", error = %e, "move failed");
                ApiError::BadRequest.into()
            }
        }
    }

    /// Directories download as a zip archive, files as their raw contents.
    pub async fn download(&self, ctx: &OpContext, path: Option<&str>) -> Response {
        let path = match requested_path(ctx, path) {
            Ok(path) => path,
            Err(_) => return ApiError::BadRequest.into(),
        };

        if path.is_directory() {
            return match self.service.make_zip(ctx, &path).await {
                Ok(archive) => Response::attachment(ARCHIVE_NAME, Payload::Buffer(archive)),
                Err(e) => {
                    tracing::error!(op = "download", error = %e, "archive failed");
                    ApiError::ServerError.into()
                }
            };
        }

        match self.service.open(ctx, &path).await {
            Ok(download) => Response::attachment(
                download.name,
                Payload::Stream {
                    size: download.size,
                    body: download.body,
                },
            ),
            Err(e) => {
                tracing::error!(op = "download", error = %e, "open failed");
                ApiError::ServerError.into()
            }
        }
    }

    /// Every resource whose path contains `query`.
    pub async fn search(&self, ctx: &OpContext, query: Option<&str>) -> Response {
        let query = match query {
            Some(q) if !q.is_empty() => q,
            _ => return ApiError::BadRequest.into(),
        };

        match self.service.search(ctx, query).await {
            Ok(found) => Response::json(StatusCode::OK, &found),
            Err(e) => {
                tracing::error!(op = "search", error = %e, "search failed");
                ApiError::ServerError.into()
            }
        }
    }

    /// Direct children of a directory.
    pub async fn directory_show(&self, ctx: &OpContext, path: Option<&str>) -> Response {
        let path = match requested_path(ctx, path) {
            Ok(path) => path,
            Err(_) => return ApiError::NotFound.into(),
        };

        match self.service.paginate_directory(ctx, &path).await {
            Ok(entries) => Response::json(StatusCode::OK, &entries),
            Err(e) => {
                tracing::error!(op = "directory_show", error = %e, "listing failed");
                ApiError::ServerError.into()
            }
        }
    }

    /// Create an empty directory.
    pub async fn directory_store(&self, ctx: &OpContext, path: Option<&str>) -> Response {
        let path = match requested_path(ctx, path) {
            Ok(path) => path,
            Err(_) => return ApiError::BadRequest.into(),
        };

        match self.service.store_directory(ctx, &path).await {
            Ok(resource) => Response::json(StatusCode::CREATED, &resource),
            Err(e) => {
                tracing::warn!(op = "directory_store", error = %e, "mkdir failed");
                ApiError::BadRequest.into()
            }
        }
    }

    /// Cut off bodies that run past the limit without declaring a size.
    fn limit_body(&self, file: UploadFile) -> UploadFile {
        let UploadFile {
            filename,
            size,
            body,
        } = file;
        UploadFile::new(filename, limited(body, self.upload_max_bytes), size)
    }
}

/// Resolve a query parameter, logging why it was rejected.
fn requested_path(ctx: &OpContext, raw: Option<&str>) -> VfsResult<ResolvedPath> {
    let result = ctx.resolve(raw.unwrap_or_default());
    if let Err(e) = &result {
        match e.kind() {
            ErrorKind::TraversalDetected => {
                tracing::warn!(tenant = %ctx.tenant(), path = ?raw, "path traversal attempt")
            }
            _ => tracing::debug!(tenant = %ctx.tenant(), error = %e, "invalid path"),
        }
    }
    result
}

fn limited(body: ByteStream, max: u64) -> ByteStream {
    let mut seen: u64 = 0;
    body.map(move |chunk| {
        let chunk = chunk?;
        seen += chunk.len() as u64;
        if seen > max {
            return Err(VfsError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("upload exceeds {max} bytes"),
            )));
        }
        Ok(chunk)
    })
    .boxed()
}
