//! Folder semantics on top of an [`ObjectStore`].
//!
//! Every operation takes an [`OpContext`] (tenant + cancellation) and paths
//! already produced by [`resolve`](crate::resolve). The service never builds
//! a key from raw input itself.

use std::sync::Arc;

use tracing::Span;

use crate::archive::ZipBuilder;
use crate::context::OpContext;
use crate::error::{VfsError, VfsResult};
use crate::path::ResolvedPath;
use crate::store::{ByteStream, ListOptions, ObjectStore, empty_stream};
use crate::types::Resource;
use crate::upload::{UploadFile, UploadMapping};

/// A file opened for download.
pub struct Download {
    /// Base name, for `Content-Disposition`.
    pub name: String,
    pub size: u64,
    pub body: ByteStream,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Virtual filesystem service.
///
/// Stateless between calls: all durable state lives in the store. Log output
/// goes through the span handed in at construction, so embedders decide where
/// it ends up.
#[derive(Clone)]
pub struct FileService {
    store: Arc<dyn ObjectStore>,
    span: Span,
}

impl std::fmt::Debug for FileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileService")
            .field("store", &"<dyn ObjectStore>")
            .finish()
    }
}

impl FileService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            span: tracing::info_span!("vfs"),
        }
    }

    /// Parent span for every operation's span and event.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Metadata of one object. Directory paths stat their marker.
    #[tracing::instrument(parent = &self.span, name = "vfs.stat", skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn stat(&self, ctx: &OpContext, path: &ResolvedPath) -> VfsResult<Resource> {
        check_tenant(ctx, path)?;
        let key = object_key(path);
        let info = ctx.guard(self.store.stat(&key)).await?;
        Ok(Resource::from_key(&path.root(), &info.key, info.size))
    }

    /// Open a single object for streaming download.
    #[tracing::instrument(parent = &self.span, name = "vfs.open", skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn open(&self, ctx: &OpContext, path: &ResolvedPath) -> VfsResult<Download> {
        check_tenant(ctx, path)?;
        let info = ctx.guard(self.store.stat(path.key())).await?;
        let body = ctx.guard(self.store.get(path.key())).await?;
        Ok(Download {
            name: path.base_name().to_string(),
            size: info.size,
            body,
        })
    }

    /// Upload files below `path`.
    ///
    /// All destinations are resolved first: one file without a valid mapping
    /// entry fails the whole request before anything is written. After that
    /// the upload is best-effort per file; a file whose store write fails is
    /// logged and left out of the result.
    #[tracing::instrument(parent = &self.span, name = "vfs.upload", skip_all, fields(tenant = %ctx.tenant(), files = files.len()))]
    pub async fn upload(
        &self,
        ctx: &OpContext,
        path: &ResolvedPath,
        files: Vec<UploadFile>,
        mapping: &UploadMapping,
    ) -> VfsResult<Vec<Resource>> {
        check_tenant(ctx, path)?;

        let plan = files
            .into_iter()
            .map(|file| mapping.destination(path, &file.filename).map(|dest| (dest, file)))
            .collect::<VfsResult<Vec<_>>>()?;

        let root = path.root();
        let mut created = Vec::with_capacity(plan.len());
        for (dest, file) in plan {
            let UploadFile {
                filename,
                size,
                body,
            } = file;

            match ctx.guard(self.store.put(dest.key(), body, size)).await {
                Ok(info) => {
                    tracing::debug!(file = %filename, key = %info.key, size = info.size, "stored upload");
                    created.push(Resource::from_key(&root, &info.key, info.size));
                }
                Err(VfsError::Cancelled) => return Err(VfsError::Cancelled),
                Err(e) => {
                    tracing::warn!(file = %filename, error = %e, "upload failed, skipping file");
                }
            }
        }

        Ok(created)
    }

    /// Delete a file, or a directory with everything below it.
    ///
    /// Directory deletes are best-effort: objects that fail to delete are
    /// logged and skipped, and the call still succeeds.
    #[tracing::instrument(parent = &self.span, name = "vfs.delete", skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn delete(&self, ctx: &OpContext, path: &ResolvedPath) -> VfsResult<()> {
        check_tenant(ctx, path)?;

        if path.is_directory() {
            let deleted = self.delete_recursive(ctx, &path.key_with_slash()).await?;
            tracing::debug!(deleted, "deleted directory");
            return Ok(());
        }

        ctx.guard(self.store.delete(path.key())).await
    }

    /// Move a file or directory.
    ///
    /// Directories are copied object by object, then the source subtree is
    /// deleted. If a copy fails the move stops and no source object is
    /// deleted, but copies already made stay at the destination. The same
    /// happens, with `InvalidMove`, when a destination key would land back
    /// inside the source, as when a directory moves into its own ancestor.
    #[tracing::instrument(parent = &self.span, name = "vfs.move", skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn move_resource(
        &self,
        ctx: &OpContext,
        from: &ResolvedPath,
        to: &ResolvedPath,
    ) -> VfsResult<()> {
        check_tenant(ctx, from)?;
        check_tenant(ctx, to)?;
        validate_move(from, to)?;

        if from.is_directory() {
            let source = from.key_with_slash();
            let target = to.key_with_slash();

            let copied = self.copy_recursive(ctx, &source, &target).await?;
            let deleted = self.delete_recursive(ctx, &source).await?;
            tracing::debug!(copied, deleted, "moved directory");
            return Ok(());
        }

        let target = file_move_target(from, to);
        ctx.guard(self.store.copy(from.key(), &target)).await?;
        ctx.guard(self.store.delete(from.key())).await
    }

    /// Every object of the tenant whose key contains `query`.
    ///
    /// Matches anywhere in the full key, so a folder name matches every
    /// object below it. Only this tenant's keys are listed, so a query naming
    /// the root matches everything the tenant owns and nothing else. Results
    /// keep store listing order.
    #[tracing::instrument(parent = &self.span, name = "vfs.search", skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn search(&self, ctx: &OpContext, query: &str) -> VfsResult<Vec<Resource>> {
        let root = ctx.tenant().root();
        let prefix = root.prefix();

        let mut results = Vec::new();
        let mut objects = self
            .store
            .list(&prefix, ListOptions::recursive().start_after(prefix.clone()));
        while let Some(item) = ctx.next(&mut objects).await? {
            let info = match item {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable listing entry");
                    continue;
                }
            };

            if info.key.contains(query) {
                results.push(Resource::from_key(&root, &info.key, info.size));
            }
        }

        Ok(results)
    }

    /// Zip every file below a directory.
    ///
    /// Entry names are relative to the directory. Marker objects are skipped.
    /// Any failure aborts the whole archive.
    #[tracing::instrument(parent = &self.span, name = "vfs.make_zip", skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn make_zip(&self, ctx: &OpContext, path: &ResolvedPath) -> VfsResult<Vec<u8>> {
        check_tenant(ctx, path)?;
        let prefix = path.key_with_slash();

        let mut zip = ZipBuilder::new();
        let mut objects = self.store.list(&prefix, ListOptions::recursive());
        while let Some(item) = ctx.next(&mut objects).await? {
            let info = item?;
            if info.is_directory() {
                continue;
            }

            let name = info.key.strip_prefix(prefix.as_str()).unwrap_or(&info.key);
            zip.start_entry(name)?;

            let mut body = ctx.guard(self.store.get(&info.key)).await?;
            while let Some(chunk) = ctx.next(&mut body).await? {
                zip.write_chunk(&chunk?)?;
            }
        }

        let entries = zip.entries();
        let archive = zip.finish()?;
        tracing::debug!(entries, bytes = archive.len(), "built archive");
        Ok(archive)
    }

    /// Create a directory marker. Missing ancestors are not created.
    #[tracing::instrument(parent = &self.span, name = "vfs.store_directory", skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn store_directory(&self, ctx: &OpContext, path: &ResolvedPath) -> VfsResult<Resource> {
        check_tenant(ctx, path)?;
        let key = path.key_with_slash();
        let info = ctx.guard(self.store.put(&key, empty_stream(), Some(0))).await?;
        Ok(Resource::from_key(&path.root(), &info.key, info.size))
    }

    /// Direct children of a directory, directories first.
    ///
    /// The directory's own marker is not listed. Within each group the store's
    /// listing order is kept.
    #[tracing::instrument(parent = &self.span, name = "vfs.paginate_directory", skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn paginate_directory(
        &self,
        ctx: &OpContext,
        path: &ResolvedPath,
    ) -> VfsResult<Vec<Resource>> {
        check_tenant(ctx, path)?;
        let root = path.root();
        let prefix = path.key_with_slash();

        let mut entries = Vec::new();
        let mut objects = self
            .store
            .list(&prefix, ListOptions::shallow().start_after(prefix.clone()));
        while let Some(item) = ctx.next(&mut objects).await? {
            match item {
                Ok(info) => entries.push(Resource::from_key(&root, &info.key, info.size)),
                Err(e) => tracing::warn!(error = %e, "skipping unreadable listing entry"),
            }
        }

        Ok(directories_first(entries))
    }

    /// Delete every key under `prefix`, skipping failures.
    async fn delete_recursive(&self, ctx: &OpContext, prefix: &str) -> VfsResult<usize> {
        let mut deleted = 0;
        let mut objects = self.store.list(prefix, ListOptions::recursive());
        while let Some(item) = ctx.next(&mut objects).await? {
            let info = match item {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable listing entry");
                    continue;
                }
            };

            match ctx.guard(self.store.delete(&info.key)).await {
                Ok(()) => deleted += 1,
                Err(VfsError::Cancelled) => return Err(VfsError::Cancelled),
                Err(e) => tracing::warn!(key = %info.key, error = %e, "delete failed, skipping"),
            }
        }
        Ok(deleted)
    }

    /// Copy every key under `source` to the same relative key under `target`.
    ///
    /// Aborts on the first failure. A source holding nothing but its own
    /// marker gets the marker copied instead.
    async fn copy_recursive(&self, ctx: &OpContext, source: &str, target: &str) -> VfsResult<usize> {
        let mut copied = 0;
        let mut objects = self
            .store
            .list(source, ListOptions::recursive().start_after(source));
        while let Some(item) = ctx.next(&mut objects).await? {
            let info = item?;
            let Some(relative) = info.key.strip_prefix(source) else {
                continue;
            };

            let dest = format!("{target}{relative}");
            // Moving into an ancestor can map a key back under the source,
            // where it would overwrite an uncopied object and then be deleted.
            if dest.starts_with(source) {
                tracing::error!(key = %info.key, dest = %dest, copied, "destination lies inside the source, aborting move");
                return Err(VfsError::invalid_move(format!("{dest} lies inside {source}")));
            }
            if let Err(e) = ctx.guard(self.store.copy(&info.key, &dest)).await {
                tracing::error!(
                    key = %info.key,
                    copied,
                    error = %e,
                    "copy failed, aborting move; copies made so far are left in place"
                );
                return Err(e);
            }
            copied += 1;
        }

        if copied == 0 {
            ctx.guard(self.store.copy(source, target)).await?;
            copied = 1;
        }
        Ok(copied)
    }
}

/// Paths resolved for another tenant never reach the store.
fn check_tenant(ctx: &OpContext, path: &ResolvedPath) -> VfsResult<()> {
    if path.tenant() != ctx.tenant() {
        return Err(VfsError::traversal(path.original()));
    }
    Ok(())
}

/// Store key for a path: directories address their marker.
fn object_key(path: &ResolvedPath) -> String {
    if path.is_directory() {
        path.key_with_slash()
    } else {
        path.key().to_string()
    }
}

/// Move preconditions, checked before any store call.
///
/// `to` starting with `from` (as plain strings) is rejected; this is what
/// prevents moving a folder into itself.
fn validate_move(from: &ResolvedPath, to: &ResolvedPath) -> VfsResult<()> {
    if from.is_tenant_root() {
        return Err(VfsError::invalid_move("cannot move the root directory"));
    }
    if to.key().starts_with(from.key()) {
        return Err(VfsError::invalid_move(format!(
            "{} is inside {}",
            to.original(),
            from.original()
        )));
    }
    Ok(())
}

/// Destination key for a single-file move.
///
/// A directory destination keeps the file's own name.
fn file_move_target(from: &ResolvedPath, to: &ResolvedPath) -> String {
    if to.is_directory() || to.is_tenant_root() {
        format!("{}/{}", to.key(), from.base_name())
    } else {
        to.key().to_string()
    }
}

/// Stable two-bucket partition: directories, then files.
fn directories_first(entries: Vec<Resource>) -> Vec<Resource> {
    let (mut directories, files): (Vec<_>, Vec<_>) =
        entries.into_iter().partition(|r| r.kind.is_directory());
    directories.extend(files);
    directories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::resolve;
    use crate::types::{ResourceType, TenantId};

    fn p(raw: &str) -> ResolvedPath {
        resolve(TenantId::new(1), raw).unwrap()
    }

    #[test]
    fn test_validate_move() {
        assert!(validate_move(&p("/a/"), &p("/b/")).is_ok());
        assert!(validate_move(&p("/a.txt"), &p("/b/a.txt")).is_ok());

        for (from, to) in [("/a", "/a/b"), ("/a/", "/a/b/"), ("/a/", "/a/"), ("/", "/x/")] {
            let err = validate_move(&p(from), &p(to)).unwrap_err();
            assert!(matches!(err, VfsError::InvalidMove(_)), "{from} -> {to}");
        }
    }

    #[test]
    fn test_file_move_target() {
        assert_eq!(
            file_move_target(&p("/a/x.txt"), &p("/b/y.txt")),
            "user-1-files/b/y.txt"
        );
        assert_eq!(file_move_target(&p("/a/x.txt"), &p("/b/")), "user-1-files/b/x.txt");
        assert_eq!(file_move_target(&p("/a/x.txt"), &p("b/..")), "user-1-files/x.txt");
    }

    #[test]
    fn test_directories_first_is_stable() {
        let root = TenantId::new(1).root();
        let entries = vec![
            Resource::from_key(&root, "user-1-files/a.txt", 1),
            Resource::from_key(&root, "user-1-files/b/", 0),
            Resource::from_key(&root, "user-1-files/c.txt", 1),
            Resource::from_key(&root, "user-1-files/d/", 0),
        ];
        let sorted = directories_first(entries);
        let names: Vec<_> = sorted.iter().map(|r| (r.name.as_str(), r.kind)).collect();
        assert_eq!(
            names,
            vec![
                ("b", ResourceType::Directory),
                ("d", ResourceType::Directory),
                ("a.txt", ResourceType::File),
                ("c.txt", ResourceType::File),
            ]
        );
    }

    #[test]
    fn test_object_key() {
        assert_eq!(object_key(&p("/d/")), "user-1-files/d/");
        assert_eq!(object_key(&p("/d")), "user-1-files/d");
    }
}
