//! # kura-vfs
//!
//! Per-tenant folders and files on top of a flat, key-addressed object store.
//!
//! The store knows nothing about directories. This crate maps user-facing
//! paths like `/photos/2024/` onto keys under a tenant root
//! (`user-<id>-files/photos/2024/`) and implements folder semantics on top:
//! listing, creation, recursive move and delete, zip bundling and search.
//!
//! Key components:
//!
//! - [`resolve`] / [`ResolvedPath`] - pure path resolution with traversal checks
//! - [`ObjectStore`] - the capability trait a backend implements
//! - [`MemoryStore`] - in-memory backend (testing, ephemeral runs)
//! - [`FileService`] - the filesystem operations themselves
//!
//! ## Design Decisions
//!
//! - **Tenant isolation is a key-prefix convention**: the store enforces
//!   nothing, so every path goes through [`resolve`] before it reaches a key.
//! - **No cross-object transactions**: recursive operations are plans of
//!   individual store calls. A failure midway can leave partial state; see
//!   [`FileService::move_resource`] and [`FileService::delete`].
//! - **Listings are lazy streams**: recursive operations consume them item by
//!   item instead of collecting the subtree first.

mod archive;
mod context;
mod error;
mod path;
mod service;
pub mod store;
mod types;
mod upload;

pub use context::OpContext;
pub use error::{ErrorKind, VfsError, VfsResult};
pub use path::{ResolvedPath, SEPARATOR, TenantRoot, resolve};
pub use service::{Download, FileService};
pub use store::{ByteStream, ListOptions, MemoryStore, ObjectInfo, ObjectStore, ObjectStream};
pub use types::{Resource, ResourceType, TenantId};
pub use upload::{UploadFile, UploadMapping};

#[cfg(feature = "s3")]
pub use store::{S3Store, S3StoreConfig};
