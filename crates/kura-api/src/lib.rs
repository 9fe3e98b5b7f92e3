//! # kura-api
//!
//! The outer layer of kura: configuration, the transport-neutral request
//! boundary over [`kura_vfs::FileService`], and the `kura` command line tool.
//!
//! [`ResourceController`] owns the status-code contract. It turns raw request
//! parameters into resolved paths, calls the service and collapses every
//! failure into one of three fixed client messages.

pub mod config;
pub mod resource;
pub mod response;

pub use config::{Backend, Config, build_store};
pub use resource::{ARCHIVE_NAME, ResourceController};
pub use response::{ApiError, Body, Payload, Response, StatusCode};
