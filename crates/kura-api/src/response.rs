//! Transport-neutral responses produced by the resource controller.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use kura_vfs::ByteStream;

/// HTTP-style status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-facing failure. The message is fixed per variant and never carries
/// keys or store details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Bad request")]
    BadRequest,
    #[error("Not found")]
    NotFound,
    #[error("Server error")]
    ServerError,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Attachment payload: a finished buffer (zip) or a live object stream.
pub enum Payload {
    Buffer(Vec<u8>),
    Stream { size: u64, body: ByteStream },
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Buffer(buf) => f.debug_tuple("Buffer").field(&buf.len()).finish(),
            Payload::Stream { size, .. } => f.debug_struct("Stream").field("size", size).finish_non_exhaustive(),
        }
    }
}

#[derive(Debug)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    Attachment { filename: String, payload: Payload },
}

#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub body: Body,
}

impl Response {
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => Self {
                status,
                body: Body::Json(json),
            },
            Err(e) => {
                tracing::error!(error = %e, "response serialization failed");
                Self::error(ApiError::ServerError)
            }
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: Body::Empty,
        }
    }

    pub fn attachment(filename: impl Into<String>, payload: Payload) -> Self {
        Self {
            status: StatusCode::OK,
            body: Body::Attachment {
                filename: filename.into(),
                payload,
            },
        }
    }

    /// `{"message": "..."}` with the error's fixed message.
    pub fn error(err: ApiError) -> Self {
        Self {
            status: err.status(),
            body: Body::Json(serde_json::json!({ "message": err.to_string() })),
        }
    }

    pub fn content_type(&self) -> Option<&'static str> {
        match self.body {
            Body::Empty => None,
            Body::Json(_) => Some("application/json"),
            Body::Attachment { .. } => Some("application/octet-stream"),
        }
    }

    /// `Content-Disposition` header for attachments.
    pub fn content_disposition(&self) -> Option<String> {
        match &self.body {
            Body::Attachment { filename, .. } => {
                Some(format!("attachment; filename=\"{}\"", filename.replace('"', "")))
            }
            _ => None,
        }
    }

    /// The JSON body, if any.
    pub fn json_body(&self) -> Option<&serde_json::Value> {
        match &self.body {
            Body::Json(json) => Some(json),
            _ => None,
        }
    }
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        Response::error(err)
    }
}
