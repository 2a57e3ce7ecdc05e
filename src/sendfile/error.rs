//! Sendfile error taxonomy.

use std::io;

use axum::http::StatusCode;
use thiserror::Error;

/// Why a sendfile transfer did not complete.
#[derive(Debug, Error)]
pub enum SendfileError {
    /// The sentinel path tried to escape its directory.
    #[error("path traversal rejected")]
    SecurityViolation,

    /// The file could not be stat'ed.
    #[error("not found")]
    NotFound,

    /// Opening or reading the file failed.
    #[error("i/o error: {0}")]
    Io(#[source] io::Error),

    /// The client side of the response stopped accepting bytes.
    #[error("write error: {0}")]
    Write(#[source] io::Error),
}

impl SendfileError {
    /// Status the client sees, if one can still be sent.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SendfileError::SecurityViolation => Some(StatusCode::FORBIDDEN),
            SendfileError::NotFound => Some(StatusCode::NOT_FOUND),
            SendfileError::Io(_) => Some(StatusCode::INTERNAL_SERVER_ERROR),
            SendfileError::Write(_) => None,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SendfileError::SecurityViolation => "forbidden",
            SendfileError::NotFound => "not_found",
            SendfileError::Io(_) => "io_error",
            SendfileError::Write(_) => "write_error",
        }
    }

    /// Body text for the client.
    ///
    /// I/O failures are reduced to their error kind unless `expose_detail`
    /// is set, so OS messages and paths stay out of responses.
    pub fn client_message(&self, expose_detail: bool) -> String {
        match self {
            SendfileError::Io(e) if expose_detail => e.to_string(),
            SendfileError::Io(e) => e.kind().to_string(),
            SendfileError::NotFound => "not found".to_string(),
            SendfileError::SecurityViolation | SendfileError::Write(_) => String::new(),
        }
    }
}

/// Failure while buffering the downstream response into a recorder.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("downstream body error: {0}")]
    Body(#[from] axum::Error),

    #[error("downstream body exceeds {limit} bytes")]
    TooLarge { limit: usize },
}
