//! Replay-or-stream decision over a captured response.

use std::path::PathBuf;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::http::recorder::ResponseRecorder;
use crate::http::sink::{write_error, ResponseSink};
use crate::sendfile::error::SendfileError;
use crate::sendfile::guard::PathGuard;
use crate::sendfile::streamer::FileStreamer;

/// Response header through which the downstream handler requests a file.
pub const X_SENDFILE: HeaderName = HeaderName::from_static("x-sendfile");

/// Content type forced on streamed files.
pub const OCTET_STREAM: HeaderValue = HeaderValue::from_static("application/octet-stream");

/// What happened to one captured response.
#[derive(Debug)]
pub enum SendfileOutcome {
    /// No sentinel; the captured response was replayed.
    Passthrough,
    /// The sentinel file was streamed completely.
    Streamed { bytes: u64 },
    /// The sentinel was present but the file was not (fully) sent.
    Rejected(SendfileError),
}

impl SendfileOutcome {
    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SendfileOutcome::Passthrough => "passthrough",
            SendfileOutcome::Streamed { .. } => "streamed",
            SendfileOutcome::Rejected(e) => e.kind(),
        }
    }
}

/// Decides, per captured response, between replay and file streaming.
#[derive(Debug, Clone, Default)]
pub struct SendfileDecision {
    guard: PathGuard,
    streamer: FileStreamer,
    expose_io_errors: bool,
}

impl SendfileDecision {
    pub fn new(guard: PathGuard, streamer: FileStreamer, expose_io_errors: bool) -> Self {
        Self {
            guard,
            streamer,
            expose_io_errors,
        }
    }

    /// Send the response captured in `recorder` to `sink`.
    ///
    /// The recorder's headers lose the sentinel on the streaming path; the
    /// body is never looked at beyond being replayed.
    ///
    /// `Content-Type: application/octet-stream` is set on the sink only
    /// after the whole file was written. Sinks that commit their head on the
    /// first write, like [`HttpSink`](crate::http::sink::HttpSink), send the
    /// downstream `Content-Type` instead for any non-empty file; handlers
    /// that care set it themselves.
    pub fn serve(&self, recorder: &mut ResponseRecorder, sink: &mut dyn ResponseSink) -> SendfileOutcome {
        let sentinel = match sentinel_path(recorder.headers()) {
            Some(sentinel) => sentinel,
            None => {
                replay(recorder, sink);
                return SendfileOutcome::Passthrough;
            }
        };

        let headers = recorder.headers_mut();
        headers.remove(X_SENDFILE);
        // Framing described the discarded body, not the file.
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::TRANSFER_ENCODING);
        copy_headers(recorder.headers(), sink.headers_mut());

        let result = sentinel
            .and_then(|path| self.guard.check(&path))
            .and_then(|validated| self.streamer.stream(&validated, sink));

        match result {
            Ok(bytes) => {
                sink.headers_mut().insert(header::CONTENT_TYPE, OCTET_STREAM);
                SendfileOutcome::Streamed { bytes }
            }
            Err(err) => {
                self.report(&err, sink);
                SendfileOutcome::Rejected(err)
            }
        }
    }

    fn report(&self, err: &SendfileError, sink: &mut dyn ResponseSink) {
        match err {
            SendfileError::SecurityViolation => sink.write_status(StatusCode::FORBIDDEN),
            SendfileError::NotFound | SendfileError::Io(_) => {
                let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                write_error(sink, status, &err.client_message(self.expose_io_errors));
            }
            // Status and part of the body are already out.
            SendfileError::Write(_) => {}
        }
    }
}

/// `None` when the sentinel is absent or empty. A present value that the
/// platform cannot turn into a path still counts as a sentinel.
fn sentinel_path(headers: &HeaderMap) -> Option<Result<PathBuf, SendfileError>> {
    let value = headers.get(X_SENDFILE)?;
    if value.is_empty() {
        return None;
    }
    Some(path_from_bytes(value.as_bytes()))
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> Result<PathBuf, SendfileError> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    Ok(PathBuf::from(OsStr::from_bytes(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> Result<PathBuf, SendfileError> {
    match std::str::from_utf8(bytes) {
        Ok(path) => Ok(PathBuf::from(path)),
        Err(e) => {
            tracing::warn!(error = %e, "X-Sendfile path is not valid UTF-8");
            Err(SendfileError::NotFound)
        }
    }
}

fn copy_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from.iter() {
        to.append(name.clone(), value.clone());
    }
}

fn replay(recorder: &ResponseRecorder, sink: &mut dyn ResponseSink) {
    copy_headers(recorder.headers(), sink.headers_mut());
    sink.write_status(recorder.status());

    let body = recorder.body();
    if !body.is_empty() {
        if let Err(e) = sink.write(body) {
            tracing::error!(error = %e, "Failed to write data to the response");
        }
    }
}
