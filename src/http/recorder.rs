//! Reusable response recorder.
//!
//! Stands in for the client connection while the downstream handler runs,
//! so the captured response can be inspected before anything is sent.

use std::io;

use axum::http::{HeaderMap, StatusCode};
use bytes::BytesMut;

use crate::http::sink::ResponseSink;
use crate::pool::{Pool, Reusable};

/// Initial body capacity of a fresh recorder.
const INITIAL_BODY_CAPACITY: usize = 64;

/// Default upper bound on the body capacity a pooled recorder keeps.
pub const DEFAULT_RETAIN_CAPACITY: usize = 64 * 1024;

/// Captured status, headers and body of one downstream response.
#[derive(Debug)]
pub struct ResponseRecorder {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    retain_capacity: usize,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::with_retain_capacity(DEFAULT_RETAIN_CAPACITY)
    }

    /// Recorder whose body buffer is shrunk on reset once it grows past
    /// `retain_capacity` bytes.
    pub fn with_retain_capacity(retain_capacity: usize) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::with_capacity(INITIAL_BODY_CAPACITY),
            retain_capacity,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Append captured body bytes.
    pub fn append(&mut self, buf: &[u8]) {
        self.body.extend_from_slice(buf);
    }

    /// Whether the recorder is indistinguishable from a fresh one.
    pub fn is_pristine(&self) -> bool {
        self.status == StatusCode::OK && self.headers.is_empty() && self.body.is_empty()
    }
}

impl Default for ResponseRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Pool of response recorders shared by all in-flight requests.
pub type RecorderPool = Pool<ResponseRecorder>;

impl Pool<ResponseRecorder> {
    /// Pool keeping up to `max_idle` recorders, each retaining at most
    /// `retain_capacity` bytes of body buffer between requests.
    pub fn for_recorders(max_idle: usize, retain_capacity: usize) -> Self {
        Pool::new(max_idle, move || {
            ResponseRecorder::with_retain_capacity(retain_capacity)
        })
    }
}

impl Reusable for ResponseRecorder {
    fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        if self.body.capacity() > self.retain_capacity {
            self.body = BytesMut::with_capacity(INITIAL_BODY_CAPACITY);
        } else {
            self.body.clear();
        }
    }
}

impl ResponseSink for ResponseRecorder {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }
}
