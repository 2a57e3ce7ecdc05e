//! Response sink contract.
//!
//! # Responsibilities
//! - Describe the surface a handler writes a response through
//!   (status, multi-valued headers, body bytes)
//! - Expose flushing as an optional capability instead of a type check
//! - Provide the channel-backed sink that feeds a streaming HTTP body
//!
//! # Design Decisions
//! - Synchronous API: the file streamer runs on a blocking thread and
//!   its writes block until the transport accepts the chunk
//! - Headers and status are committed on the first body write (or on an
//!   explicit status write); later header edits stay local to the sink

use std::io;

use axum::http::{response::Parts, HeaderMap, Response, StatusCode};
use bytes::{Bytes, BytesMut};
use tokio::sync::{mpsc, oneshot};

/// Anything a response can be written into.
pub trait ResponseSink {
    /// Header map that will accompany the response.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Set the status code and commit the response head.
    fn write_status(&mut self, status: StatusCode);

    /// Write body bytes. Returns the number of bytes accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Flush capability, if this sink supports pushing data out early.
    fn flusher(&mut self) -> Option<&mut dyn Flushable> {
        None
    }
}

/// Optional capability: push buffered body bytes to the transport now.
pub trait Flushable {
    fn flush(&mut self) -> io::Result<()>;
}

/// Write `text` as a plain-text error response.
pub fn write_error(sink: &mut dyn ResponseSink, status: StatusCode, text: &str) {
    let headers = sink.headers_mut();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        axum::http::header::X_CONTENT_TYPE_OPTIONS,
        axum::http::HeaderValue::from_static("nosniff"),
    );
    sink.write_status(status);
    if let Err(e) = sink.write(format!("{text}\n").as_bytes()) {
        tracing::debug!(error = %e, "Failed to write error body");
    }
}

/// Body chunk type carried from the blocking writer to the response body.
pub type BodyChunk = Result<Bytes, io::Error>;

/// Sink that turns synchronous writes into a streaming HTTP response.
///
/// The response head travels over a oneshot channel as soon as it is
/// committed; body chunks travel over a bounded mpsc channel. Written bytes
/// are staged until [`Flushable::flush`] or [`HttpSink::finish`] hands them
/// to the channel, and a full channel blocks the writer until the client
/// consumed the previous chunk.
pub struct HttpSink {
    status: StatusCode,
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<Parts>>,
    body_tx: mpsc::Sender<BodyChunk>,
    staged: BytesMut,
}

/// Receiving half of an [`HttpSink`].
pub struct HttpSinkReceiver {
    pub head: oneshot::Receiver<Parts>,
    pub body: mpsc::Receiver<BodyChunk>,
}

impl HttpSink {
    /// Create a sink and the receivers the async side reads from.
    pub fn channel() -> (Self, HttpSinkReceiver) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(1);
        let sink = Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            head_tx: Some(head_tx),
            body_tx,
            staged: BytesMut::new(),
        };
        (
            sink,
            HttpSinkReceiver {
                head: head_rx,
                body: body_rx,
            },
        )
    }

    /// Whether the status line and headers were already sent.
    pub fn is_committed(&self) -> bool {
        self.head_tx.is_none()
    }

    fn commit(&mut self) {
        if let Some(tx) = self.head_tx.take() {
            let mut parts = Response::new(()).into_parts().0;
            parts.status = self.status;
            parts.headers = self.headers.clone();
            // The receiver is gone only when the request future was dropped.
            let _ = tx.send(parts);
        }
    }

    /// Commit the head if still pending and push any staged bytes.
    pub fn finish(mut self) -> io::Result<()> {
        self.commit();
        self.flush()
    }
}

impl ResponseSink for HttpSink {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.is_committed() {
            tracing::debug!(%status, "Status written after response head was committed");
            return;
        }
        self.status = status;
        self.commit();
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.commit();
        if self.body_tx.is_closed() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "client went away",
            ));
        }
        self.staged.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flusher(&mut self) -> Option<&mut dyn Flushable> {
        Some(self)
    }
}

impl Flushable for HttpSink {
    fn flush(&mut self) -> io::Result<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let chunk = self.staged.split().freeze();
        self.body_tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
    }
}

impl Drop for HttpSink {
    fn drop(&mut self) {
        // Unwinding writer: make sure the waiting request still gets a head.
        if self.head_tx.is_some() {
            self.status = StatusCode::INTERNAL_SERVER_ERROR;
            self.headers.clear();
            self.commit();
        }
    }
}

/// In-memory sink recording every call, for unit tests.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;

    #[derive(Default)]
    pub(crate) struct MockSink {
        pub headers: HeaderMap,
        pub status: Option<StatusCode>,
        pub writes: Vec<Vec<u8>>,
        pub flushes: usize,
        pub flushable: bool,
        /// Fail the write with this index.
        pub fail_after: Option<usize>,
    }

    impl MockSink {
        pub fn body(&self) -> Vec<u8> {
            self.writes.concat()
        }
    }

    impl ResponseSink for MockSink {
        fn headers_mut(&mut self) -> &mut HeaderMap {
            &mut self.headers
        }

        fn write_status(&mut self, status: StatusCode) {
            self.status = Some(status);
        }

        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_after == Some(self.writes.len()) {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            self.writes.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flusher(&mut self) -> Option<&mut dyn Flushable> {
            if self.flushable {
                Some(self)
            } else {
                None
            }
        }
    }

    impl Flushable for MockSink {
        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }
}
