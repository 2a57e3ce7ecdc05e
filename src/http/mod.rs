//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID)
//!     → forwarding handler writes the upstream response
//!     → recorder.rs (captured by the sendfile layer)
//!     → sink.rs (replayed or streamed to the client)
//! ```

pub mod recorder;
pub mod request;
pub mod server;
pub mod sink;

pub use recorder::{RecorderPool, ResponseRecorder};
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpServer;
pub use sink::{Flushable, HttpSink, ResponseSink};
