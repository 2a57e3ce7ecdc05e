//! `X-Sendfile` interception.
//!
//! # Data Flow
//! ```text
//! captured downstream response (recorder)
//!     → decision.rs (sentinel present?)
//!         no  → replay status, headers, body
//!         yes → guard.rs (path check)
//!             → streamer.rs (chunked read → write → flush)
//!     → middleware.rs returns the sink's response to axum
//! ```
//!
//! # Design Decisions
//! - The downstream response is always captured in full first; whether it
//!   gets discarded is only known once its headers are complete
//! - Streaming runs on a blocking thread and is paced by the client
//! - Errors after the first body byte are logged only

pub mod decision;
pub mod error;
pub mod guard;
pub mod middleware;
pub mod streamer;

pub use decision::{SendfileDecision, SendfileOutcome, OCTET_STREAM, X_SENDFILE};
pub use error::{CaptureError, SendfileError};
pub use guard::PathGuard;
pub use middleware::{sendfile_middleware, SendfileState};
pub use streamer::{FileStreamer, DEFAULT_CHUNK_SIZE};
