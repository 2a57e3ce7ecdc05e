//! Axum middleware wiring the recorder pool, the decision and the HTTP sink.
//!
//! # Data Flow
//! ```text
//! request
//!     → acquire recorder from the pool
//!     → downstream handler runs, its response is captured into the recorder
//!     → blocking task: SendfileDecision::serve(recorder, HttpSink)
//!     → response head from the sink, body streamed from the sink's channel
//!     → recorder dropped (reset + returned to the pool)
//! ```

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;

use crate::config::SendfileConfig;
use crate::http::recorder::{RecorderPool, ResponseRecorder};
use crate::http::sink::{BodyChunk, HttpSink, ResponseSink};
use crate::observability::metrics;
use crate::sendfile::decision::{SendfileDecision, SendfileOutcome};
use crate::sendfile::error::CaptureError;
use crate::sendfile::guard::PathGuard;
use crate::sendfile::streamer::FileStreamer;

/// Shared state of the sendfile middleware.
#[derive(Clone, Debug)]
pub struct SendfileState {
    pool: RecorderPool,
    decision: Arc<SendfileDecision>,
    max_captured_body: usize,
}

impl SendfileState {
    pub fn new(pool: RecorderPool, decision: SendfileDecision, max_captured_body: usize) -> Self {
        Self {
            pool,
            decision: Arc::new(decision),
            max_captured_body,
        }
    }

    /// Build the state described by `config`.
    pub fn from_config(config: &SendfileConfig) -> Self {
        let pool = RecorderPool::for_recorders(config.pool_max_idle, config.pool_retain_capacity);
        let decision = SendfileDecision::new(
            PathGuard::new(config.root.clone()),
            FileStreamer::new(config.chunk_size),
            config.expose_io_errors,
        );
        Self::new(pool, decision, config.max_captured_body)
    }

    /// The recorder pool, for inspection.
    pub fn pool(&self) -> &RecorderPool {
        &self.pool
    }
}

/// Intercept the downstream response and serve `X-Sendfile` files.
pub async fn sendfile_middleware(
    State(state): State<SendfileState>,
    request: Request,
    next: Next,
) -> Response {
    let mut recorder = state.pool.acquire();
    let response = next.run(request).await;

    if let Err(e) = capture(response, &mut recorder, state.max_captured_body).await {
        tracing::error!(error = %e, "Failed to capture downstream response");
        metrics::record_outcome("capture_error");
        return (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response();
    }

    let (sink, receiver) = HttpSink::channel();
    let decision = state.decision.clone();
    let task = tokio::task::spawn_blocking(move || {
        let mut recorder = recorder;
        let mut sink = sink;

        let outcome = decision.serve(&mut recorder, &mut sink);
        if let Err(e) = sink.finish() {
            tracing::debug!(error = %e, "Client went away before the response was flushed");
        }

        match &outcome {
            SendfileOutcome::Passthrough => {}
            SendfileOutcome::Streamed { bytes } => {
                tracing::info!(bytes, "Sendfile transfer complete");
                metrics::record_streamed_bytes(*bytes);
            }
            SendfileOutcome::Rejected(e) => {
                tracing::warn!(error = %e, "Sendfile transfer failed");
            }
        }
        metrics::record_outcome(outcome.label());
    });
    tokio::spawn(async move {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Sendfile task failed");
        }
    });

    match receiver.head.await {
        Ok(head) => Response::from_parts(head, Body::from_stream(body_stream(receiver.body))),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response(),
    }
}

/// Record status, headers and body of `response` into `recorder`.
async fn capture(
    response: Response,
    recorder: &mut ResponseRecorder,
    limit: usize,
) -> Result<(), CaptureError> {
    let (parts, body) = response.into_parts();
    recorder.write_status(parts.status);
    let headers = recorder.headers_mut();
    for (name, value) in parts.headers.iter() {
        headers.append(name.clone(), value.clone());
    }

    let mut captured = 0usize;
    let mut data = body.into_data_stream();
    while let Some(chunk) = data.next().await {
        let chunk = chunk?;
        captured += chunk.len();
        if captured > limit {
            return Err(CaptureError::TooLarge { limit });
        }
        recorder.append(&chunk);
    }
    Ok(())
}

fn body_stream(
    rx: tokio::sync::mpsc::Receiver<BodyChunk>,
) -> impl futures_util::Stream<Item = BodyChunk> + Send + 'static {
    futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    })
}
