//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::http::recorder::DEFAULT_RETAIN_CAPACITY;
use crate::sendfile::streamer::DEFAULT_CHUNK_SIZE;

/// Root configuration for the sendfile proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Application the proxy forwards requests to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// File streaming settings.
    pub sendfile: SendfileConfig,

    /// Logging, tracing and metrics settings.
    pub telemetry: TelemetryConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:9000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:9000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed until the response head is ready, in seconds.
    /// Body streaming is not bounded by it.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// File streaming configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SendfileConfig {
    /// Streaming unit and pre-allocation threshold in bytes.
    pub chunk_size: usize,

    /// Confine sentinel paths to this directory (canonicalised).
    pub root: Option<PathBuf>,

    /// Largest downstream body buffered while looking for the sentinel.
    pub max_captured_body: usize,

    /// Send raw OS error text on 500 responses instead of the error kind.
    pub expose_io_errors: bool,

    /// Recorders kept idle between requests.
    pub pool_max_idle: usize,

    /// Body capacity a pooled recorder may keep between requests.
    pub pool_retain_capacity: usize,
}

impl Default for SendfileConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            root: None,
            max_captured_body: 64 * 1024 * 1024, // 64MB
            expose_io_errors: false,
            pool_max_idle: 1024,
            pool_retain_capacity: DEFAULT_RETAIN_CAPACITY,
        }
    }
}

/// Logging, tracing and metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG.
    pub log_level: String,

    /// Log format: "text" or "json".
    pub log_format: String,

    /// Tracer name marked on every request; tracing is off when unset.
    pub tracer_name: Option<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            tracer_name: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
