//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("telemetry.log_format must be \"text\" or \"json\", got {0:?}")]
    LogFormat(String),

    #[error("sendfile.root {0:?} is not a directory")]
    RootNotDirectory(String),
}

/// Check `config` and return every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_address(&mut errors, "upstream.address", &config.upstream.address);
    if config.telemetry.metrics_enabled {
        check_address(&mut errors, "telemetry.metrics_address", &config.telemetry.metrics_address);
    }

    if config.sendfile.chunk_size == 0 {
        errors.push(ValidationError::Zero { field: "sendfile.chunk_size" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }

    if !matches!(config.telemetry.log_format.as_str(), "text" | "json") {
        errors.push(ValidationError::LogFormat(config.telemetry.log_format.clone()));
    }

    if let Some(root) = &config.sendfile.root {
        if !root.is_dir() {
            errors.push(ValidationError::RootNotDirectory(root.display().to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
