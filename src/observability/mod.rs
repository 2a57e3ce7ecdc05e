//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!     → tracing.rs (request spans, propagation headers)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Distributed tracing (whatever provider the host installed)
//! ```

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::tracing::{
    init_tracer_provider, trace_context_middleware, TraceContextInjector, TracerName,
    TracerProviderGuard,
};
