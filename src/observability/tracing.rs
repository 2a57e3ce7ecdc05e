//! Distributed tracing support.
//!
//! # Responsibilities
//! - Open a server span when the hosting pipeline names a tracer
//! - Inject the span context into the request headers so it survives
//!   further forwarding
//!
//! # Design Decisions
//! - Opt-in per request: no [`TracerName`] extension, no span and no
//!   header changes
//! - Three formats injected together (W3C Trace Context, W3C Baggage,
//!   Jaeger) so any downstream consumer finds one it understands

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use opentelemetry::{
    context::FutureExt,
    global,
    propagation::{Injector, TextMapCompositePropagator, TextMapPropagator},
    trace::{SpanKind, TraceContextExt, Tracer, TracerProvider},
    Context, InstrumentationScope,
};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_semantic_conventions::SCHEMA_URL;

use crate::config::TelemetryConfig;

/// Name of the span opened around the rest of the pipeline.
pub const SPAN_NAME: &str = "sendfile";

/// Request extension naming the tracer to use for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracerName(pub String);

/// Shuts the installed tracer provider down when dropped.
pub struct TracerProviderGuard {
    provider: Option<SdkTracerProvider>,
}

impl TracerProviderGuard {
    pub fn provider(&self) -> Option<&SdkTracerProvider> {
        self.provider.as_ref()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = ?e, "Failed to shutdown tracer provider");
            }
        }
    }
}

/// Install an in-process tracer provider as the global one when
/// `config.tracer_name` is set.
///
/// Spans are created and propagated but not exported anywhere.
pub fn init_tracer_provider(config: &TelemetryConfig) -> TracerProviderGuard {
    let provider = config.tracer_name.as_ref().map(|name| {
        let provider = SdkTracerProvider::builder().build();
        global::set_tracer_provider(provider.clone());
        tracing::info!(tracer = %name, "Tracer provider installed");
        provider
    });
    TracerProviderGuard { provider }
}

/// Opens a server span and injects propagation headers into requests
/// carrying a [`TracerName`].
pub struct TraceContextInjector {
    propagator: TextMapCompositePropagator,
    /// Provider used instead of the process-global one.
    provider: Option<SdkTracerProvider>,
}

impl std::fmt::Debug for TraceContextInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceContextInjector")
            .field("provider", &self.provider.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for TraceContextInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceContextInjector {
    pub fn new() -> Self {
        let propagator = TextMapCompositePropagator::new(vec![
            Box::new(TraceContextPropagator::new()),
            Box::new(BaggagePropagator::new()),
            Box::new(opentelemetry_jaeger_propagator::Propagator::new()),
        ]);
        Self {
            propagator,
            provider: None,
        }
    }

    /// Injector creating its spans from `provider`.
    pub fn with_provider(provider: SdkTracerProvider) -> Self {
        Self {
            provider: Some(provider),
            ..Self::new()
        }
    }

    /// Start the span for `request` and inject its context into the
    /// request headers. Returns `None` when the request names no tracer.
    pub fn start(&self, request: &mut Request) -> Option<SpanGuard> {
        let tracer_name = request.extensions().get::<TracerName>()?.0.clone();

        let parent = request
            .extensions()
            .get::<Context>()
            .cloned()
            .unwrap_or_else(Context::current);

        let scope = InstrumentationScope::builder(tracer_name)
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(SCHEMA_URL)
            .build();
        let cx = match &self.provider {
            Some(provider) => start_span(&provider.tracer_with_scope(scope), &parent),
            None => start_span(&global::tracer_provider().tracer_with_scope(scope), &parent),
        };

        self.propagator
            .inject_context(&cx, &mut HeaderInjector(request.headers_mut()));
        request.extensions_mut().insert(cx.clone());

        Some(SpanGuard(cx))
    }
}

fn start_span<T>(tracer: &T, parent: &Context) -> Context
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    let span = tracer
        .span_builder(SPAN_NAME)
        .with_kind(SpanKind::Server)
        .start_with_context(tracer, parent);
    parent.with_span(span)
}

/// Ends the request span when dropped.
pub struct SpanGuard(Context);

impl SpanGuard {
    pub fn context(&self) -> &Context {
        &self.0
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.0.span().end();
    }
}

/// Middleware applying [`TraceContextInjector`] to every request.
pub async fn trace_context_middleware(
    State(injector): State<Arc<TraceContextInjector>>,
    mut request: Request,
    next: Next,
) -> Response {
    match injector.start(&mut request) {
        Some(guard) => {
            let cx = guard.context().clone();
            next.run(request).with_context(cx).await
        }
        None => next.run(request).await,
    }
}

/// Injector writing propagation fields into an HTTP header map.
struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let name = match HeaderName::from_bytes(key.as_bytes()) {
            Ok(name) => name,
            Err(e) => {
                tracing::debug!("Failed to create header name for trace injection: {:?}", e);
                return;
            }
        };
        let val = match HeaderValue::from_str(&value) {
            Ok(val) => val,
            Err(e) => {
                tracing::debug!("Failed to create header value for trace injection: {:?}", e);
                return;
            }
        };
        self.0.insert(name, val);
    }
}
