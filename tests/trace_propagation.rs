//! Trace context reaching the upstream application.

use opentelemetry::global;
use opentelemetry_sdk::trace::SdkTracerProvider;
use sendfile_proxy::config::ProxyConfig;

mod common;

use common::{client, start_mock_upstream, start_proxy, MockResponse};

fn install_provider() {
    global::set_tracer_provider(SdkTracerProvider::builder().build());
}

#[tokio::test]
async fn test_named_tracer_injects_headers_upstream() {
    install_provider();
    let (upstream_addr, mut requests) = start_mock_upstream(MockResponse::ok("traced")).await;

    let mut config = ProxyConfig::default();
    config.telemetry.tracer_name = Some("edge".into());
    let (proxy_addr, shutdown) = start_proxy(config, upstream_addr).await;

    let res = client()
        .get(format!("http://{}/traced", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "traced");

    let head = requests.recv().await.unwrap().to_ascii_lowercase();
    assert!(head.contains("traceparent: 00-"), "head was: {head}");
    assert!(head.contains("uber-trace-id: "), "head was: {head}");

    shutdown.trigger();
}

#[tokio::test]
async fn test_without_tracer_no_headers_are_added() {
    install_provider();
    let (upstream_addr, mut requests) = start_mock_upstream(MockResponse::ok("plain")).await;
    let (proxy_addr, shutdown) = start_proxy(ProxyConfig::default(), upstream_addr).await;

    let res = client()
        .get(format!("http://{}/plain", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");
    assert_eq!(res.text().await.unwrap(), "plain");

    let head = requests.recv().await.unwrap().to_ascii_lowercase();
    assert!(!head.contains("traceparent"));
    assert!(!head.contains("uber-trace-id"));

    shutdown.trigger();
}
