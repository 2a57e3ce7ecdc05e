//! End-to-end tests through the real server stack.

use std::io::Write;

use sendfile_proxy::config::ProxyConfig;

mod common;

use common::{client, start_mock_upstream, start_proxy, MockResponse};

fn temp_file(len: usize) -> (tempfile::NamedTempFile, Vec<u8>) {
    let data: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();
    (file, data)
}

#[tokio::test]
async fn test_passthrough_response_is_replayed() {
    let upstream = MockResponse {
        status: 201,
        headers: Vec::new(),
        body: "created by app".into(),
    }
    .header("X-App", "yes")
    .header("Set-Cookie", "a=1")
    .header("Set-Cookie", "b=2");
    let (upstream_addr, _requests) = start_mock_upstream(upstream).await;
    let (proxy_addr, shutdown) = start_proxy(ProxyConfig::default(), upstream_addr).await;

    let res = client()
        .get(format!("http://{}/page", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 201);
    assert_eq!(res.headers()["x-app"], "yes");
    let cookies: Vec<_> = res.headers().get_all("set-cookie").iter().collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);
    assert!(res.headers().get("x-request-id").is_some());
    assert_eq!(res.text().await.unwrap(), "created by app");

    shutdown.trigger();
}

#[tokio::test]
async fn test_sentinel_file_is_streamed() {
    let (file, data) = temp_file(300_000);
    let upstream = MockResponse::ok("this body is discarded")
        .header("X-Sendfile", file.path().to_str().unwrap())
        .header("Content-Disposition", "attachment; filename=\"report.bin\"");
    let (upstream_addr, _requests) = start_mock_upstream(upstream).await;

    let mut config = ProxyConfig::default();
    config.sendfile.chunk_size = 64 * 1024;
    let (proxy_addr, shutdown) = start_proxy(config, upstream_addr).await;

    let res = client()
        .get(format!("http://{}/download", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 200);
    assert!(res.headers().get("x-sendfile").is_none());
    assert_eq!(
        res.headers()["content-disposition"],
        "attachment; filename=\"report.bin\""
    );
    let body = res.bytes().await.unwrap();
    assert_eq!(body.len(), data.len());
    assert_eq!(&body[..], &data[..]);

    shutdown.trigger();
}

#[tokio::test]
async fn test_traversal_is_forbidden() {
    let upstream = MockResponse::ok("secret?").header("X-Sendfile", "../../etc/passwd");
    let (upstream_addr, _requests) = start_mock_upstream(upstream).await;
    let (proxy_addr, shutdown) = start_proxy(ProxyConfig::default(), upstream_addr).await;

    let res = client()
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 403);
    assert!(res.bytes().await.unwrap().is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.bin");
    let upstream = MockResponse::ok("").header("X-Sendfile", missing.to_str().unwrap());
    let (upstream_addr, _requests) = start_mock_upstream(upstream).await;
    let (proxy_addr, shutdown) = start_proxy(ProxyConfig::default(), upstream_addr).await;

    let res = client()
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "not found\n");

    shutdown.trigger();
}

#[tokio::test]
async fn test_directory_sentinel_is_500() {
    let dir = tempfile::tempdir().unwrap();
    let upstream = MockResponse::ok("").header("X-Sendfile", dir.path().to_str().unwrap());
    let (upstream_addr, _requests) = start_mock_upstream(upstream).await;
    let (proxy_addr, shutdown) = start_proxy(ProxyConfig::default(), upstream_addr).await;

    let res = client()
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 500);
    assert!(res.headers().get("x-sendfile").is_none());
    assert_eq!(res.headers()["content-type"], "text/plain; charset=utf-8");
    assert_eq!(res.text().await.unwrap(), "is a directory\n");

    shutdown.trigger();
}

#[tokio::test]
async fn test_root_confines_sentinel_paths() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("inside.txt"), b"inside root").unwrap();
    let (outside, _) = temp_file(16);

    let mut config = ProxyConfig::default();
    config.sendfile.root = Some(root.path().to_path_buf());

    let upstream = MockResponse::ok("").header("X-Sendfile", "inside.txt");
    let (upstream_addr, _requests) = start_mock_upstream(upstream).await;
    let (proxy_addr, shutdown) = start_proxy(config.clone(), upstream_addr).await;
    let res = client()
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "inside root");
    shutdown.trigger();

    // Absolute paths outside the root are re-rooted, so a file elsewhere
    // on disk is not reachable.
    let upstream = MockResponse::ok("").header("X-Sendfile", outside.path().to_str().unwrap());
    let (upstream_addr, _requests) = start_mock_upstream(upstream).await;
    let (proxy_addr, shutdown) = start_proxy(config, upstream_addr).await;
    let res = client()
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    shutdown.trigger();
}

#[tokio::test]
async fn test_recorders_are_returned_after_requests() {
    let (file, _) = temp_file(1024);
    let upstream = MockResponse::ok("").header("X-Sendfile", file.path().to_str().unwrap());
    let (upstream_addr, _requests) = start_mock_upstream(upstream).await;

    let mut config = ProxyConfig::default();
    config.upstream.address = upstream_addr.to_string();
    let server = sendfile_proxy::HttpServer::new(config).unwrap();
    let pool = server.sendfile_state().pool().clone();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();
    let shutdown = sendfile_proxy::Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    let client = client();
    for _ in 0..10 {
        let res = client
            .get(format!("http://{}/", proxy_addr))
            .send()
            .await
            .unwrap();
        assert_eq!(res.bytes().await.unwrap().len(), 1024);
    }

    // Release happens on the blocking task right after the last chunk.
    for _ in 0..50 {
        if pool.idle_count() > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(pool.idle_count() >= 1);
    assert!(pool.acquire().is_pristine());

    shutdown.trigger();
}
