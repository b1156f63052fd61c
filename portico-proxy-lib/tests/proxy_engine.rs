mod helpers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use helpers::{free_port, loopback_host, spawn_echo_backend, spawn_silent_backend, TestResult};
use http::{Request, StatusCode};
use http_body_util::{BodyExt, Empty, Full};
use portico_proxy_lib::proxy::ProxyEngine;
use portico_proxy_lib::routing::RouteTable;

fn peer() -> SocketAddr {
    "198.51.100.10:52000".parse().unwrap()
}

fn dynamic_engine() -> ProxyEngine {
    let routes = RouteTable::from_ports(&[], None, "127.0.0.1", "sslip.io", true).unwrap();
    ProxyEngine::new(Arc::new(routes), Duration::from_secs(2), Duration::from_secs(5))
}

async fn body_json(res: http::Response<portico_proxy_lib::proxy::RespBody>) -> serde_json::Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_forwards_path_to_backend() -> TestResult {
    let backend = spawn_echo_backend().await;
    let engine = dynamic_engine();
    let host = loopback_host(backend.port());

    let req = Request::builder()
        .uri("/test?x=1")
        .header("host", &host)
        .body(Empty::<Bytes>::new())?;
    let res = engine.handle_request(req, peer(), false).await;

    assert!(res.forwarded);
    assert_eq!(res.response.status(), StatusCode::OK);
    let echoed = body_json(res.response).await;
    assert_eq!(echoed["path"], "/test");
    assert_eq!(echoed["query"], "x=1");
    assert_eq!(echoed["host"], host.as_str());
    Ok(())
}

#[tokio::test]
async fn test_sets_forwarded_headers() -> TestResult {
    let backend = spawn_echo_backend().await;
    let engine = dynamic_engine();
    let host = loopback_host(backend.port());

    let req = Request::builder()
        .uri("/")
        .header("host", &host)
        .header("x-forwarded-for", "10.1.1.1")
        .body(Empty::<Bytes>::new())?;
    let res = engine.handle_request(req, peer(), true).await;

    let echoed = body_json(res.response).await;
    assert_eq!(echoed["x_forwarded_for"], "10.1.1.1, 198.51.100.10");
    assert_eq!(echoed["x_forwarded_host"], host.as_str());
    assert_eq!(echoed["x_forwarded_proto"], "https");
    Ok(())
}

#[tokio::test]
async fn test_streams_request_body() -> TestResult {
    let backend = spawn_echo_backend().await;
    let engine = dynamic_engine();

    let req = Request::builder()
        .method("POST")
        .uri("/upload")
        .header("host", loopback_host(backend.port()))
        .body(Full::new(Bytes::from_static(b"hello backend")))?;
    let res = engine.handle_request(req, peer(), false).await;

    let echoed = body_json(res.response).await;
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["body"], "hello backend");
    Ok(())
}

#[tokio::test]
async fn test_unconfigured_host_not_forwarded() -> TestResult {
    let backend = spawn_echo_backend().await;
    let routes = RouteTable::from_ports(&[backend.port()], None, "127.0.0.1", "sslip.io", false)
        .map_err(std::io::Error::other)?;
    let engine = ProxyEngine::new(Arc::new(routes), Duration::from_secs(2), Duration::from_secs(5));

    let unexposed = loopback_host(free_port());
    for host in ["unknown.example.com", unexposed.as_str()] {
        let req = Request::builder()
            .uri("/")
            .header("host", host)
            .body(Empty::<Bytes>::new())?;
        let res = engine.handle_request(req, peer(), false).await;
        assert_eq!(res.response.status(), StatusCode::NOT_FOUND);
        assert!(!res.forwarded);
    }
    assert_eq!(backend.hits(), 0);
    Ok(())
}

#[tokio::test]
async fn test_missing_host_is_bad_request() -> TestResult {
    let engine = dynamic_engine();
    let req = Request::builder().uri("/").body(Empty::<Bytes>::new())?;
    let res = engine.handle_request(req, peer(), false).await;
    assert_eq!(res.response.status(), StatusCode::BAD_REQUEST);
    assert!(!res.forwarded);
    Ok(())
}

#[tokio::test]
async fn test_backend_down_returns_502_page() -> TestResult {
    let engine = dynamic_engine();
    let port = free_port();

    let req = Request::builder()
        .uri("/")
        .header("host", loopback_host(port))
        .body(Empty::<Bytes>::new())?;
    let res = engine.handle_request(req, peer(), false).await;

    assert_eq!(res.response.status(), StatusCode::BAD_GATEWAY);
    assert!(!res.forwarded);
    let content_type = res.response.headers()["content-type"].to_str()?.to_string();
    assert!(content_type.starts_with("text/html"));
    let body = res.response.into_body().collect().await?.to_bytes();
    let body = String::from_utf8(body.to_vec())?;
    assert!(body.contains(&port.to_string()));
    assert!(!body.to_lowercase().contains("refused"));
    Ok(())
}

#[tokio::test]
async fn test_backend_timeout_returns_502_page() -> TestResult {
    let backend = spawn_silent_backend().await;
    let routes = RouteTable::from_ports(&[], None, "127.0.0.1", "sslip.io", true)?;
    let engine = ProxyEngine::new(Arc::new(routes), Duration::from_secs(1), Duration::from_secs(5));

    let req = Request::builder()
        .uri("/slow")
        .header("host", loopback_host(backend.port()))
        .body(Empty::<Bytes>::new())?;
    let res = tokio::time::timeout(
        Duration::from_secs(5),
        engine.handle_request(req, peer(), false),
    )
    .await?;

    assert_eq!(res.response.status(), StatusCode::BAD_GATEWAY);
    assert!(!res.forwarded);
    let body = res.response.into_body().collect().await?.to_bytes();
    let body = String::from_utf8(body.to_vec())?;
    assert!(body.contains(&backend.port().to_string()));
    assert!(!body.contains("no response within"));
    Ok(())
}

#[tokio::test]
async fn test_non_101_upgrade_answer_is_relayed() -> TestResult {
    let backend = spawn_echo_backend().await;
    let engine = dynamic_engine();

    let req = Request::builder()
        .uri("/socket")
        .header("host", loopback_host(backend.port()))
        .header("connection", "upgrade")
        .header("upgrade", "websocket")
        .body(Empty::<Bytes>::new())?;
    let res = engine.handle(req, peer(), false).await;

    assert!(res.forwarded);
    assert_eq!(res.response.status(), StatusCode::OK);
    assert_eq!(engine.active_tunnels(), 0);
    Ok(())
}

#[tokio::test]
async fn test_close_is_idempotent() -> TestResult {
    let backend = spawn_echo_backend().await;
    let engine = dynamic_engine();

    assert!(!engine.is_closed());
    assert!(engine.close());
    assert!(!engine.close());
    assert!(engine.is_closed());

    let req = Request::builder()
        .uri("/")
        .header("host", loopback_host(backend.port()))
        .body(Empty::<Bytes>::new())?;
    let res = engine.handle_request(req, peer(), false).await;
    assert_eq!(res.response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(backend.hits(), 0);
    Ok(())
}
