//! Shared helpers for integration tests
#![allow(dead_code)]

use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use portico_proxy_lib::acme::{AcmeError, CertificateIssuer, IssuedCertificate};
use portico_proxy_lib::config::Config;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub fn free_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind ephemeral");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

/// Backend answering every request with a JSON description of it
pub struct EchoBackend {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl EchoBackend {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub async fn spawn_echo_backend() -> EchoBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind backend");
    let addr = listener.local_addr().expect("backend addr");
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    echo(req)
                });
                let _ = ConnBuilder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    EchoBackend { addr, hits }
}

async fn echo(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let mut description = serde_json::json!({
        "method": req.method().as_str(),
        "path": req.uri().path(),
        "query": req.uri().query(),
        "host": header("host"),
        "x_forwarded_for": header("x-forwarded-for"),
        "x_forwarded_host": header("x-forwarded-host"),
        "x_forwarded_proto": header("x-forwarded-proto"),
    });
    let body = req.into_body().collect().await.map(|b| b.to_bytes()).unwrap_or_default();
    description["body"] = serde_json::Value::String(String::from_utf8_lossy(&body).into_owned());

    let mut res = Response::new(Full::new(Bytes::from(description.to_string())));
    res.headers_mut()
        .insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/json"));
    Ok(res)
}

/// Backend that accepts connections and never answers
pub async fn spawn_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind silent backend");
    let addr = listener.local_addr().expect("silent backend addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}

/// Raw TCP backend that accepts `Upgrade: echo` and then echoes bytes
pub async fn spawn_upgrade_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind upgrade backend");
    let addr = listener.local_addr().expect("upgrade backend addr");
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let response = "HTTP/1.1 101 Switching Protocols\r\n\
                                Connection: upgrade\r\n\
                                Upgrade: echo\r\n\r\n";
                if stream.write_all(response.as_bytes()).await.is_err() {
                    return;
                }
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

fn self_signed_pem(hostname: &str) -> IssuedCertificate {
    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(vec![hostname.to_string()]).expect("rcgen");
    IssuedCertificate {
        private_key_pem: signing_key.serialize_pem(),
        certificate_pem: cert.pem(),
        chain_pem: String::new(),
    }
}

/// Issuer that succeeds after a short delay and counts its calls
#[derive(Default)]
pub struct CountingIssuer {
    pub calls: AtomicUsize,
    pub delay: Duration,
}

impl CountingIssuer {
    pub fn with_delay(delay: Duration) -> Self {
        Self { calls: AtomicUsize::new(0), delay }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateIssuer for CountingIssuer {
    async fn issue(&self, hostname: &str, _staging: bool) -> Result<IssuedCertificate, AcmeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self_signed_pem(hostname))
    }
}

/// Issuer that always fails, forcing the self-signed fallback
#[derive(Default)]
pub struct FailingIssuer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CertificateIssuer for FailingIssuer {
    async fn issue(&self, hostname: &str, _staging: bool) -> Result<IssuedCertificate, AcmeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AcmeError::Validation(format!("'{hostname}' is not reachable")))
    }
}

/// Issuer that never finishes within any reasonable timeout
pub struct HangingIssuer;

#[async_trait]
impl CertificateIssuer for HangingIssuer {
    async fn issue(&self, _hostname: &str, _staging: bool) -> Result<IssuedCertificate, AcmeError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(AcmeError::Timeout("unreachable".into()))
    }
}

/// Configuration listening on loopback ephemeral ports with certificates in `cert_dir`
pub fn test_config(cert_dir: &Path, ports: Vec<u16>, tls: bool) -> Config {
    let mut config = Config::default();
    config.dynamic = ports.is_empty();
    config.ports = ports;
    config.public_ip = Some("127.0.0.1".to_string());
    config.listen.host = "127.0.0.1".parse().expect("loopback");
    config.listen.http_port = 0;
    config.listen.https_port = 0;
    config.tls.enabled = tls;
    config.tls.cert_dir = cert_dir.to_path_buf();
    config.tls.acme_timeout_secs = 5;
    config.timeout.proxy_secs = 2;
    config.timeout.shutdown_secs = 2;
    config
}

/// Hostname the proxy publishes for `port` on loopback
pub fn loopback_host(port: u16) -> String {
    format!("{port}-127-0-0-1.sslip.io")
}

/// Send raw bytes over a fresh connection and read until the peer closes
pub async fn raw_request(addr: SocketAddr, request: &[u8]) -> std::io::Result<String> {
    let mut stream = tokio::net::TcpStream::connect(addr).await?;
    stream.write_all(request).await?;
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .map_err(|_| std::io::Error::other("timed out reading response"))??;
    Ok(String::from_utf8_lossy(&response).into_owned())
}

pub fn status_of(raw: &str) -> Option<StatusCode> {
    raw.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
}
