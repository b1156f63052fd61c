use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::{Request, Response};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::proxy::RespBody;

/// Guard to decrement the active connections counter when dropped
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Accept connections until `shutdown` fires, running `on_connection` for
/// each one on `tracker`.
pub async fn accept_loop<F, Fut>(
    listener: TcpListener,
    name: &'static str,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    active: Arc<AtomicUsize>,
    on_connection: F,
) where
    F: Fn(TcpStream, SocketAddr) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(listener = name, "accept loop stopped");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(listener = name, error = %e, "accept error");
                        continue;
                    }
                };
                let guard = ConnectionGuard::new(Arc::clone(&active));
                let conn = on_connection(stream, peer);
                tracker.spawn(async move {
                    let _guard = guard;
                    conn.await;
                });
            }
        }
    }
}

/// Serve HTTP/1.1 and HTTP/2 (with upgrades) on `io` until it closes.
///
/// When `shutdown` fires the connection finishes in-flight requests and
/// closes instead of waiting for the next one.
pub async fn serve_connection<I, H, Fut>(
    io: I,
    peer: SocketAddr,
    shutdown: CancellationToken,
    handler: H,
) where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: Fn(Request<Incoming>) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Response<RespBody>> + Send + 'static,
{
    let builder = ConnBuilder::new(TokioExecutor::new());
    let service = service_fn(move |req: Request<Incoming>| {
        let handler = handler.clone();
        async move { Ok::<_, Infallible>(handler(req).await) }
    });

    let conn = builder.serve_connection_with_upgrades(TokioIo::new(io), service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!(?peer, error = %e, "connection closed with error");
            }
        }
        _ = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.await {
                debug!(?peer, error = %e, "connection closed with error during shutdown");
            }
        }
    }
}
