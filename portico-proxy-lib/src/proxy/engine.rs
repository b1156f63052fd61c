use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use http::header::{HeaderValue, HOST};
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::{Body, Bytes};
use hyper_util::rt::TokioIo;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::proxy::forwarding::{box_request_body, create_client, forward, BoxError, HttpClient};
use crate::proxy::handler::{add_forwarded_headers, is_upgrade_request};
use crate::proxy::http_result::{HttpError, HttpResult};
use crate::proxy::synthetic_response::{empty_body, error_response, RespBody};
use crate::routing::{strip_port, RouteTable};

/// A response together with whether a backend produced it
pub struct ProxyResponse {
    pub response: Response<RespBody>,
    pub forwarded: bool,
}

impl ProxyResponse {
    fn forwarded(response: Response<RespBody>) -> Self {
        Self { response, forwarded: true }
    }

    fn failed(error: &HttpError) -> Self {
        Self { response: error_response(error), forwarded: false }
    }
}

/// Routes requests by host to `127.0.0.1:{port}` backends.
///
/// Holds the pooled backend client and the set of open upgrade tunnels.
/// After [`ProxyEngine::close`] every request is answered with 503.
pub struct ProxyEngine {
    routes: Arc<RouteTable>,
    client: ArcSwapOption<HttpClient>,
    timeout: Duration,
    tunnels_cancel: CancellationToken,
    tunnels: TaskTracker,
}

impl ProxyEngine {
    pub fn new(routes: Arc<RouteTable>, timeout: Duration, idle_timeout: Duration) -> Self {
        let client = create_client(timeout, idle_timeout);
        Self {
            routes,
            client: ArcSwapOption::from_pointee(client),
            timeout,
            tunnels_cancel: CancellationToken::new(),
            tunnels: TaskTracker::new(),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn is_closed(&self) -> bool {
        self.client.load().is_none()
    }

    /// Open upgrade tunnels
    pub fn active_tunnels(&self) -> usize {
        self.tunnels.len()
    }

    /// Dispatch to [`Self::handle_upgrade`] or [`Self::handle_request`]
    pub async fn handle<B>(&self, req: Request<B>, peer: SocketAddr, is_https: bool) -> ProxyResponse
    where
        B: Body<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        if is_upgrade_request(req.headers()) {
            self.handle_upgrade(req, peer, is_https).await
        } else {
            self.handle_request(req, peer, is_https).await
        }
    }

    pub async fn handle_request<B>(
        &self,
        req: Request<B>,
        peer: SocketAddr,
        is_https: bool,
    ) -> ProxyResponse
    where
        B: Body<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        match self.proxy(req, peer, is_https).await {
            Ok(resp) => {
                debug!(?peer, %method, %path, status = resp.status().as_u16(), "request forwarded");
                ProxyResponse::forwarded(resp.map(|b| b.boxed()))
            }
            Err(e) => {
                debug!(?peer, %method, %path, error = %e, error_type = e.error_type(), "request not forwarded");
                ProxyResponse::failed(&e)
            }
        }
    }

    /// Forward an upgrade request and, on `101`, tunnel both upgraded streams
    pub async fn handle_upgrade<B>(
        &self,
        mut req: Request<B>,
        peer: SocketAddr,
        is_https: bool,
    ) -> ProxyResponse
    where
        B: Body<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        let client_upgrade = hyper::upgrade::on(&mut req);
        let mut backend_resp = match self.proxy(req, peer, is_https).await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(?peer, error = %e, "upgrade not forwarded");
                return ProxyResponse::failed(&e);
            }
        };

        if backend_resp.status() != StatusCode::SWITCHING_PROTOCOLS {
            debug!(?peer, status = backend_resp.status().as_u16(), "backend declined upgrade");
            return ProxyResponse::forwarded(backend_resp.map(|b| b.boxed()));
        }

        let backend_upgrade = hyper::upgrade::on(&mut backend_resp);
        let cancel = self.tunnels_cancel.child_token();
        self.tunnels.spawn(async move {
            let (client_io, backend_io) =
                match futures::future::try_join(client_upgrade, backend_upgrade).await {
                    Ok(upgraded) => upgraded,
                    Err(e) => {
                        warn!(?peer, error = %e, "upgrade handshake failed");
                        return;
                    }
                };
            let mut client_io = TokioIo::new(client_io);
            let mut backend_io = TokioIo::new(backend_io);
            tokio::select! {
                result = tokio::io::copy_bidirectional(&mut client_io, &mut backend_io) => {
                    match result {
                        Ok((up, down)) => debug!(?peer, up, down, "upgrade tunnel closed"),
                        Err(e) => debug!(?peer, error = %e, "upgrade tunnel error"),
                    }
                }
                _ = cancel.cancelled() => debug!(?peer, "upgrade tunnel cancelled"),
            }
        });

        let (parts, _) = backend_resp.into_parts();
        ProxyResponse::forwarded(Response::from_parts(parts, empty_body()))
    }

    /// Release the backend pool and cancel open tunnels.
    ///
    /// Returns false when the engine was already closed.
    pub fn close(&self) -> bool {
        let released = self.client.swap(None).is_some();
        if released {
            self.tunnels_cancel.cancel();
            self.tunnels.close();
            debug!(tunnels = self.tunnels.len(), "proxy engine closed");
        }
        released
    }

    async fn proxy<B>(
        &self,
        req: Request<B>,
        peer: SocketAddr,
        is_https: bool,
    ) -> HttpResult<Response<hyper::body::Incoming>>
    where
        B: Body<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        let host = request_host(&req).ok_or(HttpError::MissingHost)?;
        let port = self
            .routes
            .resolve(&host)
            .ok_or_else(|| HttpError::NoRoute(strip_port(&host)))?;
        let client = self.client.load_full().ok_or(HttpError::EngineClosed)?;

        let mut req = box_request_body(req);
        if !req.headers().contains_key(HOST) {
            let value = HeaderValue::from_str(&host)
                .map_err(|e| HttpError::InvalidUri(format!("invalid authority: {e}")))?;
            req.headers_mut().insert(HOST, value);
        }
        add_forwarded_headers(req.headers_mut(), peer, is_https);

        forward(&client, req, port, self.timeout).await
    }
}

/// Host header, or the URI authority for HTTP/2 and absolute-form requests
pub fn request_host<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|a| a.as_str().to_string()))
        .filter(|h| !h.trim().is_empty())
}
