use std::net::SocketAddr;
use std::sync::Arc;

use http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use tracing::debug;

use crate::acme::ChallengeResponder;
use crate::proxy::{
    redirect_response, request_host, text_response, ProxyEngine, RespBody,
};
use crate::proxy::synthetic_response::synthetic_error_response;
use crate::routing::strip_port;

/// Request handling for both listeners
#[derive(Clone)]
pub struct Handlers {
    challenges: Arc<ChallengeResponder>,
    engine: Arc<ProxyEngine>,
    /// HTTPS port to redirect plaintext requests to; `None` proxies them instead
    redirect_port: Option<u16>,
}

impl Handlers {
    pub fn new(
        challenges: Arc<ChallengeResponder>,
        engine: Arc<ProxyEngine>,
        redirect_port: Option<u16>,
    ) -> Self {
        Self { challenges, engine, redirect_port }
    }

    /// Plaintext listener: ACME challenges first, then redirect or proxy
    pub async fn plain(&self, req: Request<Incoming>, peer: SocketAddr) -> Response<RespBody> {
        if let Some(key_authorization) = self.challenges.respond(req.uri().path()) {
            debug!(?peer, path = %req.uri().path(), "answering ACME challenge");
            return text_response(StatusCode::OK, key_authorization);
        }

        match self.redirect_port {
            Some(https_port) => {
                let Some(host) = request_host(&req) else {
                    return synthetic_error_response(StatusCode::BAD_REQUEST);
                };
                let path_and_query = req
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                redirect_response(&https_location(&host, https_port, path_and_query))
            }
            None => self.engine.handle(req, peer, false).await.response,
        }
    }

    pub async fn secure(&self, req: Request<Incoming>, peer: SocketAddr) -> Response<RespBody> {
        self.engine.handle(req, peer, true).await.response
    }
}

/// `https://{host}[:{port}]{path_and_query}`, omitting the default port
pub fn https_location(host: &str, https_port: u16, path_and_query: &str) -> String {
    let host = strip_port(host);
    if https_port == 443 {
        format!("https://{host}{path_and_query}")
    } else {
        format!("https://{host}:{https_port}{path_and_query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_drops_default_port() {
        assert_eq!(
            https_location("3000-1-2-3-4.sslip.io:80", 443, "/a?b=c"),
            "https://3000-1-2-3-4.sslip.io/a?b=c"
        );
    }

    #[test]
    fn location_keeps_custom_port() {
        assert_eq!(
            https_location("App-1-2-3-4.sslip.io", 8443, "/"),
            "https://app-1-2-3-4.sslip.io:8443/"
        );
    }
}
