use http::{Request, Response, Uri};
use http_body_util::{combinators::BoxBody, BodyExt};
use hyper::body::{Body, Bytes, Incoming};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use crate::proxy::http_result::{HttpError, HttpResult};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
/// Request body sent to backends
pub type ForwardBody = BoxBody<Bytes, BoxError>;
pub type HttpClient = Client<HttpConnector, ForwardBody>;

/// Pooled HTTP/1.1 client for local backends
pub fn create_client(connect_timeout: Duration, idle_timeout: Duration) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);

    let mut builder = Client::builder(TokioExecutor::new());
    builder.pool_idle_timeout(idle_timeout);
    builder.build(connector)
}

/// `http://127.0.0.1:{port}` followed by the original path and query
pub fn backend_uri(port: u16, original: &Uri) -> HttpResult<Uri> {
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    format!("http://127.0.0.1:{port}{path_and_query}")
        .parse::<Uri>()
        .map_err(|e| HttpError::InvalidUri(e.to_string()))
}

pub fn box_request_body<B>(req: Request<B>) -> Request<ForwardBody>
where
    B: Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    req.map(|body| body.map_err(Into::into).boxed())
}

/// Send `req` to the backend on `port`, bounding connect and response headers by `timeout`
pub async fn forward(
    client: &HttpClient,
    mut req: Request<ForwardBody>,
    port: u16,
    timeout: Duration,
) -> HttpResult<Response<Incoming>> {
    *req.uri_mut() = backend_uri(port, req.uri())?;
    // Backends are always spoken to over HTTP/1.1, whatever the client negotiated
    *req.version_mut() = http::Version::HTTP_11;

    match tokio::time::timeout(timeout, client.request(req)).await {
        Ok(Ok(resp)) => Ok(resp),
        Ok(Err(e)) => Err(HttpError::BackendUnavailable { port, reason: e.to_string() }),
        Err(_) => Err(HttpError::BackendUnavailable {
            port,
            reason: format!("no response within {}s", timeout.as_secs()),
        }),
    }
}
