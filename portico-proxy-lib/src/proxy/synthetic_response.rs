use http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use http::StatusCode;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::Response;

use crate::proxy::http_result::HttpError;

pub type RespBody = BoxBody<Bytes, hyper::Error>;

const BAD_GATEWAY_TEMPLATE: &str = include_str!("bad_gateway.html");

/// Build the response sent to the client for a routing or forwarding failure.
///
/// Only the backend port reaches the client; error details stay in the logs.
pub(crate) fn error_response(error: &HttpError) -> Response<RespBody> {
    match error {
        HttpError::BackendUnavailable { port, .. } => bad_gateway_page(*port),
        other => synthetic_error_response(StatusCode::from(other)),
    }
}

/// Build HTTP response with status code of 4xx and 5xx
pub(crate) fn synthetic_error_response(status_code: StatusCode) -> Response<RespBody> {
    let reason = status_code.canonical_reason().unwrap_or("Error");
    text_response(status_code, format!("{} {reason}\n", status_code.as_u16()))
}

/// 502 page telling the operator which local port did not answer
pub fn bad_gateway_page(port: u16) -> Response<RespBody> {
    let html = BAD_GATEWAY_TEMPLATE.replace("{port}", &port.to_string());
    let mut res = Response::new(full_body(html));
    *res.status_mut() = StatusCode::BAD_GATEWAY;
    res.headers_mut()
        .insert(CONTENT_TYPE, http::HeaderValue::from_static("text/html; charset=utf-8"));
    res.headers_mut()
        .insert(CACHE_CONTROL, http::HeaderValue::from_static("no-store"));
    res
}

pub fn text_response(status_code: StatusCode, body: impl Into<Bytes>) -> Response<RespBody> {
    let mut res = Response::new(full_body(body));
    *res.status_mut() = status_code;
    res.headers_mut()
        .insert(CONTENT_TYPE, http::HeaderValue::from_static("text/plain; charset=utf-8"));
    res
}

/// 301 to `location`; falls back to 400 if the location is not a valid header
pub fn redirect_response(location: &str) -> Response<RespBody> {
    match http::HeaderValue::from_str(location) {
        Ok(value) => {
            let mut res = Response::new(empty_body());
            *res.status_mut() = StatusCode::MOVED_PERMANENTLY;
            res.headers_mut().insert(LOCATION, value);
            res
        }
        Err(_) => synthetic_error_response(StatusCode::BAD_REQUEST),
    }
}

pub fn empty_body() -> RespBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

fn full_body(body: impl Into<Bytes>) -> RespBody {
    Full::new(body.into())
        .map_err(|never| match never {})
        .boxed()
}
