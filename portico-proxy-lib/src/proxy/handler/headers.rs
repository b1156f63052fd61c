use hyper::header::{HeaderMap, HeaderValue, HOST};
use std::net::SocketAddr;

pub mod forwarded {
    pub const FOR: &str = "x-forwarded-for";
    pub const HOST: &str = "x-forwarded-host";
    pub const PROTO: &str = "x-forwarded-proto";
}

/// Add X-Forwarded-* headers to an outgoing request
///
/// Appends the client IP to X-Forwarded-For (or creates it), sets
/// X-Forwarded-Host from the original Host and X-Forwarded-Proto from the
/// listener the request arrived on. The Host header itself is untouched.
pub fn add_forwarded_headers(headers: &mut HeaderMap, peer: SocketAddr, is_https: bool) {
    let client_ip = peer.ip().to_string();
    let forwarded_for = match headers.get(forwarded::FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {client_ip}"),
        None => client_ip,
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(forwarded::FOR, value);
    }

    if let Some(host) = headers.get(HOST).cloned() {
        headers.insert(forwarded::HOST, host);
    }

    let proto = if is_https { "https" } else { "http" };
    headers.insert(forwarded::PROTO, HeaderValue::from_static(proto));
}

/// True for `Connection: upgrade` requests that name a protocol to switch to
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(hyper::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    connection_upgrade && headers.contains_key(hyper::header::UPGRADE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "203.0.113.7:51000".parse().unwrap()
    }

    #[test]
    fn sets_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("3000-1-2-3-4.sslip.io"));
        add_forwarded_headers(&mut headers, peer(), true);
        assert_eq!(headers[forwarded::FOR], "203.0.113.7");
        assert_eq!(headers[forwarded::HOST], "3000-1-2-3-4.sslip.io");
        assert_eq!(headers[forwarded::PROTO], "https");
        assert_eq!(headers[HOST], "3000-1-2-3-4.sslip.io");
    }

    #[test]
    fn appends_to_existing_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(forwarded::FOR, HeaderValue::from_static("10.0.0.1"));
        add_forwarded_headers(&mut headers, peer(), false);
        assert_eq!(headers[forwarded::FOR], "10.0.0.1, 203.0.113.7");
        assert_eq!(headers[forwarded::PROTO], "http");
    }

    #[test]
    fn detects_upgrade() {
        let mut headers = HeaderMap::new();
        headers.insert(hyper::header::CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        assert!(!is_upgrade_request(&headers));
        headers.insert(hyper::header::UPGRADE, HeaderValue::from_static("websocket"));
        assert!(is_upgrade_request(&headers));
    }
}
