use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ProxyError, Result};

/// Plain-text IP echo services, tried in order
pub const DEFAULT_ENDPOINTS: [&str; 3] = [
    "https://api.ipify.org",
    "https://ifconfig.me/ip",
    "https://icanhazip.com",
];

const DETECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of the public IP address hostnames are built from
#[async_trait]
pub trait PublicIpSource: Send + Sync {
    async fn detect(&self) -> Result<String>;
}

/// Asks public echo endpoints over HTTPS
pub struct HttpPublicIp {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl HttpPublicIp {
    pub fn new(endpoints: Vec<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DETECT_TIMEOUT)
            .build()
            .map_err(|e| ProxyError::PublicIp(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoints })
    }

    pub fn with_default_endpoints() -> Result<Self> {
        Self::new(DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect())
    }

    async fn query(&self, endpoint: &str) -> Result<String> {
        let body = self
            .client
            .get(endpoint)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| ProxyError::PublicIp(e.to_string()))?
            .text()
            .await
            .map_err(|e| ProxyError::PublicIp(e.to_string()))?;
        parse_ip(&body)
    }
}

#[async_trait]
impl PublicIpSource for HttpPublicIp {
    async fn detect(&self) -> Result<String> {
        for endpoint in &self.endpoints {
            match self.query(endpoint).await {
                Ok(ip) => {
                    debug!(endpoint = %endpoint, ip = %ip, "public IP detected");
                    return Ok(ip);
                }
                Err(e) => warn!(endpoint = %endpoint, error = %e, "public IP lookup failed"),
            }
        }
        Err(ProxyError::PublicIp(
            "no endpoint returned a usable address; set public_ip explicitly".to_string(),
        ))
    }
}

/// A fixed, configured address
pub struct StaticPublicIp(pub String);

#[async_trait]
impl PublicIpSource for StaticPublicIp {
    async fn detect(&self) -> Result<String> {
        parse_ip(&self.0)
    }
}

/// Validate an echo response body as an IP address
pub fn parse_ip(body: &str) -> Result<String> {
    let candidate = body.trim();
    candidate
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| ProxyError::PublicIp(format!("'{candidate}' is not an IP address")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trimmed_address() {
        assert_eq!(parse_ip("85.100.50.25\n").unwrap(), "85.100.50.25");
        assert_eq!(parse_ip(" 2001:db8::1 ").unwrap(), "2001:db8::1");
    }

    #[test]
    fn rejects_html() {
        assert!(parse_ip("<html>rate limited</html>").is_err());
    }

    #[tokio::test]
    async fn static_source_validates() {
        assert_eq!(StaticPublicIp("1.2.3.4".into()).detect().await.unwrap(), "1.2.3.4");
        assert!(StaticPublicIp("nope".into()).detect().await.is_err());
    }
}
