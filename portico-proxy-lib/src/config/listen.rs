use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Listener configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ListenConfig {
    /// Address both listeners bind to
    /// Default: "0.0.0.0"
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// Plaintext HTTP port
    /// Must be reachable from the internet on port 80 for ACME HTTP-01 validation
    /// Default: 80
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// HTTPS port
    /// Redirects append this port to the URL when it is not 443
    /// Default: 443
    #[serde(default = "default_https_port")]
    pub https_port: u16,
}

impl ListenConfig {
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.http_port)
    }

    pub fn https_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.https_port)
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            https_port: default_https_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_http_port() -> u16 {
    80
}

fn default_https_port() -> u16 {
    443
}
