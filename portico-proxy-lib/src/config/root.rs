use serde::Deserialize;
use std::path::PathBuf;

use super::listen::ListenConfig;
use super::telemetry::LoggingConfig;
use super::timeout::TimeoutConfig;
use super::tls::TlsConfig;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Local ports to expose, one route per port
    /// Each port is published as `{port}-{dashed-ip}.{domain_suffix}`
    /// Default: empty (requires `dynamic = true`)
    #[serde(default)]
    pub ports: Vec<u16>,
    /// Custom subdomain prefix for a single exposed port (optional)
    /// Publishes the port as `{name}-{dashed-ip}.{domain_suffix}`
    /// Cannot be combined with more than one port
    #[serde(default)]
    pub name: Option<String>,
    /// Route any hostname whose leading label is a port number to that port
    /// Required when no ports are configured
    /// Default: false
    #[serde(default)]
    pub dynamic: bool,
    /// Public IP address used to build hostnames (optional)
    /// Detected at startup when not provided
    #[serde(default)]
    pub public_ip: Option<String>,
    /// Wildcard DNS suffix resolving `{anything}-{dashed-ip}.{suffix}` to the IP
    /// Default: "sslip.io"
    #[serde(default = "default_domain_suffix")]
    pub domain_suffix: String,
    /// PID file written at startup and removed at shutdown (optional)
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
    /// Listener configuration
    #[serde(default)]
    pub listen: ListenConfig,
    /// TLS and certificate configuration
    #[serde(default)]
    pub tls: TlsConfig,
    /// Timeout configuration
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Dynamic routing applies when enabled or when nothing is exposed statically
    pub fn is_dynamic(&self) -> bool {
        self.dynamic || self.ports.is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            name: None,
            dynamic: false,
            public_ip: None,
            domain_suffix: default_domain_suffix(),
            pid_file: None,
            listen: ListenConfig::default(),
            tls: TlsConfig::default(),
            timeout: TimeoutConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_domain_suffix() -> String {
    "sslip.io".to_string()
}
