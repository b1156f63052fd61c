use serde::Deserialize;
use std::path::PathBuf;

/// TLS termination and certificate provisioning configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TlsConfig {
    /// Terminate TLS on the HTTPS listener
    /// When false, the plaintext listener proxies requests itself instead of
    /// redirecting them to HTTPS.
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Use the ACME staging directory instead of production
    /// Staging certificates are not trusted by browsers but are not rate limited
    /// Default: false
    #[serde(default)]
    pub staging: bool,
    /// Contact email registered with the ACME account (optional)
    #[serde(default)]
    pub email: Option<String>,
    /// Root directory for certificates, metadata and ACME account credentials
    /// Default: ".portico/certs"
    #[serde(default = "default_cert_dir")]
    pub cert_dir: PathBuf,
    /// TLS handshake timeout in seconds
    /// Includes the time spent provisioning a certificate on demand for a new SNI name
    /// Default: 15 seconds
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
    /// Maximum time to wait for a single ACME order to validate, in seconds
    /// Default: 120 seconds
    #[serde(default = "default_acme_timeout")]
    pub acme_timeout_secs: u64,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            staging: false,
            email: None,
            cert_dir: default_cert_dir(),
            handshake_timeout_secs: default_handshake_timeout(),
            acme_timeout_secs: default_acme_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cert_dir() -> PathBuf {
    PathBuf::from(".portico/certs")
}

fn default_handshake_timeout() -> u64 {
    15
}

fn default_acme_timeout() -> u64 {
    120
}
