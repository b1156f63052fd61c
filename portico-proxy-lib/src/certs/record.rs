use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Certificates are re-acquired once fewer than this many days remain
pub const RENEWAL_WINDOW_DAYS: i64 = 30;
/// Validity recorded for ACME certificates
pub const ACME_VALIDITY_DAYS: i64 = 90;
/// Validity of locally generated fallback certificates
pub const SELF_SIGNED_VALIDITY_DAYS: i64 = 365;

#[derive(Debug, Error, Clone)]
pub enum CertError {
    #[error("invalid hostname: {0}")]
    InvalidHostname(String),

    #[error("self-signed generation failed: {0}")]
    SelfSigned(String),

    #[error("certificate storage error: {0}")]
    Storage(String),

    #[error("certificate provisioning aborted: {0}")]
    Aborted(String),
}

/// TLS material for one hostname, PEM encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    pub hostname: String,
    pub private_key: Vec<u8>,
    pub certificate: Vec<u8>,
    /// Intermediate certificates; empty for self-signed material
    pub chain: Vec<u8>,
    pub self_signed: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CertificateRecord {
    /// True while more than the renewal window remains before expiry
    pub fn is_reusable(&self, now: DateTime<Utc>) -> bool {
        is_reusable(self.expires_at, now)
    }

    /// Leaf followed by the chain, the order a TLS server presents them in
    pub fn full_chain(&self) -> Vec<u8> {
        let mut pem = self.certificate.clone();
        if !pem.ends_with(b"\n") && !self.chain.is_empty() {
            pem.push(b'\n');
        }
        pem.extend_from_slice(&self.chain);
        pem
    }
}

pub fn is_reusable(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at - now > Duration::days(RENEWAL_WINDOW_DAYS)
}

/// Hostnames become directory names, so anything that could escape the
/// storage root is refused.
pub fn validate_hostname(hostname: &str) -> Result<(), CertError> {
    let valid = !hostname.is_empty()
        && hostname.len() <= 253
        && !hostname.starts_with('.')
        && hostname
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CertError::InvalidHostname(hostname.to_string()))
    }
}
