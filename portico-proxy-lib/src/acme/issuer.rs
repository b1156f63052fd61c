use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while obtaining a certificate from an ACME directory
#[derive(Debug, Error, Clone)]
pub enum AcmeError {
    #[error("ACME account error: {0}")]
    Account(String),

    #[error("ACME order error: {0}")]
    Order(String),

    #[error("HTTP-01 validation failed: {0}")]
    Validation(String),

    #[error("ACME timeout: {0}")]
    Timeout(String),

    #[error("CSR generation failed: {0}")]
    Csr(String),

    #[error("ACME account storage error: {0}")]
    Storage(String),
}

/// PEM material returned by a successful issuance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub private_key_pem: String,
    /// Leaf certificate
    pub certificate_pem: String,
    /// Intermediate certificates, possibly empty
    pub chain_pem: String,
}

/// Something that can obtain a publicly trusted certificate for a hostname.
///
/// The certificate manager only depends on this seam; the production
/// implementation is [`crate::acme::AcmeIssuer`].
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    async fn issue(&self, hostname: &str, staging: bool) -> Result<IssuedCertificate, AcmeError>;
}
