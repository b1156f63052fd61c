use thiserror::Error;

/// Errors that can occur in the proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Port {port} is already in use")]
    PortInUse { port: u16 },

    #[error("Certificate error: {0}")]
    Certificate(#[from] crate::certs::CertError),

    #[error("Public IP detection failed: {0}")]
    PublicIp(String),

    #[error("No private key found in key material")]
    NoPrivateKey,
}

pub type Result<T> = std::result::Result<T, ProxyError>;
