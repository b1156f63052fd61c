use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::sync::Arc;
use tokio_rustls::rustls::crypto::aws_lc_rs;
use tokio_rustls::rustls::server::ServerSessionMemoryCache;
use tokio_rustls::rustls::ServerConfig;

use crate::certs::CertificateRecord;
use crate::error::{ProxyError, Result};

/// ALPN protocols advertised by every server config
pub const ALPN_PROTOCOLS: [&[u8]; 2] = [b"h2", b"http/1.1"];

const SESSION_CACHE_SIZE: usize = 256;

/// Builds a rustls server config from a certificate record
pub fn build_server_config(record: &CertificateRecord) -> Result<Arc<ServerConfig>> {
    let certs = CertificateDer::pem_slice_iter(&record.full_chain())
        .collect::<std::result::Result<Vec<_>, rustls_pki_types::pem::Error>>()
        .map_err(|e| ProxyError::Tls(format!("Failed to parse certificates: {e}")))?;
    if certs.is_empty() {
        return Err(ProxyError::Tls(format!(
            "No certificate found for '{}'",
            record.hostname
        )));
    }

    let key = {
        let mut keys: Vec<PrivateKeyDer<'_>> = PrivateKeyDer::pem_slice_iter(&record.private_key)
            .collect::<std::result::Result<Vec<_>, rustls_pki_types::pem::Error>>()
            .map_err(|e| ProxyError::Tls(format!("Failed to parse private key: {e}")))?;
        let Some(k) = keys.pop() else {
            return Err(ProxyError::NoPrivateKey);
        };
        k
    };

    let mut server = ServerConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| ProxyError::Tls(format!("Failed to select protocol versions: {e}")))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ProxyError::Tls(format!("Failed to build TLS config: {e}")))?;

    server.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();
    server.session_storage = ServerSessionMemoryCache::new(SESSION_CACHE_SIZE);
    Ok(Arc::new(server))
}
