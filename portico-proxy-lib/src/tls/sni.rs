use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use tokio::net::TcpStream;
use tokio_rustls::rustls::server::Acceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::server::TlsStream;
use tokio_rustls::LazyConfigAcceptor;
use tracing::{debug, warn};

use crate::certs::{record::is_reusable, CertificateManager, CertificateOptions, CertificateRecord};
use crate::error::{ProxyError, Result};
use crate::tls::acceptor::build_server_config;

struct CachedConfig {
    config: Arc<ServerConfig>,
    expires_at: DateTime<Utc>,
}

/// Chooses a server certificate per connection from the ClientHello SNI.
///
/// Known hostnames are served from a config cache; unknown ones are
/// provisioned through the [`CertificateManager`] during the handshake.
/// Connections without SNI, or whose provisioning fails, get the default
/// certificate.
pub struct SniDispatcher {
    certs: CertificateManager,
    options: CertificateOptions,
    handshake_timeout: Duration,
    configs: RwLock<HashMap<String, CachedConfig>>,
    default: ArcSwapOption<ServerConfig>,
}

impl SniDispatcher {
    pub fn new(
        certs: CertificateManager,
        options: CertificateOptions,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            certs,
            options,
            handshake_timeout,
            configs: RwLock::new(HashMap::new()),
            default: ArcSwapOption::empty(),
        }
    }

    pub fn set_default(&self, record: &CertificateRecord) -> Result<()> {
        let config = self.remember(record)?;
        self.default.store(Some(config));
        debug!(hostname = %record.hostname, "default certificate set");
        Ok(())
    }

    pub fn has_default(&self) -> bool {
        self.default.load().is_some()
    }

    /// Cache a server config for the record's hostname and return it
    pub fn remember(&self, record: &CertificateRecord) -> Result<Arc<ServerConfig>> {
        let config = build_server_config(record)?;
        if let Ok(mut configs) = self.configs.write() {
            configs.insert(
                record.hostname.clone(),
                CachedConfig { config: Arc::clone(&config), expires_at: record.expires_at },
            );
        }
        Ok(config)
    }

    fn default_config(&self) -> Result<Arc<ServerConfig>> {
        self.default
            .load_full()
            .ok_or_else(|| ProxyError::Tls("no default certificate configured".to_string()))
    }

    fn cached(&self, hostname: &str) -> Option<Arc<ServerConfig>> {
        let configs = self.configs.read().ok()?;
        configs
            .get(hostname)
            .filter(|cached| is_reusable(cached.expires_at, Utc::now()))
            .map(|cached| Arc::clone(&cached.config))
    }

    /// Pick the server config for a handshake announcing `server_name`.
    ///
    /// Provisioning is awaited for at most the handshake timeout; past that
    /// the default certificate is served while the acquisition keeps running
    /// in the background for the next handshake.
    pub async fn select(&self, server_name: Option<&str>) -> Result<Arc<ServerConfig>> {
        let Some(name) = server_name.map(str::to_ascii_lowercase) else {
            return self.default_config();
        };
        if let Some(config) = self.cached(&name) {
            return Ok(config);
        }

        let acquisition = self.certs.get_certificate(&name, self.options);
        let provisioned = match tokio::time::timeout(self.handshake_timeout, acquisition).await {
            Ok(Ok(record)) => self.remember(&record),
            Ok(Err(e)) => Err(ProxyError::from(e)),
            Err(_) => Err(ProxyError::Tls(format!(
                "certificate not ready within {}s",
                self.handshake_timeout.as_secs()
            ))),
        };
        match provisioned {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(sni = %name, error = %e, "certificate provisioning failed, using default certificate");
                self.default_config()
            }
        }
    }

    /// Complete a TLS handshake on `stream`.
    ///
    /// Reading the ClientHello and the handshake I/O are each bounded by the
    /// handshake timeout; certificate selection is bounded in [`Self::select`].
    pub async fn accept(&self, stream: TcpStream) -> Result<TlsStream<TcpStream>> {
        let start = tokio::time::timeout(
            self.handshake_timeout,
            LazyConfigAcceptor::new(Acceptor::default(), stream),
        )
        .await
        .map_err(|_| self.timed_out("ClientHello"))?
        .map_err(|e| ProxyError::Tls(format!("failed to read ClientHello: {e}")))?;

        let server_name = start.client_hello().server_name().map(str::to_owned);
        let config = self.select(server_name.as_deref()).await?;

        tokio::time::timeout(self.handshake_timeout, start.into_stream(config))
            .await
            .map_err(|_| self.timed_out("handshake"))?
            .map_err(|e| ProxyError::Tls(format!("handshake failed: {e}")))
    }

    fn timed_out(&self, phase: &str) -> ProxyError {
        ProxyError::Tls(format!(
            "{phase} timed out after {}s",
            self.handshake_timeout.as_secs()
        ))
    }
}
