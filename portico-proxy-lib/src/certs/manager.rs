use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::acme::{AcmeError, CertificateIssuer, IssuedCertificate};
use crate::certs::record::{
    is_reusable, validate_hostname, CertError, CertificateRecord, ACME_VALIDITY_DAYS,
};
use crate::certs::selfsigned;
use crate::certs::storage::CertStore;

type Acquisition = Shared<BoxFuture<'static, Result<Arc<CertificateRecord>, CertError>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CertificateOptions {
    /// Use the ACME staging directory
    pub use_staging: bool,
    /// Skip the memory and disk caches
    pub force_renew: bool,
}

/// Obtains and caches per-hostname TLS material.
///
/// Lookup order is memory, then disk, then the issuer, then a self-signed
/// fallback. At most one acquisition runs per hostname; concurrent callers
/// await the same in-flight result. Cloning shares the caches.
#[derive(Clone)]
pub struct CertificateManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: CertStore,
    issuer: Arc<dyn CertificateIssuer>,
    acme_timeout: Duration,
    cache: RwLock<HashMap<String, Arc<CertificateRecord>>>,
    pending: Mutex<HashMap<String, Acquisition>>,
}

impl CertificateManager {
    pub fn new(
        cert_root: impl AsRef<Path>,
        issuer: Arc<dyn CertificateIssuer>,
        acme_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: CertStore::new(cert_root.as_ref()),
                issuer,
                acme_timeout,
                cache: RwLock::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &CertStore {
        &self.inner.store
    }

    /// Still-valid in-memory record, without touching disk or the issuer
    pub fn cached(&self, hostname: &str) -> Option<Arc<CertificateRecord>> {
        self.inner.cached(hostname)
    }

    /// Number of acquisitions currently in flight
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Return usable material for `hostname`.
    ///
    /// Issuance failures are recovered by a self-signed certificate, so the
    /// only errors are an invalid hostname or a failed fallback.
    pub async fn get_certificate(
        &self,
        hostname: &str,
        options: CertificateOptions,
    ) -> Result<Arc<CertificateRecord>, CertError> {
        let hostname = hostname.trim_end_matches('.').to_ascii_lowercase();
        validate_hostname(&hostname)?;

        if !options.force_renew {
            if let Some(record) = self.inner.cached(&hostname) {
                debug!(hostname = %hostname, "certificate served from memory");
                return Ok(record);
            }
        }

        let acquisition = {
            let mut pending = self
                .inner
                .pending
                .lock()
                .map_err(|_| CertError::Aborted("pending map poisoned".to_string()))?;
            match pending.get(&hostname) {
                Some(in_flight) => {
                    debug!(hostname = %hostname, "joining in-flight certificate acquisition");
                    in_flight.clone()
                }
                None => {
                    let acquisition = self.spawn_acquisition(hostname.clone(), options);
                    pending.insert(hostname.clone(), acquisition.clone());
                    acquisition
                }
            }
        };

        acquisition.await
    }

    /// Remove all durable certificate state. The memory cache is left alone.
    pub async fn clean_certs(&self) -> Result<(), CertError> {
        self.inner.store.clean().await
    }

    fn spawn_acquisition(&self, hostname: String, options: CertificateOptions) -> Acquisition {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = inner.acquire(&hostname, options).await.map(Arc::new);
            if let Ok(record) = &result {
                if let Ok(mut cache) = inner.cache.write() {
                    cache.insert(hostname.clone(), Arc::clone(record));
                }
            }
            if let Ok(mut pending) = inner.pending.lock() {
                pending.remove(&hostname);
            }
            result
        });

        task.map(|joined| match joined {
            Ok(result) => result,
            Err(e) => Err(CertError::Aborted(e.to_string())),
        })
        .boxed()
        .shared()
    }
}

impl Inner {
    fn cached(&self, hostname: &str) -> Option<Arc<CertificateRecord>> {
        let cache = self.cache.read().ok()?;
        cache
            .get(hostname)
            .filter(|record| record.is_reusable(Utc::now()))
            .cloned()
    }

    async fn acquire(
        &self,
        hostname: &str,
        options: CertificateOptions,
    ) -> Result<CertificateRecord, CertError> {
        if !options.force_renew {
            if let Some(record) = self.load_from_disk(hostname).await {
                return Ok(record);
            }
        }

        let record = match self.issue(hostname, options.use_staging).await {
            Ok(issued) => from_issued(hostname, issued),
            Err(e) => {
                warn!(
                    hostname = %hostname,
                    error = %e,
                    "ACME issuance failed, falling back to self-signed certificate"
                );
                selfsigned::generate(hostname, Utc::now())?
            }
        };

        if let Err(e) = self.store.save(&record).await {
            warn!(hostname = %hostname, error = %e, "failed to persist certificate");
        }
        info!(
            hostname = %hostname,
            self_signed = record.self_signed,
            expires_at = %record.expires_at,
            "certificate ready"
        );
        Ok(record)
    }

    async fn issue(&self, hostname: &str, staging: bool) -> Result<IssuedCertificate, AcmeError> {
        match tokio::time::timeout(self.acme_timeout, self.issuer.issue(hostname, staging)).await {
            Ok(result) => result,
            Err(_) => Err(AcmeError::Timeout(format!(
                "issuance for '{hostname}' exceeded {}s",
                self.acme_timeout.as_secs()
            ))),
        }
    }

    async fn load_from_disk(&self, hostname: &str) -> Option<CertificateRecord> {
        let metadata = match self.store.load_metadata(hostname).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => return None,
            Err(e) => {
                warn!(hostname = %hostname, error = %e, "ignoring unreadable certificate metadata");
                return None;
            }
        };
        if !is_reusable(metadata.expires_at, Utc::now()) {
            debug!(hostname = %hostname, expires_at = %metadata.expires_at, "stored certificate due for renewal");
            return None;
        }
        match self.store.load(hostname, &metadata).await {
            Ok(record) => {
                debug!(hostname = %hostname, "certificate loaded from disk");
                Some(record)
            }
            Err(e) => {
                warn!(hostname = %hostname, error = %e, "failed to load stored certificate");
                None
            }
        }
    }
}

fn from_issued(hostname: &str, issued: IssuedCertificate) -> CertificateRecord {
    let issued_at = Utc::now();
    CertificateRecord {
        hostname: hostname.to_string(),
        private_key: issued.private_key_pem.into_bytes(),
        certificate: issued.certificate_pem.into_bytes(),
        chain: issued.chain_pem.into_bytes(),
        self_signed: false,
        issued_at,
        expires_at: issued_at + chrono::Duration::days(ACME_VALIDITY_DAYS),
    }
}
