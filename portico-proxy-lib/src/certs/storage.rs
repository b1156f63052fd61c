use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::certs::record::{CertError, CertificateRecord};

const KEY_FILE: &str = "privkey.pem";
const CERT_FILE: &str = "cert.pem";
const CHAIN_FILE: &str = "chain.pem";
const METADATA_FILE: &str = "metadata.json";

/// Metadata written next to each certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertMetadata {
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub domains: Vec<String>,
    #[serde(default)]
    pub self_signed: bool,
}

/// Durable per-hostname certificate storage.
///
/// Layout: `{root}/{hostname}/{privkey.pem,cert.pem,chain.pem,metadata.json}`
#[derive(Debug, Clone)]
pub struct CertStore {
    root: PathBuf,
}

impl CertStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn host_dir(&self, hostname: &str) -> PathBuf {
        self.root.join(hostname)
    }

    pub async fn load_metadata(&self, hostname: &str) -> Result<Option<CertMetadata>, CertError> {
        let path = self.host_dir(hostname).join(METADATA_FILE);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CertError::Storage(format!("read {}: {e}", path.display())));
            }
        };
        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| CertError::Storage(format!("parse {}: {e}", path.display())))
    }

    /// Load the stored material for `hostname` described by `metadata`.
    pub async fn load(
        &self,
        hostname: &str,
        metadata: &CertMetadata,
    ) -> Result<CertificateRecord, CertError> {
        let dir = self.host_dir(hostname);
        let read = |name: &'static str| {
            let path = dir.join(name);
            async move {
                fs::read(&path)
                    .await
                    .map_err(|e| CertError::Storage(format!("read {}: {e}", path.display())))
            }
        };
        let private_key = read(KEY_FILE).await?;
        let certificate = read(CERT_FILE).await?;
        let chain = match fs::read(dir.join(CHAIN_FILE)).await {
            Ok(chain) => chain,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(CertError::Storage(format!("read chain: {e}"))),
        };

        Ok(CertificateRecord {
            hostname: hostname.to_string(),
            private_key,
            certificate,
            chain,
            self_signed: metadata.self_signed,
            issued_at: metadata.issued_at,
            expires_at: metadata.expires_at,
        })
    }

    /// Persist key (owner-only permissions), certificate, chain and metadata.
    pub async fn save(&self, record: &CertificateRecord) -> Result<(), CertError> {
        let dir = self.host_dir(&record.hostname);
        let storage = |e: std::io::Error| CertError::Storage(format!("{}: {e}", dir.display()));

        fs::create_dir_all(&dir).await.map_err(storage)?;
        write_private(&dir.join(KEY_FILE), &record.private_key)
            .await
            .map_err(storage)?;
        fs::write(dir.join(CERT_FILE), &record.certificate)
            .await
            .map_err(storage)?;
        fs::write(dir.join(CHAIN_FILE), &record.chain)
            .await
            .map_err(storage)?;

        let metadata = CertMetadata {
            issued_at: record.issued_at,
            expires_at: record.expires_at,
            domains: vec![record.hostname.clone()],
            self_signed: record.self_signed,
        };
        let json = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| CertError::Storage(format!("serialize metadata: {e}")))?;
        fs::write(dir.join(METADATA_FILE), json)
            .await
            .map_err(storage)?;

        debug!(hostname = %record.hostname, dir = %dir.display(), "certificate persisted");
        Ok(())
    }

    /// Delete every stored certificate and account, then recreate the empty root.
    pub async fn clean(&self) -> Result<(), CertError> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(CertError::Storage(format!("remove {}: {e}", self.root.display())));
            }
        }
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CertError::Storage(format!("create {}: {e}", self.root.display())))?;
        info!(root = %self.root.display(), "certificate storage cleaned");
        Ok(())
    }
}

/// Write a file readable by the owner only.
///
/// The file is created with mode 0600 and an existing file is restricted
/// before any new content is written to it.
pub(crate) async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
    }
    file.write_all(contents).await?;
    file.flush().await
}
