use std::path::{Path, PathBuf};

use instant_acme::{Account, AccountCredentials, NewAccount};
use tracing::{debug, info, warn};

use crate::acme::client::directory_url;
use crate::acme::issuer::AcmeError;
use crate::certs::storage::write_private;

/// Persistent ACME account credentials, one file per directory.
///
/// Credentials are created once and reused for every order.
#[derive(Debug, Clone)]
pub struct AccountStore {
    root: PathBuf,
}

impl AccountStore {
    pub fn new(cert_root: &Path) -> Self {
        Self { root: cert_root.join("accounts") }
    }

    pub fn credentials_path(&self, staging: bool) -> PathBuf {
        let file = if staging { "staging.json" } else { "production.json" };
        self.root.join(file)
    }

    /// Restore the account from disk, or register a new one and persist it.
    pub async fn load_or_create(
        &self,
        staging: bool,
        contact: Option<&str>,
    ) -> Result<Account, AcmeError> {
        if let Some(credentials) = self.load(staging).await {
            debug!(staging, "restoring ACME account from saved credentials");
            return Account::from_credentials(credentials)
                .await
                .map_err(|e| AcmeError::Account(format!("failed to restore account: {e}")));
        }

        let contact = contact.map(|email| format!("mailto:{email}"));
        let contact_refs: Vec<&str> = contact.iter().map(String::as_str).collect();
        let new_account = NewAccount {
            contact: &contact_refs,
            terms_of_service_agreed: true,
            only_return_existing: false,
        };

        info!(staging, directory = %directory_url(staging), "creating ACME account");
        let (account, credentials) = Account::create(&new_account, directory_url(staging), None)
            .await
            .map_err(|e| AcmeError::Account(format!("failed to create account: {e}")))?;

        self.save(staging, &credentials).await?;
        info!(staging, "ACME account created");
        Ok(account)
    }

    async fn load(&self, staging: bool) -> Option<AccountCredentials> {
        let path = self.credentials_path(staging);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to read ACME credentials");
                return None;
            }
        };
        match serde_json::from_str::<AccountCredentials>(&content) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to parse ACME credentials");
                None
            }
        }
    }

    async fn save(&self, staging: bool, credentials: &AccountCredentials) -> Result<(), AcmeError> {
        let path = self.credentials_path(staging);
        let content = serde_json::to_vec_pretty(credentials)
            .map_err(|e| AcmeError::Storage(format!("failed to serialize credentials: {e}")))?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AcmeError::Storage(format!("failed to create {}: {e}", self.root.display())))?;
        write_private(&path, &content)
            .await
            .map_err(|e| AcmeError::Storage(format!("failed to write {}: {e}", path.display())))?;
        debug!(path = %path.display(), "saved ACME credentials");
        Ok(())
    }
}
