use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use instant_acme::{
    Account, AuthorizationStatus, ChallengeType, Identifier, LetsEncrypt, NewOrder, Order,
    OrderStatus,
};
use rcgen::{CertificateParams, KeyPair};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::acme::account::AccountStore;
use crate::acme::challenge::{ChallengeGuard, ChallengeResponder};
use crate::acme::issuer::{AcmeError, CertificateIssuer, IssuedCertificate};

const ORDER_POLL_INTERVAL: Duration = Duration::from_secs(2);
const CERTIFICATE_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub fn directory_url(staging: bool) -> &'static str {
    if staging {
        LetsEncrypt::Staging.url()
    } else {
        LetsEncrypt::Production.url()
    }
}

/// HTTP-01 certificate issuer backed by an ACME directory (Let's Encrypt).
///
/// Challenge tokens are published through the shared [`ChallengeResponder`]
/// for the lifetime of each order.
pub struct AcmeIssuer {
    accounts: AccountStore,
    contact: Option<String>,
    challenges: Arc<ChallengeResponder>,
    validation_timeout: Duration,
    cached: Mutex<HashMap<bool, Account>>,
}

impl AcmeIssuer {
    pub fn new(
        cert_root: &Path,
        contact: Option<String>,
        challenges: Arc<ChallengeResponder>,
        validation_timeout: Duration,
    ) -> Self {
        Self {
            accounts: AccountStore::new(cert_root),
            contact,
            challenges,
            validation_timeout,
            cached: Mutex::new(HashMap::new()),
        }
    }

    async fn account(&self, staging: bool) -> Result<Account, AcmeError> {
        let mut cached = self.cached.lock().await;
        if let Some(account) = cached.get(&staging) {
            return Ok(account.clone());
        }
        let account = self
            .accounts
            .load_or_create(staging, self.contact.as_deref())
            .await?;
        cached.insert(staging, account.clone());
        Ok(account)
    }

    async fn wait_until_ready(
        &self,
        order: &mut Order,
        hostname: &str,
        deadline: Instant,
    ) -> Result<(), AcmeError> {
        loop {
            if Instant::now() > deadline {
                return Err(AcmeError::Timeout(format!(
                    "validation for '{hostname}' did not complete within {}s",
                    self.validation_timeout.as_secs()
                )));
            }

            let state = order
                .refresh()
                .await
                .map_err(|e| AcmeError::Order(format!("failed to refresh order: {e}")))?;
            debug!(hostname = %hostname, status = ?state.status, "ACME order status");

            match state.status {
                OrderStatus::Ready | OrderStatus::Valid => return Ok(()),
                OrderStatus::Invalid => {
                    let reason = state
                        .error
                        .as_ref()
                        .map(|p| format!("{p:?}"))
                        .unwrap_or_else(|| "unknown error".to_string());
                    return Err(AcmeError::Validation(format!(
                        "order for '{hostname}' became invalid: {reason}"
                    )));
                }
                OrderStatus::Pending | OrderStatus::Processing => sleep(ORDER_POLL_INTERVAL).await,
            }
        }
    }
}

#[async_trait]
impl CertificateIssuer for AcmeIssuer {
    async fn issue(&self, hostname: &str, staging: bool) -> Result<IssuedCertificate, AcmeError> {
        info!(hostname = %hostname, staging, "starting ACME issuance");
        let account = self.account(staging).await?;

        let identifiers = [Identifier::Dns(hostname.to_string())];
        let mut order = account
            .new_order(&NewOrder { identifiers: &identifiers })
            .await
            .map_err(|e| AcmeError::Order(format!("failed to create order: {e}")))?;

        let authorizations = order
            .authorizations()
            .await
            .map_err(|e| AcmeError::Order(format!("failed to fetch authorizations: {e}")))?;

        let mut guard = ChallengeGuard::new(Arc::clone(&self.challenges));
        for auth in &authorizations {
            if auth.status == AuthorizationStatus::Valid {
                continue;
            }
            let challenge = auth
                .challenges
                .iter()
                .find(|c| c.r#type == ChallengeType::Http01)
                .ok_or_else(|| {
                    AcmeError::Order(format!("no HTTP-01 challenge offered for '{hostname}'"))
                })?;

            let key_authorization = order.key_authorization(challenge);
            guard.register(&challenge.token, key_authorization.as_str());
            order
                .set_challenge_ready(&challenge.url)
                .await
                .map_err(|e| AcmeError::Order(format!("failed to set challenge ready: {e}")))?;
        }

        let deadline = Instant::now() + self.validation_timeout;
        self.wait_until_ready(&mut order, hostname, deadline).await?;
        drop(guard);

        let key_pair =
            KeyPair::generate().map_err(|e| AcmeError::Csr(format!("key generation: {e}")))?;
        let params = CertificateParams::new(vec![hostname.to_string()])
            .map_err(|e| AcmeError::Csr(format!("certificate params: {e}")))?;
        let csr = params
            .serialize_request(&key_pair)
            .map_err(|e| AcmeError::Csr(format!("CSR serialization: {e}")))?;

        if order.state().status != OrderStatus::Valid {
            order
                .finalize(csr.der())
                .await
                .map_err(|e| AcmeError::Order(format!("failed to finalize order: {e}")))?;
        }

        let full_chain = loop {
            if Instant::now() > deadline {
                return Err(AcmeError::Timeout(format!(
                    "certificate for '{hostname}' was not issued in time"
                )));
            }
            match order.certificate().await {
                Ok(Some(pem)) => break pem,
                Ok(None) => sleep(CERTIFICATE_POLL_INTERVAL).await,
                Err(e) => {
                    return Err(AcmeError::Order(format!("failed to download certificate: {e}")))
                }
            }
        };

        let (certificate_pem, chain_pem) = split_chain(&full_chain);
        info!(hostname = %hostname, "ACME certificate issued");
        Ok(IssuedCertificate {
            private_key_pem: key_pair.serialize_pem(),
            certificate_pem,
            chain_pem,
        })
    }
}

/// Split a PEM bundle into the leaf certificate and the rest of the chain.
pub fn split_chain(full_chain: &str) -> (String, String) {
    const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    let first = full_chain.find(BEGIN).unwrap_or(0);
    let after_first = first + BEGIN.len();
    match full_chain.get(after_first..).and_then(|rest| rest.find(BEGIN)) {
        Some(offset) => {
            let split = after_first + offset;
            (
                full_chain[first..split].trim_end().to_string() + "\n",
                full_chain[split..].to_string(),
            )
        }
        None => (full_chain[first..].to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_chain_separates_leaf() {
        let bundle = "-----BEGIN CERTIFICATE-----\nLEAF\n-----END CERTIFICATE-----\n\
                      -----BEGIN CERTIFICATE-----\nINTER\n-----END CERTIFICATE-----\n";
        let (leaf, chain) = split_chain(bundle);
        assert!(leaf.contains("LEAF"));
        assert!(!leaf.contains("INTER"));
        assert!(chain.contains("INTER"));
        assert!(chain.starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn split_chain_single_certificate() {
        let bundle = "-----BEGIN CERTIFICATE-----\nLEAF\n-----END CERTIFICATE-----\n";
        let (leaf, chain) = split_chain(bundle);
        assert_eq!(leaf, bundle);
        assert!(chain.is_empty());
    }
}
