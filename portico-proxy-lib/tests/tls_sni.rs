mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{CountingIssuer, TestResult};
use portico_proxy_lib::certs::{CertificateManager, CertificateOptions};
use portico_proxy_lib::tls::SniDispatcher;

fn dispatcher(dir: &std::path::Path, issuer: Arc<CountingIssuer>) -> (SniDispatcher, CertificateManager) {
    let certs = CertificateManager::new(dir, issuer, Duration::from_secs(5));
    let dispatcher =
        SniDispatcher::new(certs.clone(), CertificateOptions::default(), Duration::from_secs(5));
    (dispatcher, certs)
}

#[tokio::test]
async fn test_no_sni_without_default_fails() -> TestResult {
    let dir = tempfile::tempdir()?;
    let (dispatcher, _) = dispatcher(dir.path(), Arc::new(CountingIssuer::default()));
    assert!(!dispatcher.has_default());
    assert!(dispatcher.select(None).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_no_sni_uses_default() -> TestResult {
    let dir = tempfile::tempdir()?;
    let (dispatcher, certs) = dispatcher(dir.path(), Arc::new(CountingIssuer::default()));
    let record = certs
        .get_certificate("1-2-3-4.sslip.io", CertificateOptions::default())
        .await?;
    dispatcher.set_default(&record)?;

    let default = dispatcher.select(None).await?;
    let again = dispatcher.select(None).await?;
    assert!(Arc::ptr_eq(&default, &again));
    assert_eq!(default.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    Ok(())
}

#[tokio::test]
async fn test_unknown_sni_is_provisioned_once() -> TestResult {
    let dir = tempfile::tempdir()?;
    let issuer = Arc::new(CountingIssuer::default());
    let (dispatcher, certs) = dispatcher(dir.path(), issuer.clone());

    let first = dispatcher.select(Some("5000-1-2-3-4.sslip.io")).await?;
    let second = dispatcher.select(Some("5000-1-2-3-4.SSLIP.IO")).await?;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(issuer.calls(), 1);
    assert!(certs.cached("5000-1-2-3-4.sslip.io").is_some());
    Ok(())
}

#[tokio::test]
async fn test_provisioning_error_uses_default() -> TestResult {
    let dir = tempfile::tempdir()?;
    let issuer = Arc::new(CountingIssuer::default());
    let (dispatcher, certs) = dispatcher(dir.path(), issuer.clone());
    let record = certs
        .get_certificate("1-2-3-4.sslip.io", CertificateOptions::default())
        .await?;
    dispatcher.set_default(&record)?;

    let default = dispatcher.select(None).await?;
    let fallback = dispatcher.select(Some("bad/name")).await?;
    assert!(Arc::ptr_eq(&default, &fallback));
    assert_eq!(issuer.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_slow_provisioning_serves_default_then_cached() -> TestResult {
    let dir = tempfile::tempdir()?;
    let issuer = Arc::new(CountingIssuer::with_delay(Duration::from_millis(1500)));
    let certs = CertificateManager::new(dir.path(), issuer.clone(), Duration::from_secs(10));
    let dispatcher =
        SniDispatcher::new(certs.clone(), CertificateOptions::default(), Duration::from_millis(200));
    let record = certs
        .get_certificate("1-2-3-4.sslip.io", CertificateOptions::default())
        .await?;
    dispatcher.set_default(&record)?;
    let default = dispatcher.select(None).await?;

    let first = tokio::time::timeout(
        Duration::from_secs(1),
        dispatcher.select(Some("6000-1-2-3-4.sslip.io")),
    )
    .await??;
    assert!(Arc::ptr_eq(&default, &first));

    tokio::time::timeout(Duration::from_secs(5), async {
        while certs.cached("6000-1-2-3-4.sslip.io").is_none() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await?;
    let later = dispatcher.select(Some("6000-1-2-3-4.sslip.io")).await?;
    assert!(!Arc::ptr_eq(&default, &later));
    assert_eq!(issuer.calls(), 2);
    Ok(())
}
