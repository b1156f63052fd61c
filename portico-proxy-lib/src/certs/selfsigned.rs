use chrono::{DateTime, Datelike, Duration, Utc};
use rcgen::{date_time_ymd, CertificateParams, DnType, KeyPair};

use crate::certs::record::{CertError, CertificateRecord, SELF_SIGNED_VALIDITY_DAYS};

/// Generate a self-signed certificate for `hostname`, valid for a year from `now`.
pub fn generate(hostname: &str, now: DateTime<Utc>) -> Result<CertificateRecord, CertError> {
    let key_pair = KeyPair::generate().map_err(|e| CertError::SelfSigned(e.to_string()))?;
    let mut params = CertificateParams::new(vec![hostname.to_string()])
        .map_err(|e| CertError::SelfSigned(e.to_string()))?;
    params
        .distinguished_name
        .push(DnType::CommonName, hostname.to_string());

    let expires_at = now + Duration::days(SELF_SIGNED_VALIDITY_DAYS);
    let (year, month, day) = ymd(now - Duration::days(1));
    params.not_before = date_time_ymd(year, month, day);
    let (year, month, day) = ymd(expires_at);
    params.not_after = date_time_ymd(year, month, day);

    let certificate = params
        .self_signed(&key_pair)
        .map_err(|e| CertError::SelfSigned(e.to_string()))?;

    Ok(CertificateRecord {
        hostname: hostname.to_string(),
        private_key: key_pair.serialize_pem().into_bytes(),
        certificate: certificate.pem().into_bytes(),
        chain: Vec::new(),
        self_signed: true,
        issued_at: now,
        expires_at,
    })
}

// chrono months and days always fit in a u8
fn ymd(at: DateTime<Utc>) -> (i32, u8, u8) {
    (at.year(), at.month() as u8, at.day() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_pem_material() {
        let record = generate("3000-1-2-3-4.sslip.io", Utc::now()).unwrap();
        assert!(record.self_signed);
        assert!(record.chain.is_empty());
        let cert = String::from_utf8(record.certificate).unwrap();
        let key = String::from_utf8(record.private_key).unwrap();
        assert!(cert.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(key.contains("PRIVATE KEY"));
        assert_eq!((record.expires_at - record.issued_at).num_days(), 365);
    }
}
