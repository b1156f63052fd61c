pub mod account;
pub mod challenge;
pub mod client;
pub mod issuer;

pub use challenge::{ChallengeGuard, ChallengeResponder, ACME_CHALLENGE_PREFIX};
pub use client::{directory_url, AcmeIssuer};
pub use issuer::{AcmeError, CertificateIssuer, IssuedCertificate};
