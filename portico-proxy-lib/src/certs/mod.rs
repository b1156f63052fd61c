pub mod manager;
pub mod record;
pub mod selfsigned;
pub mod storage;

pub use manager::{CertificateManager, CertificateOptions};
pub use record::{CertError, CertificateRecord, RENEWAL_WINDOW_DAYS};
pub use storage::{CertMetadata, CertStore};
