#![forbid(unsafe_code)]

pub mod acme;
pub mod certs;
pub mod config;
pub mod error;
pub mod net;
pub mod pidfile;
pub mod proxy;
pub mod routing;
pub mod server;
pub mod telemetry;
pub mod tls;

pub use acme::{AcmeIssuer, CertificateIssuer, ChallengeResponder};
pub use certs::{CertStore, CertificateManager, CertificateOptions, CertificateRecord};
pub use config::{load_from_path, Config};
pub use error::{ProxyError, Result};
pub use proxy::{ProxyEngine, ProxyResponse};
pub use routing::{Route, RouteTable};
pub use server::{run, Server, ServerState};
