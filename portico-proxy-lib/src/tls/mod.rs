pub mod acceptor;
pub mod sni;

pub use acceptor::{build_server_config, ALPN_PROTOCOLS};
pub use sni::SniDispatcher;
