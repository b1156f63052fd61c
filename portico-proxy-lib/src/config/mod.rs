mod listen;
mod loader;
mod root;
mod telemetry;
mod timeout;
mod tls;
mod validator;

pub use listen::ListenConfig;
pub use loader::{load_from_path, read_from_path, validate_config};
pub use root::Config;
pub use telemetry::LoggingConfig;
pub use timeout::TimeoutConfig;
pub use tls::TlsConfig;
