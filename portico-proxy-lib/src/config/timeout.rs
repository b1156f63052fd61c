use serde::Deserialize;

/// Timeout configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Forwarding timeout in seconds
    /// Bounds both the connect phase and the response phase of every request
    /// forwarded to a local backend. A timeout is answered with a 502 page.
    /// Default: 30 seconds
    #[serde(default = "default_proxy_timeout")]
    pub proxy_secs: u64,
    /// Idle timeout in seconds for pooled backend connections
    /// Default: 60 seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_secs: u64,
    /// Graceful shutdown timeout in seconds
    /// Maximum time spent draining open connections once shutdown starts
    /// Default: 30
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            proxy_secs: default_proxy_timeout(),
            idle_secs: default_idle_timeout(),
            shutdown_secs: default_shutdown_timeout(),
        }
    }
}

fn default_proxy_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_shutdown_timeout() -> u64 {
    30
}
