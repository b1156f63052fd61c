use std::fmt;

/// Lifecycle of a [`crate::server::Server`]
///
/// `Idle → HttpBound → CertsProvisioned → HttpsBound → Running →
/// ShuttingDown → Stopped`. Without TLS the server goes from `HttpBound`
/// straight to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    HttpBound,
    CertsProvisioned,
    HttpsBound,
    Running,
    ShuttingDown,
    Stopped,
}

impl ServerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ServerState::ShuttingDown | ServerState::Stopped)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Idle => "idle",
            ServerState::HttpBound => "http-bound",
            ServerState::CertsProvisioned => "certs-provisioned",
            ServerState::HttpsBound => "https-bound",
            ServerState::Running => "running",
            ServerState::ShuttingDown => "shutting-down",
            ServerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
