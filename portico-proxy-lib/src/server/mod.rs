pub mod connection;
pub mod listener;
pub mod service;
pub mod state;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::acme::{AcmeIssuer, CertificateIssuer, ChallengeResponder};
use crate::certs::{CertificateManager, CertificateOptions};
use crate::config::{validate_config, Config};
use crate::error::{ProxyError, Result};
use crate::net::{HttpPublicIp, PublicIpSource, StaticPublicIp};
use crate::pidfile;
use crate::proxy::ProxyEngine;
use crate::routing::{default_hostname, RouteTable};
use crate::tls::SniDispatcher;

pub use connection::ConnectionGuard;
pub use listener::bind_listener;
pub use service::{https_location, Handlers};
pub use state::ServerState;

/// Owns both listeners, the proxy engine and certificate provisioning.
pub struct Server {
    config: Arc<Config>,
    public_ip: String,
    routes: Arc<RouteTable>,
    challenges: Arc<ChallengeResponder>,
    certs: CertificateManager,
    engine: Arc<ProxyEngine>,
    state: watch::Sender<ServerState>,
    shutdown: CancellationToken,
    connections: TaskTracker,
    active: Arc<AtomicUsize>,
    http_addr: Option<SocketAddr>,
    https_addr: Option<SocketAddr>,
}

impl Server {
    /// Server issuing certificates from Let's Encrypt
    pub fn new(config: Config, public_ip: impl Into<String>) -> Result<Self> {
        let challenges = Arc::new(ChallengeResponder::new());
        let issuer = Arc::new(AcmeIssuer::new(
            &config.tls.cert_dir,
            config.tls.email.clone(),
            Arc::clone(&challenges),
            Duration::from_secs(config.tls.acme_timeout_secs),
        ));
        Self::with_issuer(config, public_ip, challenges, issuer)
    }

    /// Server using `issuer` for certificates; `challenges` must be the
    /// responder the issuer publishes its tokens to.
    pub fn with_issuer(
        config: Config,
        public_ip: impl Into<String>,
        challenges: Arc<ChallengeResponder>,
        issuer: Arc<dyn CertificateIssuer>,
    ) -> Result<Self> {
        validate_config(&config)?;
        let public_ip = public_ip.into();
        let routes = RouteTable::from_ports(
            &config.ports,
            config.name.as_deref(),
            &public_ip,
            &config.domain_suffix,
            config.is_dynamic(),
        )
        .map_err(ProxyError::Config)?;
        let routes = Arc::new(routes);

        let certs = CertificateManager::new(
            &config.tls.cert_dir,
            issuer,
            Duration::from_secs(config.tls.acme_timeout_secs),
        );
        let engine = Arc::new(ProxyEngine::new(
            Arc::clone(&routes),
            Duration::from_secs(config.timeout.proxy_secs),
            Duration::from_secs(config.timeout.idle_secs),
        ));
        let (state, _) = watch::channel(ServerState::Idle);

        Ok(Self {
            config: Arc::new(config),
            public_ip,
            routes,
            challenges,
            certs,
            engine,
            state,
            shutdown: CancellationToken::new(),
            connections: TaskTracker::new(),
            active: Arc::new(AtomicUsize::new(0)),
            http_addr: None,
            https_addr: None,
        })
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn certificates(&self) -> &CertificateManager {
        &self.certs
    }

    pub fn challenges(&self) -> &Arc<ChallengeResponder> {
        &self.challenges
    }

    pub fn engine(&self) -> &Arc<ProxyEngine> {
        &self.engine
    }

    /// Bound plaintext address, once started
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    /// Bound TLS address, once started with TLS enabled
    pub fn https_addr(&self) -> Option<SocketAddr> {
        self.https_addr
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    fn certificate_options(&self) -> CertificateOptions {
        CertificateOptions { use_staging: self.config.tls.staging, force_renew: false }
    }

    fn transition(&self, next: ServerState) {
        info!(state = %next, "server state changed");
        self.state.send_replace(next);
    }

    /// Bind the plaintext listener, provision certificates, bind the TLS
    /// listener and start serving.
    ///
    /// On failure everything already started is shut down again.
    pub async fn start(&mut self) -> Result<()> {
        if self.state() != ServerState::Idle {
            return Err(ProxyError::Config(format!(
                "server cannot start from state '{}'",
                self.state()
            )));
        }

        match self.start_listeners().await {
            Ok(()) => {
                self.transition(ServerState::Running);
                Ok(())
            }
            Err(e) => {
                self.shutdown().await;
                Err(e)
            }
        }
    }

    async fn start_listeners(&mut self) -> Result<()> {
        let tls_enabled = self.config.tls.enabled;
        let redirect_port = tls_enabled.then_some(self.config.listen.https_port);
        let handlers =
            Handlers::new(Arc::clone(&self.challenges), Arc::clone(&self.engine), redirect_port);

        let http_listener = bind_listener(self.config.listen.http_addr())?;
        self.http_addr = Some(http_listener.local_addr()?);
        info!(addr = ?self.http_addr, "HTTP listener bound");
        self.spawn_plain(http_listener, handlers.clone());
        self.transition(ServerState::HttpBound);

        if !tls_enabled {
            return Ok(());
        }

        let dispatcher = Arc::new(SniDispatcher::new(
            self.certs.clone(),
            self.certificate_options(),
            Duration::from_secs(self.config.tls.handshake_timeout_secs),
        ));
        self.provision(&dispatcher).await?;
        self.transition(ServerState::CertsProvisioned);

        let https_listener = bind_listener(self.config.listen.https_addr())?;
        self.https_addr = Some(https_listener.local_addr()?);
        info!(addr = ?self.https_addr, "HTTPS listener bound");
        self.spawn_tls(https_listener, dispatcher, handlers);
        self.transition(ServerState::HttpsBound);
        Ok(())
    }

    /// Certificates for every static route; the first becomes the default.
    /// Without static routes the default is issued for the bare IP hostname.
    async fn provision(&self, dispatcher: &SniDispatcher) -> Result<()> {
        let options = self.certificate_options();
        let mut hostnames: Vec<String> = self
            .routes
            .sorted_routes()
            .into_iter()
            .map(|route| route.hostname.clone())
            .collect();
        if hostnames.is_empty() {
            hostnames.push(default_hostname(&self.public_ip, &self.config.domain_suffix));
        }

        for hostname in hostnames {
            let record = self.certs.get_certificate(&hostname, options).await?;
            if dispatcher.has_default() {
                dispatcher.remember(&record)?;
            } else {
                dispatcher.set_default(&record)?;
            }
            info!(
                hostname = %hostname,
                self_signed = record.self_signed,
                expires_at = %record.expires_at,
                "certificate provisioned"
            );
        }
        Ok(())
    }

    fn spawn_plain(&self, listener: tokio::net::TcpListener, handlers: Handlers) {
        let shutdown = self.shutdown.clone();
        let tracker = self.connections.clone();
        self.connections.spawn(connection::accept_loop(
            listener,
            "http",
            shutdown.clone(),
            tracker,
            Arc::clone(&self.active),
            move |stream, peer| {
                let handlers = handlers.clone();
                let shutdown = shutdown.clone();
                async move {
                    connection::serve_connection(stream, peer, shutdown, move |req| {
                        let handlers = handlers.clone();
                        async move { handlers.plain(req, peer).await }
                    })
                    .await;
                }
            },
        ));
    }

    fn spawn_tls(
        &self,
        listener: tokio::net::TcpListener,
        dispatcher: Arc<SniDispatcher>,
        handlers: Handlers,
    ) {
        let shutdown = self.shutdown.clone();
        let tracker = self.connections.clone();
        self.connections.spawn(connection::accept_loop(
            listener,
            "https",
            shutdown.clone(),
            tracker,
            Arc::clone(&self.active),
            move |stream, peer| {
                let handlers = handlers.clone();
                let dispatcher = Arc::clone(&dispatcher);
                let shutdown = shutdown.clone();
                async move {
                    let tls = match dispatcher.accept(stream).await {
                        Ok(tls) => tls,
                        Err(e) => {
                            warn!(?peer, error = %e, "TLS handshake failed");
                            return;
                        }
                    };
                    connection::serve_connection(tls, peer, shutdown, move |req| {
                        let handlers = handlers.clone();
                        async move { handlers.secure(req, peer).await }
                    })
                    .await;
                }
            },
        ));
    }

    /// Stop accepting, drain connections of both listeners and close the
    /// proxy engine. Safe to call more than once.
    pub async fn shutdown(&self) {
        let first = self.state.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = ServerState::ShuttingDown;
                true
            }
        });
        if !first {
            return;
        }
        info!(state = %ServerState::ShuttingDown, "server state changed");

        self.engine.close();
        self.shutdown.cancel();
        self.connections.close();

        let limit = Duration::from_secs(self.config.timeout.shutdown_secs);
        info!(
            active_connections = self.active_connections(),
            timeout_secs = limit.as_secs(),
            "waiting for connections to finish"
        );
        if tokio::time::timeout(limit, self.connections.wait()).await.is_err() {
            warn!(
                active_connections = self.active_connections(),
                "shutdown timeout reached, abandoning remaining connections"
            );
        }

        self.transition(ServerState::Stopped);
    }

    /// Public URLs of the static routes
    pub fn public_urls(&self) -> Vec<String> {
        let tls = self.config.tls.enabled;
        let port = if tls { self.config.listen.https_port } else { self.config.listen.http_port };
        let (scheme, default_port) = if tls { ("https", 443) } else { ("http", 80) };
        self.routes
            .sorted_routes()
            .into_iter()
            .map(|route| {
                if port == default_port {
                    format!("{scheme}://{}", route.hostname)
                } else {
                    format!("{scheme}://{}:{port}", route.hostname)
                }
            })
            .collect()
    }
}

/// Detect the public IP (unless configured), start the server, wait for
/// SIGINT or SIGTERM and shut down.
pub async fn run(config: Config) -> Result<()> {
    validate_config(&config)?;
    let public_ip = match &config.public_ip {
        Some(ip) => StaticPublicIp(ip.clone()).detect().await?,
        None => HttpPublicIp::with_default_endpoints()?.detect().await?,
    };
    info!(public_ip = %public_ip, dynamic = config.is_dynamic(), "starting portico proxy");

    let pid_file = config.pid_file.clone();
    if let Some(path) = &pid_file {
        pidfile::write_pid(path);
    }

    let mut server = Server::new(config, public_ip)?;
    let started = server.start().await;
    if started.is_ok() {
        for url in server.public_urls() {
            info!(url = %url, "exposed");
        }
        if server.routes().is_dynamic() {
            info!("dynamic mode: any '{{port}}-{{dashed-ip}}' hostname is routed to that local port");
        }
        wait_for_signal().await?;
        server.shutdown().await;
    }

    if let Some(path) = &pid_file {
        pidfile::remove_pid(path);
    }
    started?;
    info!("portico proxy stopped");
    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
            ProxyError::Io(std::io::Error::other(format!("Failed to setup SIGTERM handler: {e}")))
        })?;
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received SIGINT, initiating graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl-C, initiating graceful shutdown");
    }
    Ok(())
}
