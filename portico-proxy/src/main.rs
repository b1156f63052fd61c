#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use portico_proxy_lib::config::{read_from_path, validate_config, Config};
use portico_proxy_lib::telemetry::init_tracing;
use portico_proxy_lib::{run, CertStore};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Expose local ports over HTTPS on wildcard-DNS hostnames")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Local port to expose (repeatable)
    #[arg(short, long = "port", value_name = "PORT")]
    ports: Vec<u16>,

    /// Custom subdomain for a single exposed port
    #[arg(short, long)]
    name: Option<String>,

    /// Route `{port}-{ip}` hostnames to any local port
    #[arg(long)]
    dynamic: bool,

    /// Serve plain HTTP only, without certificates
    #[arg(long)]
    no_tls: bool,

    /// Use the Let's Encrypt staging directory
    #[arg(long)]
    staging: bool,

    #[arg(long, value_name = "PORT")]
    http_port: Option<u16>,

    #[arg(long, value_name = "PORT")]
    https_port: Option<u16>,

    /// Public IP used in hostnames (detected when omitted)
    #[arg(long, value_name = "IP")]
    public_ip: Option<IpAddr>,

    /// Backend connect and response timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete every stored certificate and ACME account
    CleanCerts,
}

impl Cli {
    /// Flags take precedence over the configuration file
    fn apply(&self, cfg: &mut Config) {
        if !self.ports.is_empty() {
            cfg.ports = self.ports.clone();
        }
        if let Some(name) = &self.name {
            cfg.name = Some(name.to_ascii_lowercase());
        }
        cfg.dynamic |= self.dynamic;
        if self.no_tls {
            cfg.tls.enabled = false;
        }
        cfg.tls.staging |= self.staging;
        if let Some(port) = self.http_port {
            cfg.listen.http_port = port;
        }
        if let Some(port) = self.https_port {
            cfg.listen.https_port = port;
        }
        if let Some(ip) = self.public_ip {
            cfg.public_ip = Some(ip.to_string());
        }
        if let Some(secs) = self.timeout {
            cfg.timeout.proxy_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => match read_from_path(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("failed to load configuration: {err}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    cli.apply(&mut cfg);

    if let Err(err) = init_tracing(&cfg.logging.level, cfg.logging.show_target) {
        eprintln!("failed to initialize logging: {err}");
    }

    if let Some(Command::CleanCerts) = cli.command {
        match CertStore::new(&cfg.tls.cert_dir).clean().await {
            Ok(()) => info!(cert_dir = %cfg.tls.cert_dir.display(), "certificates removed"),
            Err(err) => {
                error!(%err, "failed to clean certificates");
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(err) = validate_config(&cfg) {
        error!(%err, "invalid configuration");
        std::process::exit(1);
    }

    info!(
        ports = ?cfg.ports,
        dynamic = cfg.is_dynamic(),
        tls = cfg.tls.enabled,
        "configuration loaded"
    );
    if let Err(err) = run(cfg).await {
        error!(%err, "proxy exited with error");
        std::process::exit(1);
    }
}
