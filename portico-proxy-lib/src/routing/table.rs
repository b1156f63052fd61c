use std::collections::{HashMap, HashSet};

use crate::routing::hostname::{hostname_for, leading_label, leading_port, strip_port};

/// A published hostname and the local port it forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub hostname: String,
    pub target_port: u16,
    /// Custom subdomain prefix the port was published under, if any
    pub name: Option<String>,
}

/// Maps inbound hostnames to local target ports.
///
/// Resolution order, first match wins:
/// 1. exact hostname match against the static routes
/// 2. custom name alias (text before the first dash)
/// 3. leading numeric token: accepted unconditionally in dynamic mode,
///    otherwise only for ports published by a route without a custom name
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
    aliases: HashMap<String, u16>,
    numeric_ports: HashSet<u16>,
    dynamic: bool,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>, dynamic: bool) -> Self {
        let mut table = Self { dynamic, ..Self::default() };
        for route in routes {
            match &route.name {
                Some(name) => {
                    table.aliases.insert(name.to_ascii_lowercase(), route.target_port);
                }
                None => {
                    table.numeric_ports.insert(route.target_port);
                }
            }
            table
                .routes
                .insert(route.hostname.to_ascii_lowercase(), route);
        }
        table
    }

    /// Build the table for a list of exposed ports.
    ///
    /// A custom `name` is only allowed together with exactly one port.
    pub fn from_ports(
        ports: &[u16],
        name: Option<&str>,
        public_ip: &str,
        suffix: &str,
        dynamic: bool,
    ) -> Result<Self, String> {
        if name.is_some() && ports.len() != 1 {
            return Err("a custom name can only be used when exposing a single port".into());
        }
        let routes = ports
            .iter()
            .map(|&port| {
                let label = name.map(str::to_string).unwrap_or_else(|| port.to_string());
                Route {
                    hostname: hostname_for(&label, public_ip, suffix),
                    target_port: port,
                    name: name.map(str::to_string),
                }
            })
            .collect();
        Ok(Self::new(routes, dynamic))
    }

    /// Resolve a Host header value to a local target port.
    pub fn resolve(&self, host_header: &str) -> Option<u16> {
        let host = strip_port(host_header);
        if host.is_empty() {
            return None;
        }

        if let Some(route) = self.routes.get(&host) {
            return Some(route.target_port);
        }

        if !self.aliases.is_empty() {
            if let Some(port) = self.aliases.get(leading_label(&host)) {
                return Some(*port);
            }
        }

        let port = leading_port(&host)?;
        if self.dynamic || self.numeric_ports.contains(&port) {
            Some(port)
        } else {
            None
        }
    }

    /// Static routes, in no particular order
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    /// Static routes sorted by target port, for deterministic startup order
    pub fn sorted_routes(&self) -> Vec<&Route> {
        let mut routes: Vec<&Route> = self.routes.values().collect();
        routes.sort_by_key(|r| r.target_port);
        routes
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
