use std::collections::HashSet;

use crate::config::Config;

pub fn validate(config: &Config) -> Result<(), String> {
    if config.ports.is_empty() && !config.dynamic {
        return Err("at least one port is required unless dynamic mode is enabled".into());
    }
    if config.ports.contains(&0) {
        return Err("exposed ports must be between 1 and 65535".into());
    }
    let unique: HashSet<u16> = config.ports.iter().copied().collect();
    if unique.len() != config.ports.len() {
        return Err("exposed ports must not contain duplicates".into());
    }
    if let Some(name) = &config.name {
        if config.ports.len() > 1 {
            return Err("a custom name can only be used when exposing a single port".into());
        }
        if config.ports.is_empty() {
            return Err("a custom name requires an exposed port".into());
        }
        validate_name(name)?;
    }
    if config.domain_suffix.trim().is_empty() {
        return Err("domain_suffix cannot be empty".into());
    }
    if config.timeout.proxy_secs == 0 {
        return Err("timeout.proxy_secs must be > 0".into());
    }
    if config.timeout.idle_secs == 0 {
        return Err("timeout.idle_secs must be > 0".into());
    }
    if config.timeout.shutdown_secs == 0 {
        return Err("timeout.shutdown_secs must be > 0".into());
    }
    if config.tls.enabled && config.tls.handshake_timeout_secs == 0 {
        return Err("tls.handshake_timeout_secs must be > 0".into());
    }
    if config.tls.enabled && config.tls.acme_timeout_secs == 0 {
        return Err("tls.acme_timeout_secs must be > 0".into());
    }
    Ok(())
}

/// Names become the first label of a hostname and are looked up by the text
/// before the first dash, so they must be a single dash-free DNS label.
fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name.len() > 63 {
        return Err(format!("name '{name}' must be between 1 and 63 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(format!("name '{name}' may only contain lowercase letters and digits"));
    }
    if name.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("name '{name}' cannot be purely numeric"));
    }
    Ok(())
}
