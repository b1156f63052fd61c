use std::fs;
use std::path::Path;

use crate::config::validator::validate;
use crate::config::Config;
use crate::error::{ProxyError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let cfg = read_from_path(p)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Parse without validating, for callers that overlay more settings first
pub fn read_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| ProxyError::Config(format!("Failed to read config file: {e}")))?;
    toml::from_str(&txt).map_err(|e| ProxyError::Config(format!("Failed to parse config: {e}")))
}

pub fn validate_config(cfg: &Config) -> Result<()> {
    validate(cfg).map_err(ProxyError::Config)
}
