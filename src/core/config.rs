//! # Configuration
//!
//! Environment-driven service configuration. A `.env` file is loaded by the
//! binary before `Config::from_env` runs.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: PORT override and SHUTDOWN_GRACE_SECS
//! - 1.0.0: Initial bind address, log level and connection limit

use anyhow::{Context, Result};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_MAX_CONNECTIONS: usize = 256;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Socket address the HTTP facade listens on
    pub bind_addr: String,
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
    /// Connections served concurrently before new ones are turned away
    pub max_connections: usize,
    /// How long in-flight connections get to finish on shutdown
    pub shutdown_grace_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(addr) = lookup("BIND_ADDR").filter(|v| !v.trim().is_empty()) {
            config.bind_addr = addr.trim().to_string();
        }

        if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got '{port}'"))?;
            config.bind_addr = with_port(&config.bind_addr, port);
        }

        if let Some(level) = lookup("LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            config.log_level = level.trim().to_string();
        }

        if let Some(max) = lookup("MAX_CONNECTIONS") {
            config.max_connections = max
                .trim()
                .parse()
                .with_context(|| format!("MAX_CONNECTIONS must be a number, got '{max}'"))?;
            if config.max_connections == 0 {
                return Err(anyhow::anyhow!("MAX_CONNECTIONS must be at least 1"));
            }
        }

        if let Some(grace) = lookup("SHUTDOWN_GRACE_SECS") {
            config.shutdown_grace_secs = grace
                .trim()
                .parse()
                .with_context(|| format!("SHUTDOWN_GRACE_SECS must be a number, got '{grace}'"))?;
        }

        Ok(config)
    }
}

/// Replace the port component of `host:port`, keeping the host
fn with_port(addr: &str, port: u16) -> String {
    let host = match addr.rsplit_once(':') {
        Some((host, _)) => host,
        None => addr,
    };
    format!("{host}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_port_overrides_bind_addr() {
        let config =
            Config::from_lookup(lookup_from(&[("BIND_ADDR", "127.0.0.1:8080"), ("PORT", "4000")]))
                .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:4000");
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        assert!(Config::from_lookup(lookup_from(&[("PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("MAX_CONNECTIONS", "lots")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("MAX_CONNECTIONS", "0")])).is_err());
    }

    #[test]
    fn test_log_level_and_grace() {
        let config = Config::from_lookup(lookup_from(&[
            ("LOG_LEVEL", "debug"),
            ("SHUTDOWN_GRACE_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.shutdown_grace_secs, 5);
    }
}
