//! Host configuration from `FNAPP_*` environment variables.

use std::net::SocketAddr;

use fnapp_triggers::{MalformedMessagePolicy, ORDERS_QUEUE};
use thiserror::Error;

pub const BIND_ADDR_ENV: &str = "FNAPP_BIND_ADDR";
pub const ROUTE_PREFIX_ENV: &str = "FNAPP_ROUTE_PREFIX";
pub const QUEUE_NAME_ENV: &str = "FNAPP_QUEUE_NAME";
pub const QUEUE_MAX_ATTEMPTS_ENV: &str = "FNAPP_QUEUE_MAX_ATTEMPTS";
pub const MALFORMED_MESSAGES_ENV: &str = "FNAPP_MALFORMED_MESSAGES";
pub const TIMERS_ENABLED_ENV: &str = "FNAPP_TIMERS_ENABLED";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid value '{value}' for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Leading path segment(s) for HTTP functions; empty means none.
    pub route_prefix: String,
    pub queue_name: String,
    pub queue_max_attempts: u32,
    pub malformed_messages: MalformedMessagePolicy,
    pub timers_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7071)),
            route_prefix: "api".to_string(),
            queue_name: ORDERS_QUEUE.to_string(),
            queue_max_attempts: 5,
            malformed_messages: MalformedMessagePolicy::Drop,
            timers_enabled: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = lookup(BIND_ADDR_ENV) {
            config.bind_addr = v
                .parse()
                .map_err(|e: std::net::AddrParseError| invalid(BIND_ADDR_ENV, &v, e.to_string()))?;
        }
        if let Some(v) = lookup(ROUTE_PREFIX_ENV) {
            config.route_prefix = v.trim().trim_matches('/').to_string();
        }
        if let Some(v) = lookup(QUEUE_NAME_ENV) {
            let name = v.trim();
            if name.is_empty() {
                return Err(invalid(QUEUE_NAME_ENV, &v, "queue name must not be empty"));
            }
            config.queue_name = name.to_string();
        }
        if let Some(v) = lookup(QUEUE_MAX_ATTEMPTS_ENV) {
            config.queue_max_attempts = match v.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(invalid(QUEUE_MAX_ATTEMPTS_ENV, &v, "expected a positive integer")),
            };
        }
        if let Some(v) = lookup(MALFORMED_MESSAGES_ENV) {
            config.malformed_messages = v
                .parse()
                .map_err(|e: fnapp_triggers::orders::UnknownPolicy| {
                    invalid(MALFORMED_MESSAGES_ENV, &v, e.to_string())
                })?;
        }
        if let Some(v) = lookup(TIMERS_ENABLED_ENV) {
            config.timers_enabled = parse_bool(&v)
                .ok_or_else(|| invalid(TIMERS_ENABLED_ENV, &v, "expected true or false"))?;
        }

        Ok(config)
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}
