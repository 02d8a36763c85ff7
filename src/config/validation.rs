//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, grace period bounded)
//! - Check the route prefix and allow-list syntax
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs once, before the config is handed to the server

use std::net::IpAddr;

use crate::config::schema::ServerConfig;

/// Upper bound for the shutdown grace period.
pub const MAX_SHUTDOWN_GRACE_MS: u64 = 60_000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a fully assembled configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.address.trim().parse::<IpAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.address",
            format!("'{}' is not a valid IP address", config.listener.address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than zero",
        ));
    }

    if let Err(message) = check_prefix(config.proxy.normalized_prefix()) {
        errors.push(ValidationError::new("proxy.prefix", message));
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.read_ms", timeouts.read_ms),
        ("timeouts.write_ms", timeouts.write_ms),
        ("timeouts.upstream_ms", timeouts.upstream_ms),
        ("timeouts.connect_ms", timeouts.connect_ms),
        ("timeouts.shutdown_grace_ms", timeouts.shutdown_grace_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }
    if timeouts.shutdown_grace_ms > MAX_SHUTDOWN_GRACE_MS {
        errors.push(ValidationError::new(
            "timeouts.shutdown_grace_ms",
            format!("must not exceed {MAX_SHUTDOWN_GRACE_MS}"),
        ));
    }

    for entry in &config.policy.allow_hosts {
        if !is_valid_allow_entry(entry) {
            errors.push(ValidationError::new(
                "policy.allow_hosts",
                format!("'{entry}' is neither an IP address nor a host name pattern"),
            ));
        }
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_prefix(prefix: &str) -> Result<(), String> {
    if prefix.is_empty() {
        return Err("must not be empty".to_string());
    }
    if let Some(bad) = prefix
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/')))
    {
        return Err(format!("contains forbidden character '{bad}'"));
    }
    if prefix.contains("//") {
        return Err("must not contain empty segments".to_string());
    }
    Ok(())
}

fn is_valid_allow_entry(entry: &str) -> bool {
    let entry = entry.trim();
    let unbracketed = entry.trim_start_matches('[').trim_end_matches(']');
    if unbracketed.parse::<IpAddr>().is_ok() {
        return true;
    }
    let host = entry.strip_prefix("*.").unwrap_or(entry);
    !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
