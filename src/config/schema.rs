//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::time::Duration;

/// Root configuration for the proxy daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, port).
    pub listener: ListenerConfig,

    /// Proxy route settings.
    pub proxy: ProxyConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Outbound target policy.
    pub policy: PolicyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// IP address to listen on (e.g., "0.0.0.0").
    pub address: String,

    /// TCP port number. Zero asks the OS for an ephemeral port.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    /// Combine address and port into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        let ip: IpAddr = self.address.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 10_000,
        }
    }
}

/// Proxy route configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Route prefix; requests under `/<prefix>/` are proxied.
    pub prefix: String,
}

impl ProxyConfig {
    /// Prefix without surrounding slashes.
    pub fn normalized_prefix(&self) -> &str {
        self.prefix.trim().trim_matches('/')
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            prefix: "proxy".to_string(),
        }
    }
}

/// Timeout configuration for both connection legs and for shutdown.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Inbound read timeout (request headers, then each body chunk).
    pub read_ms: u64,

    /// Inbound write timeout (each blocked write to the client).
    pub write_ms: u64,

    /// Outbound request timeout (connect + upstream response headers).
    pub upstream_ms: u64,

    /// Outbound TCP connect timeout.
    pub connect_ms: u64,

    /// Grace period for in-flight requests during shutdown.
    pub shutdown_grace_ms: u64,
}

impl TimeoutConfig {
    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }

    pub fn upstream(&self) -> Duration {
        Duration::from_millis(self.upstream_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_ms: 15_000,
            write_ms: 15_000,
            upstream_ms: 30_000,
            connect_ms: 5_000,
            shutdown_grace_ms: 3_000,
        }
    }
}

/// Policy applied to outbound targets.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    /// Permit RFC 1918, CGNAT and unique-local destinations.
    /// Loopback, link-local and multicast stay blocked regardless.
    pub allow_private_networks: bool,

    /// Explicit allow-list: host names (`*.example.com` wildcards) or IP addresses.
    pub allow_hosts: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub log_json: bool,

    /// Expose the Prometheus `/metrics` endpoint.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_daemon_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.proxy.prefix, "proxy");
        assert_eq!(config.timeouts.read(), Duration::from_secs(15));
        assert_eq!(config.timeouts.write(), Duration::from_secs(15));
        assert_eq!(config.timeouts.shutdown_grace(), Duration::from_secs(3));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [listener]
            port = 9000

            [policy]
            allow_hosts = ["127.0.0.1"]
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.port, 9000);
        assert_eq!(config.listener.address, "0.0.0.0");
        assert_eq!(config.policy.allow_hosts, vec!["127.0.0.1".to_string()]);
        assert_eq!(config.timeouts.upstream_ms, 30_000);
    }

    #[test]
    fn prefix_is_normalized() {
        let proxy = ProxyConfig {
            prefix: "/api/proxy/".into(),
        };
        assert_eq!(proxy.normalized_prefix(), "api/proxy");
    }
}
