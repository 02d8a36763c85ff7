//! Route classification.
//!
//! # Responsibilities
//! - Decide which handler class a request path belongs to
//! - Provide a stable label for logs and metrics
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - The proxy prefix wins over auxiliary paths
//! - Explicit NotFound rather than silent default

use crate::routing::matcher::PrefixMatcher;

pub const LIVE_PATH: &str = "/live";
pub const READY_PATH: &str = "/ready";
pub const METRICS_PATH: &str = "/metrics";

/// Handling path chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Proxy,
    Live,
    Ready,
    Metrics,
    NotFound,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Proxy => "proxy",
            RouteClass::Live => "live",
            RouteClass::Ready => "ready",
            RouteClass::Metrics => "metrics",
            RouteClass::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for RouteClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled routing surface.
#[derive(Debug, Clone)]
pub struct RouteTable {
    proxy: PrefixMatcher,
    metrics_enabled: bool,
}

impl RouteTable {
    pub fn new(proxy: PrefixMatcher, metrics_enabled: bool) -> Self {
        Self {
            proxy,
            metrics_enabled,
        }
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if self.proxy.matches(path) {
            return RouteClass::Proxy;
        }
        match path {
            LIVE_PATH => RouteClass::Live,
            READY_PATH => RouteClass::Ready,
            METRICS_PATH if self.metrics_enabled => RouteClass::Metrics,
            _ => RouteClass::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_paths() {
        let table = RouteTable::new(PrefixMatcher::new("proxy"), true);
        assert_eq!(table.classify("/proxy/https/example.com"), RouteClass::Proxy);
        assert_eq!(table.classify("/live"), RouteClass::Live);
        assert_eq!(table.classify("/ready"), RouteClass::Ready);
        assert_eq!(table.classify("/metrics"), RouteClass::Metrics);
        assert_eq!(table.classify("/proxy"), RouteClass::NotFound);
        assert_eq!(table.classify("/"), RouteClass::NotFound);
        assert_eq!(table.classify("/live/extra"), RouteClass::NotFound);
    }

    #[test]
    fn metrics_route_follows_config() {
        let table = RouteTable::new(PrefixMatcher::new("proxy"), false);
        assert_eq!(table.classify("/metrics"), RouteClass::NotFound);
    }

    #[test]
    fn prefix_shadows_auxiliary_routes() {
        let table = RouteTable::new(PrefixMatcher::new("live"), false);
        assert_eq!(table.classify("/live/http/example.com"), RouteClass::Proxy);
        assert_eq!(table.classify("/live"), RouteClass::Live);
    }
}
