//! Outbound target policy.
//!
//! # Responsibilities
//! - Classify destination addresses (reserved, private, public)
//! - Match hosts and addresses against the configured allow-list
//! - Decide whether a literal host or a resolved address may be contacted
//!
//! # Design Decisions
//! - Reserved ranges (loopback, link-local, multicast, unspecified, broadcast)
//!   are only reachable through an explicit allow-list entry
//! - Private ranges (RFC 1918, CGNAT, unique-local) follow `allow_private_networks`
//! - IPv6 addresses embedding an IPv4 address (mapped, compatible, NAT64
//!   `64:ff9b::/96`) are judged by their IPv4 form

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use url::Host;

use crate::config::PolicyConfig;

/// Why a destination was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denied {
    #[error("{0} is in a reserved address range")]
    Reserved(IpAddr),

    #[error("{0} is in a private address range")]
    Private(IpAddr),

    #[error("host {0} refers to the local machine")]
    LocalName(String),
}

/// Address class used by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    Public,
    Private,
    Reserved,
}

/// Classify an address.
pub fn classify(ip: IpAddr) -> AddressClass {
    match ip {
        IpAddr::V4(v4) => classify_v4(v4),
        IpAddr::V6(v6) => match embedded_v4(v6) {
            Some(inner) => classify_v4(inner),
            None => classify_v6(v6),
        },
    }
}

/// IPv4 address carried in the low 32 bits of `::ffff:0:0/96`, `::/96` or
/// the NAT64 well-known prefix `64:ff9b::/96`.
fn embedded_v4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return Some(mapped);
    }
    let [a, b, c, d, e, f, _, _] = ip.segments();
    let compatible = [a, b, c, d, e, f] == [0; 6];
    let nat64 = [a, b, c, d, e, f] == [0x64, 0xff9b, 0, 0, 0, 0];
    if compatible || nat64 {
        let [.., w, x, y, z] = ip.octets();
        return Some(Ipv4Addr::new(w, x, y, z));
    }
    None
}

fn classify_v4(ip: Ipv4Addr) -> AddressClass {
    let octets = ip.octets();
    if ip.is_loopback()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 0.0.0.0/8 "this network"
        || octets[0] == 0
    {
        AddressClass::Reserved
    } else if ip.is_private()
        // CGNAT range 100.64.0.0/10
        || (octets[0] == 100 && (octets[1] & 0xC0) == 64)
    {
        AddressClass::Private
    } else {
        AddressClass::Public
    }
}

fn classify_v6(ip: Ipv6Addr) -> AddressClass {
    let first = ip.segments()[0];
    if ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // link-local fe80::/10
        || (first & 0xffc0) == 0xfe80
    {
        AddressClass::Reserved
    } else if (first & 0xfe00) == 0xfc00 {
        // unique-local fc00::/7
        AddressClass::Private
    } else {
        AddressClass::Public
    }
}

/// One allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowEntry {
    Ip(IpAddr),
    /// Exact host name, lowercase.
    Host(String),
    /// Wildcard `*.example.com`, stored as `.example.com`.
    Suffix(String),
}

impl AllowEntry {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let unbracketed = raw.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = unbracketed.parse() {
            return Self::Ip(ip);
        }
        let lower = raw.to_ascii_lowercase();
        match lower.strip_prefix('*') {
            Some(suffix) => Self::Suffix(suffix.to_string()),
            None => Self::Host(lower),
        }
    }

    fn matches_name(&self, host: &str) -> bool {
        match self {
            Self::Host(name) => host.eq_ignore_ascii_case(name),
            Self::Suffix(suffix) => {
                host.len() > suffix.len()
                    && host.to_ascii_lowercase().ends_with(suffix.as_str())
            }
            Self::Ip(_) => false,
        }
    }

    fn matches_ip(&self, ip: IpAddr) -> bool {
        matches!(self, Self::Ip(allowed) if *allowed == ip)
    }
}

/// Immutable policy shared by the target resolver and the DNS guard.
#[derive(Debug, Clone, Default)]
pub struct TargetPolicy {
    allow_private_networks: bool,
    allow: Vec<AllowEntry>,
}

impl TargetPolicy {
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            allow_private_networks: config.allow_private_networks,
            allow: config.allow_hosts.iter().map(|e| AllowEntry::parse(e)).collect(),
        }
    }

    /// True when a host name is explicitly allow-listed.
    pub fn allows_name(&self, host: &str) -> bool {
        self.allow.iter().any(|entry| entry.matches_name(host))
    }

    /// Check a single address.
    pub fn check_ip(&self, ip: IpAddr) -> Result<(), Denied> {
        if self.allow.iter().any(|entry| entry.matches_ip(ip)) {
            return Ok(());
        }
        match classify(ip) {
            AddressClass::Public => Ok(()),
            AddressClass::Private if self.allow_private_networks => Ok(()),
            AddressClass::Private => Err(Denied::Private(ip)),
            AddressClass::Reserved => Err(Denied::Reserved(ip)),
        }
    }

    /// Check the host of a parsed URL before any I/O happens.
    ///
    /// Domain names other than `localhost` pass here; their resolved
    /// addresses are checked later by [`TargetPolicy::permits_resolved`].
    pub fn check_host(&self, host: &Host<&str>) -> Result<(), Denied> {
        match host {
            Host::Domain(name) => {
                if self.allows_name(name) {
                    return Ok(());
                }
                let lower = name.trim_end_matches('.').to_ascii_lowercase();
                if lower == "localhost" || lower.ends_with(".localhost") {
                    return Err(Denied::LocalName(lower));
                }
                Ok(())
            }
            Host::Ipv4(v4) => self.check_ip(IpAddr::V4(*v4)),
            Host::Ipv6(v6) => self.check_ip(IpAddr::V6(*v6)),
        }
    }

    /// Decide whether an address obtained by resolving `host` may be dialed.
    pub fn permits_resolved(&self, host: &str, ip: IpAddr) -> bool {
        self.allows_name(host) || self.check_ip(ip).is_ok()
    }
}
