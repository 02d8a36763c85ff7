//! Target resolution: inbound path → validated outbound URL.
//!
//! Accepted encodings after `/<prefix>/`:
//!
//! ```text
//! /proxy/https%3A%2F%2Fexample.com%2Fget%3Fa%3D1   percent-encoded absolute URL
//! /proxy/https://example.com/get                   unencoded absolute URL
//! /proxy/https/example.com/get                     <scheme>/<host>/<path> shorthand
//! ```
//!
//! An unencoded inbound query string is attached to the target.

use std::sync::Arc;

use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

use crate::routing::matcher::PrefixMatcher;
use crate::security::{Denied, TargetPolicy};

/// Per-request target failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("target forbidden: {0}")]
    TargetForbidden(#[from] Denied),
}

fn invalid(reason: impl Into<String>) -> TargetError {
    TargetError::InvalidTarget(reason.into())
}

/// A validated absolute http(s) URL with a non-empty, policy-approved host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    url: Url,
}

impl ProxyTarget {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl std::fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Pure resolver; no I/O.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    matcher: PrefixMatcher,
    policy: Arc<TargetPolicy>,
}

impl TargetResolver {
    pub fn new(matcher: PrefixMatcher, policy: Arc<TargetPolicy>) -> Self {
        Self { matcher, policy }
    }

    /// Extract and validate the target carried by `path` (raw, percent-encoded).
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Result<ProxyTarget, TargetError> {
        let encoded = self
            .matcher
            .strip(path)
            .ok_or_else(|| invalid("path is not under the proxy prefix"))?;
        if encoded.is_empty() {
            return Err(invalid("empty target"));
        }

        let decoded = percent_decode_str(encoded)
            .decode_utf8()
            .map_err(|_| invalid("target is not valid UTF-8"))?;

        let mut url = parse_absolute(&decoded)?;
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("credentials are not allowed in the target"));
        }
        url.set_fragment(None);
        merge_query(&mut url, query);

        let host = url.host().ok_or_else(|| invalid("target has no host"))?;
        self.policy.check_host(&host)?;

        Ok(ProxyTarget { url })
    }
}

fn parse_absolute(decoded: &str) -> Result<Url, TargetError> {
    let url = match Url::parse(decoded) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => parse_shorthand(decoded)?,
        Err(e) => return Err(invalid(format!("malformed URL: {e}"))),
    };

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(invalid("target has no host")),
    }
}

fn parse_shorthand(decoded: &str) -> Result<Url, TargetError> {
    let (scheme, rest) = decoded
        .split_once('/')
        .ok_or_else(|| invalid("not an absolute URL"))?;
    let scheme = scheme.to_ascii_lowercase();
    if !matches!(scheme.as_str(), "http" | "https") || rest.is_empty() {
        return Err(invalid("not an absolute URL"));
    }
    Url::parse(&format!("{scheme}://{rest}")).map_err(|e| invalid(format!("malformed URL: {e}")))
}

fn merge_query(url: &mut Url, inbound: Option<&str>) {
    let Some(inbound) = inbound.filter(|q| !q.is_empty()) else {
        return;
    };
    let merged = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{inbound}"),
        _ => inbound.to_string(),
    };
    url.set_query(Some(&merged));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;

    fn resolver(allow: &[&str]) -> TargetResolver {
        let policy = TargetPolicy::from_config(&PolicyConfig {
            allow_private_networks: false,
            allow_hosts: allow.iter().map(|s| s.to_string()).collect(),
        });
        TargetResolver::new(PrefixMatcher::new("proxy"), Arc::new(policy))
    }

    #[test]
    fn percent_encoded_target() {
        let target = resolver(&[])
            .resolve("/proxy/http%3A%2F%2Fexample.test%2Fping", None)
            .unwrap();
        assert_eq!(target.as_str(), "http://example.test/ping");
        assert_eq!(target.scheme(), "http");
        assert_eq!(target.host(), "example.test");
    }

    #[test]
    fn unencoded_target() {
        let target = resolver(&[])
            .resolve("/proxy/https://example.com/a/b", None)
            .unwrap();
        assert_eq!(target.as_str(), "https://example.com/a/b");
    }

    #[test]
    fn shorthand_target() {
        let target = resolver(&[])
            .resolve("/proxy/https/httpbin.org/get", None)
            .unwrap();
        assert_eq!(target.as_str(), "https://httpbin.org/get");

        let bare = resolver(&[]).resolve("/proxy/HTTP/example.com", None).unwrap();
        assert_eq!(bare.as_str(), "http://example.com/");
    }

    #[test]
    fn encoded_query_and_inbound_query() {
        let r = resolver(&[]);
        let target = r
            .resolve("/proxy/http%3A%2F%2Fexample.com%2Fs%3Fq%3Drust", Some("page=2"))
            .unwrap();
        assert_eq!(target.as_str(), "http://example.com/s?q=rust&page=2");

        let target = r.resolve("/proxy/https/example.com/s", Some("q=1")).unwrap();
        assert_eq!(target.as_str(), "https://example.com/s?q=1");

        let target = r.resolve("/proxy/https/example.com/s", Some("")).unwrap();
        assert_eq!(target.as_str(), "https://example.com/s");
    }

    #[test]
    fn double_encoding_is_decoded_once() {
        let target = resolver(&[])
            .resolve("/proxy/http%3A%2F%2Fexample.com%2Fa%2520b", None)
            .unwrap();
        assert_eq!(target.url().path(), "/a%20b");
    }

    #[test]
    fn fragment_is_dropped() {
        let target = resolver(&[])
            .resolve("/proxy/http%3A%2F%2Fexample.com%2Fp%23frag", None)
            .unwrap();
        assert_eq!(target.as_str(), "http://example.com/p");
    }

    #[test]
    fn malformed_inputs_are_invalid() {
        let r = resolver(&[]);
        let inputs = [
            "/proxy/",
            "/proxy",
            "/other/http%3A%2F%2Fexample.com",
            "/proxy/example.com",
            "/proxy/example.com/path",
            "/proxy/ftp%3A%2F%2Fexample.com%2Ffile",
            "/proxy/file%3A%2F%2F%2Fetc%2Fpasswd",
            "/proxy/javascript%3Aalert(1)",
            "/proxy/http%3A%2F%2F",
            "/proxy/http://",
            "/proxy/https/",
            "/proxy/%2F%2Fexample.com",
            "/proxy/http%3A%2F%2Fexample.com%3A99999",
            "/proxy/%FF%FE",
            "/proxy/http%3A%2F%2Fuser%3Apass%40example.com",
            "/proxy/http%3A%2F%2Fexa%20mple.com",
            "/proxy/mailto%3Aa%40b.c",
            "/proxy/%",
            "/proxy/%%%",
        ];
        for input in inputs {
            match r.resolve(input, None) {
                Err(TargetError::InvalidTarget(_)) => {}
                other => panic!("{input}: expected InvalidTarget, got {other:?}"),
            }
        }
    }

    #[test]
    fn arbitrary_bytes_never_panic() {
        let r = resolver(&[]);
        let alphabet = ["%", "2F", "3A", "/", ":", "http", "s", "@", "[", "]", "?", "#", ".", "0", "\u{e9}", "%00", " "];
        // every ordered pair and triple of fragments
        for a in alphabet {
            for b in alphabet {
                for c in alphabet {
                    let path = format!("/proxy/{a}{b}{c}");
                    if let Ok(target) = r.resolve(&path, Some("x=1")) {
                        assert!(matches!(target.scheme(), "http" | "https"));
                        assert!(!target.host().is_empty());
                    }
                }
            }
        }
    }

    #[test]
    fn loopback_and_link_local_are_forbidden() {
        let r = resolver(&[]);
        for input in [
            "/proxy/http%3A%2F%2F127.0.0.1%2F",
            "/proxy/http/127.0.0.1:8080/x",
            "/proxy/http%3A%2F%2F2130706433%2F",
            "/proxy/http%3A%2F%2F0x7f.1%2F",
            "/proxy/http%3A%2F%2F%5B%3A%3A1%5D%2F",
            "/proxy/http%3A%2F%2F169.254.169.254%2Flatest%2Fmeta-data",
            "/proxy/http%3A%2F%2F%5Bfe80%3A%3A1%5D%2F",
            "/proxy/http%3A%2F%2F224.0.0.251%2F",
            "/proxy/http%3A%2F%2Flocalhost%3A9000%2F",
            "/proxy/http%3A%2F%2F%5B%3A%3Affff%3A127.0.0.1%5D%2F",
        ] {
            match r.resolve(input, None) {
                Err(TargetError::TargetForbidden(_)) => {}
                other => panic!("{input}: expected TargetForbidden, got {other:?}"),
            }
        }
    }

    #[test]
    fn allow_list_opens_loopback() {
        let r = resolver(&["127.0.0.1", "localhost"]);
        assert!(r.resolve("/proxy/http%3A%2F%2F127.0.0.1%3A8080%2Fok", None).is_ok());
        assert!(r.resolve("/proxy/http/localhost/ok", None).is_ok());
        assert!(matches!(
            r.resolve("/proxy/http%3A%2F%2F169.254.169.254%2F", None),
            Err(TargetError::TargetForbidden(_))
        ));
    }
}
