//! Route prefix matching.
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - The prefix only matches when followed by a `/` separator
//! - Matching runs on the raw (still percent-encoded) path

/// Matches `/<prefix>/` at the start of a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMatcher {
    /// Normalized form, always `/<prefix>/`.
    prefix: String,
}

impl PrefixMatcher {
    /// Create a new prefix matcher. Surrounding slashes are ignored.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: format!("/{}/", prefix.trim().trim_matches('/')),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    /// Return what follows the prefix and its separator.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix(self.prefix.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }
}
