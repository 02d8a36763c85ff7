//! Policy-aware DNS resolution for outbound connections.
//!
//! Hostname targets pass the literal-address checks in routing untouched;
//! this resolver applies the same address policy to whatever the name
//! resolves to, right before the connector dials it.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyper_util::client::legacy::connect::dns::{GaiResolver, Name};
use thiserror::Error;
use tower::Service;

use crate::security::TargetPolicy;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to resolve {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("{host} resolves only to addresses outside the proxy policy")]
    Forbidden { host: String },
}

/// System resolver that drops addresses the policy refuses.
#[derive(Debug, Clone)]
pub struct GuardedResolver {
    inner: GaiResolver,
    policy: Arc<TargetPolicy>,
}

impl GuardedResolver {
    pub fn new(policy: Arc<TargetPolicy>) -> Self {
        Self {
            inner: GaiResolver::new(),
            policy,
        }
    }
}

impl Service<Name> for GuardedResolver {
    type Response = std::vec::IntoIter<SocketAddr>;
    type Error = ResolveError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(|source| ResolveError::Lookup {
                host: String::new(),
                source,
            })
    }

    fn call(&mut self, name: Name) -> Self::Future {
        let host = name.as_str().to_owned();
        let policy = Arc::clone(&self.policy);
        let lookup = self.inner.call(name);

        Box::pin(async move {
            let addrs = lookup.await.map_err(|source| ResolveError::Lookup {
                host: host.clone(),
                source,
            })?;

            let (permitted, refused): (Vec<SocketAddr>, Vec<SocketAddr>) =
                addrs.partition(|addr| policy.permits_resolved(&host, addr.ip()));

            if !refused.is_empty() {
                tracing::debug!(
                    host = %host,
                    refused = refused.len(),
                    permitted = permitted.len(),
                    "Dropped resolved addresses outside policy"
                );
            }

            if permitted.is_empty() {
                return Err(ResolveError::Forbidden { host });
            }
            Ok(permitted.into_iter())
        })
    }
}
