//! Upstream address resolution, cached for the process lifetime.

use std::net::SocketAddr;

use dashmap::DashMap;

use super::UpstreamError;

/// Resolves `host:port` pairs once and remembers the first address.
#[derive(Default)]
pub struct Resolver {
    cache: DashMap<(String, u16), SocketAddr>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(&self, host: &str, port: u16) -> Result<SocketAddr, UpstreamError> {
        let cache_key = (host.to_string(), port);
        if let Some(addr) = self.cache.get(&cache_key) {
            return Ok(*addr);
        }

        let addr = tokio::net::lookup_host((host, port))
            .await
            .map_err(|_| UpstreamError::Resolve(host.to_string()))?
            .next()
            .ok_or_else(|| UpstreamError::Resolve(host.to_string()))?;

        tracing::debug!(host = %host, port = port, addr = %addr, "resolved upstream host");
        self.cache.insert(cache_key, addr);
        Ok(addr)
    }
}
