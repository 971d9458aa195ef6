//! Reverse-DNS enrichment of discovered hosts.

use super::gate::Gate;
use crate::error::{ScanError, ScanResult};
use crate::storage::{HostnameResult, ScanSession};
use async_trait::async_trait;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::TokioAsyncResolver;

/// Lookup concurrency used when the caller passes 0.
pub const FALLBACK_CONCURRENCY: usize = 10;

/// Answers PTR queries.
#[async_trait]
pub trait ReverseResolver: Send + Sync {
    /// PTR names for `ip`, as returned by the server.
    async fn reverse(&self, ip: Ipv4Addr) -> ScanResult<Vec<String>>;
}

/// Resolver using the host's DNS configuration.
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
}

impl SystemResolver {
    /// Read the system resolver configuration, falling back to the
    /// library defaults when it cannot be loaded.
    pub fn new() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            warn!("system DNS configuration unavailable ({}), using defaults", e);
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReverseResolver for SystemResolver {
    async fn reverse(&self, ip: Ipv4Addr) -> ScanResult<Vec<String>> {
        match self.resolver.reverse_lookup(IpAddr::V4(ip)).await {
            Ok(lookup) => Ok(lookup.iter().map(|ptr| ptr.to_string()).collect()),
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(ScanError::DnsResolution(e.to_string())),
        }
    }
}

/// Strip a single trailing root dot.
fn trim_root(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_string()
}

async fn lookup_one(resolver: &dyn ReverseResolver, ip: Ipv4Addr, timeout: Duration) -> HostnameResult {
    let mut result = HostnameResult::new(ip);

    match tokio::time::timeout(timeout, resolver.reverse(ip)).await {
        Ok(Ok(names)) => {
            result.ptr_names = names.iter().map(|n| trim_root(n)).collect();
            result.fqdn = result.ptr_names.first().cloned().unwrap_or_default();
            if result.is_resolved() {
                info!("[+] {} -> {}", ip, result.fqdn);
            } else {
                debug!("{}: no PTR records", ip);
            }
        }
        Ok(Err(e)) => {
            debug!("[-] {}: {}", ip, e);
            result.error = e.to_string();
        }
        Err(_) => {
            debug!("[-] {}: lookup timed out after {:?}", ip, timeout);
            result.error = format!("lookup timed out after {:?}", timeout);
        }
    }

    result
}

/// Reverse-resolve `ips`, one lookup per distinct address.
///
/// Results are stored in the session and returned in completion order.
pub async fn resolve_hostnames(
    session: &ScanSession,
    resolver: Arc<dyn ReverseResolver>,
    ips: &[Ipv4Addr],
    concurrency: usize,
    timeout: Duration,
) -> Vec<HostnameResult> {
    let mut seen = HashSet::new();
    let unique: Vec<Ipv4Addr> = ips.iter().copied().filter(|ip| seen.insert(*ip)).collect();
    if unique.is_empty() {
        return Vec::new();
    }

    let concurrency = if concurrency == 0 { FALLBACK_CONCURRENCY } else { concurrency };
    info!("Resolving {} hostnames ({} concurrent)", unique.len(), concurrency);

    let gate = Gate::new(concurrency);
    let (tx, mut rx) = mpsc::channel(unique.len());

    for ip in unique {
        let tx = tx.clone();
        let gate = gate.clone();
        let resolver = Arc::clone(&resolver);
        tokio::spawn(async move {
            let Ok(_permit) = gate.acquire().await else {
                return;
            };
            let result = lookup_one(resolver.as_ref(), ip, timeout).await;
            // The receiver only goes away if the caller was dropped.
            let _ = tx.send(result).await;
        });
    }
    drop(tx);

    let mut results = Vec::new();
    while let Some(result) = rx.recv().await {
        session.hostnames.insert(result.ip, result.clone());
        results.push(result);
    }

    info!(
        "Hostname resolution complete: {}/{} resolved",
        results.iter().filter(|r| r.is_resolved()).count(),
        results.len()
    );
    results
}

/// Resolve every address the session's active scans discovered.
pub async fn discover_hostnames(
    session: &ScanSession,
    resolver: Arc<dyn ReverseResolver>,
    concurrency: usize,
    timeout: Duration,
) -> Vec<HostnameResult> {
    let ips = session.discovered_ips();
    resolve_hostnames(session, resolver, &ips, concurrency, timeout).await
}
