//! Scanner module - coordinates the discovery techniques.
//!
//! Active discovery probes a range with ARP requests (same segment) or ICMP
//! echoes (routed). Passive discovery only listens. Either can be followed by
//! reverse-DNS enrichment. [`Discovery`] wires the scanners to their
//! network collaborators and is the entry point used by the CLI.

pub mod arp;
pub mod gate;
pub mod icmp;
pub mod passive;
pub mod ping;
pub mod rate_limiter;
pub mod resolver;

use crate::capture::{Datalink, LinkInterface, PnetDatalink};
use crate::error::{ScanError, ScanResult};
use crate::storage::{ArpResult, HostnameResult, PassiveResult, ScanSession};
use crate::types::ScanTarget;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use arp::{arp_scan, plan_arp_scan, ArpPlan, ARP_GRACE};
pub use icmp::{icmp_scan, IcmpOutcome, PingStats};
pub use passive::passive_capture;
pub use ping::{EchoProber, SurgePinger};
pub use resolver::{discover_hostnames, resolve_hostnames, ReverseResolver, SystemResolver};

/// Default number of probes in flight.
pub const DEFAULT_CONCURRENCY: usize = 50;
/// Default per-probe timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);
/// Gap between successive echoes to the same host.
pub const PROBE_INTERVAL: Duration = Duration::from_millis(100);
/// Default reverse-DNS concurrency after an active scan.
pub const DEFAULT_DNS_CONCURRENCY: usize = 20;
/// Upper bound on echoes per host; sequence numbers are 16 bits.
pub const MAX_PROBE_COUNT: u32 = u16::MAX as u32;

/// Active discovery technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// ARP who-has on the local segment.
    Arp,
    /// ICMP echo requests.
    Icmp,
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanMode::Arp => write!(f, "ARP"),
            ScanMode::Icmp => write!(f, "ICMP"),
        }
    }
}

/// Tuning knobs shared by the scanners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Maximum probes in flight.
    pub concurrency: usize,
    /// Per-probe timeout.
    pub timeout: Duration,
    /// Echoes per host.
    pub count: u32,
    pub probe_interval: Duration,
    /// Listening window after the last ARP request.
    pub arp_grace: Duration,
    /// Probes per second, 0 for unlimited.
    pub rate_limit: u32,
    pub dns_concurrency: usize,
    pub dns_timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            count: 1,
            probe_interval: PROBE_INTERVAL,
            arp_grace: ARP_GRACE,
            rate_limit: 0,
            dns_concurrency: DEFAULT_DNS_CONCURRENCY,
            dns_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ScanOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_arp_grace(mut self, grace: Duration) -> Self {
        self.arp_grace = grace;
        self
    }

    pub fn with_rate_limit(mut self, rate: u32) -> Self {
        self.rate_limit = rate;
        self
    }

    pub fn with_dns(mut self, concurrency: usize, timeout: Duration) -> Self {
        self.dns_concurrency = concurrency;
        self.dns_timeout = timeout;
        self
    }

    /// Reject settings no scan can run with.
    pub fn validate(&self) -> ScanResult<()> {
        if self.concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.count == 0 {
            return Err(ScanError::InvalidConfig(
                "probe count must be at least 1".to_string(),
            ));
        }
        if self.count > MAX_PROBE_COUNT {
            return Err(ScanError::InvalidConfig(format!(
                "probe count must be at most {}",
                MAX_PROBE_COUNT
            )));
        }
        Ok(())
    }
}

/// One active scan to run.
#[derive(Debug, Clone)]
pub struct ActiveRequest {
    pub target: ScanTarget,
    pub mode: ScanMode,
    pub options: ScanOptions,
    /// Reverse-resolve discovered hosts afterwards.
    pub resolve_hostnames: bool,
}

impl ActiveRequest {
    pub fn new(target: ScanTarget, mode: ScanMode) -> Self {
        Self {
            target,
            mode,
            options: ScanOptions::default(),
            resolve_hostnames: true,
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_resolve(mut self, resolve: bool) -> Self {
        self.resolve_hostnames = resolve;
        self
    }
}

/// Outcome of an active scan.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveReport {
    pub mode: ScanMode,
    pub interface: String,
    /// Range or address actually probed.
    pub target: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arp: Vec<ArpResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp: Option<IcmpOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<HostnameResult>,
    pub duration_ms: u64,
}

impl ActiveReport {
    /// Number of hosts that answered.
    pub fn hosts_found(&self) -> usize {
        match &self.icmp {
            Some(outcome) => outcome.results().len(),
            None => self.arp.len(),
        }
    }
}

/// Outcome of a passive capture.
#[derive(Debug, Clone, Serialize)]
pub struct PassiveReport {
    pub interface: String,
    pub peers: Vec<PassiveResult>,
    pub duration_ms: u64,
}

/// Entry point tying the scanners to their collaborators.
pub struct Discovery {
    datalink: Arc<dyn Datalink>,
    prober: Option<Arc<dyn EchoProber>>,
    resolver: Arc<dyn ReverseResolver>,
}

impl Discovery {
    pub fn new(
        datalink: Arc<dyn Datalink>,
        prober: Arc<dyn EchoProber>,
        resolver: Arc<dyn ReverseResolver>,
    ) -> Self {
        Self {
            datalink,
            prober: Some(prober),
            resolver,
        }
    }

    /// Production wiring.
    ///
    /// The ICMP socket is opened on the first ICMP scan, so ARP and passive
    /// scans do not need ICMP permissions.
    pub fn system() -> Self {
        Self {
            datalink: Arc::new(PnetDatalink::new()),
            prober: None,
            resolver: Arc::new(SystemResolver::new()),
        }
    }

    fn prober(&self) -> ScanResult<Arc<dyn EchoProber>> {
        match &self.prober {
            Some(prober) => Ok(Arc::clone(prober)),
            None => Ok(Arc::new(SurgePinger::new()?)),
        }
    }

    /// Interfaces known to the datalink layer.
    pub fn interfaces(&self) -> ScanResult<Vec<LinkInterface>> {
        self.datalink.interfaces()
    }

    /// The CIDR of `interface`'s first IPv4 network, with its host bits.
    fn interface_cidr(&self, interface: &str) -> ScanResult<String> {
        let iface = self
            .datalink
            .interfaces()?
            .into_iter()
            .find(|i| i.name == interface)
            .ok_or_else(|| ScanError::InterfaceNotFound(interface.to_string()))?;

        iface
            .first_ipv4()
            .map(|net| net.to_string())
            .ok_or_else(|| ScanError::NoIpv4Address(interface.to_string()))
    }

    /// Run one active scan, then reverse-resolve what it found if requested.
    pub async fn run_active(
        &self,
        session: &ScanSession,
        request: &ActiveRequest,
        cancel: &CancellationToken,
    ) -> ScanResult<ActiveReport> {
        let start = Instant::now();
        let options = &request.options;
        options.validate()?;

        let interface = request.target.interface.clone();
        let range = request.target.range.as_deref();

        let (target, arp, icmp) = match request.mode {
            ScanMode::Arp => {
                let found = arp_scan(session, Arc::clone(&self.datalink), &interface, range, options).await?;
                let target = range.map(str::to_string).unwrap_or_else(|| interface.clone());
                (target, found, None)
            }
            ScanMode::Icmp => {
                let target = match range {
                    Some(range) => range.trim().to_string(),
                    None => self.interface_cidr(&interface)?,
                };
                let outcome = icmp_scan(session, self.prober()?, &target, options, cancel).await?;
                (target, Vec::new(), Some(outcome))
            }
        };

        let hostnames = if request.resolve_hostnames && !cancel.is_cancelled() {
            self.discover(session, options).await
        } else {
            Vec::new()
        };

        Ok(ActiveReport {
            mode: request.mode,
            interface,
            target,
            arp,
            icmp,
            hostnames,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Listen on `interface` for `duration`.
    pub async fn run_passive(
        &self,
        session: &ScanSession,
        interface: &str,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> ScanResult<PassiveReport> {
        let start = Instant::now();
        let peers = passive_capture(session, Arc::clone(&self.datalink), interface, duration, cancel).await?;

        Ok(PassiveReport {
            interface: interface.to_string(),
            peers,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Reverse-resolve `ips`.
    pub async fn resolve(
        &self,
        session: &ScanSession,
        ips: &[Ipv4Addr],
        options: &ScanOptions,
    ) -> Vec<HostnameResult> {
        resolve_hostnames(
            session,
            Arc::clone(&self.resolver),
            ips,
            options.dns_concurrency,
            options.dns_timeout,
        )
        .await
    }

    async fn discover(&self, session: &ScanSession, options: &ScanOptions) -> Vec<HostnameResult> {
        let ips = session.discovered_ips();
        if ips.is_empty() {
            info!("No hosts discovered; skipping hostname resolution");
            return Vec::new();
        }
        self.resolve(session, &ips, options).await
    }
}
