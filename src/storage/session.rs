//! Per-invocation scan session.
//!
//! A `ScanSession` owns one result store per scan kind. It is created by the
//! caller, passed by reference into each scanner, and read back once the
//! scans return. Independent sessions never share results.

use super::records::{ArpKey, ArpResult, HostnameResult, IcmpResult, PassiveResult};
use super::result_store::ResultStore;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;

pub type ArpStore = ResultStore<ArpKey, ArpResult>;
pub type IcmpStore = ResultStore<Ipv4Addr, IcmpResult>;
pub type PassiveStore = ResultStore<Ipv4Addr, PassiveResult>;
pub type HostnameStore = ResultStore<Ipv4Addr, HostnameResult>;

/// Result stores for one discovery run.
#[derive(Clone, Default)]
pub struct ScanSession {
    pub(crate) arp: Arc<ArpStore>,
    pub(crate) icmp: Arc<IcmpStore>,
    pub(crate) passive: Arc<PassiveStore>,
    pub(crate) hostnames: Arc<HostnameStore>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arp_results(&self) -> Vec<ArpResult> {
        self.arp.snapshot()
    }

    pub fn icmp_results(&self) -> Vec<IcmpResult> {
        self.icmp.snapshot()
    }

    pub fn passive_results(&self) -> Vec<PassiveResult> {
        self.passive.snapshot()
    }

    pub fn hostname_results(&self) -> Vec<HostnameResult> {
        self.hostnames.snapshot()
    }

    /// Distinct addresses found by the active scanners, ARP first.
    pub fn discovered_ips(&self) -> Vec<Ipv4Addr> {
        let mut seen = HashSet::new();
        self.arp
            .snapshot()
            .into_iter()
            .map(|r| r.ip)
            .chain(self.icmp.snapshot().into_iter().map(|r| r.ip))
            .filter(|ip| seen.insert(*ip))
            .collect()
    }
}
