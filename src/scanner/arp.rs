//! Active ARP scanning.
//!
//! Broadcasts an ARP who-has for every host address of the target range and
//! records each reply captured on the interface. A single reader runs for the
//! whole scan; writers share the capture handle and are bounded by the
//! concurrency gate.
//!
//! # Privileges Required
//!
//! Opening a promiscuous capture needs root or `CAP_NET_RAW`.

use super::gate::Gate;
use super::rate_limiter::RateLimiter;
use super::ScanOptions;
use crate::capture::{CaptureConfig, CaptureHandle, Datalink};
use crate::error::{ScanError, ScanResult};
use crate::storage::{ArpResult, ArpStore, ScanSession};
use crate::types::{enumerate_hosts, is_subnet_within, subnet, TargetSpec};
use ipnetwork::{IpNetwork, Ipv4Network};
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::Packet;
use pnet::util::MacAddr;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long to keep listening for late replies after the last request.
pub const ARP_GRACE: Duration = Duration::from_secs(3);

const ETHERNET_HEADER_LEN: usize = 14;
const ARP_PACKET_LEN: usize = 28;
/// Size of an ARP request frame.
pub const ARP_FRAME_LEN: usize = ETHERNET_HEADER_LEN + ARP_PACKET_LEN;

/// Everything an ARP scan needs, resolved and validated up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPlan {
    pub interface: String,
    pub mac: MacAddr,
    /// Interface network; `ip()` is the interface's own address.
    pub network: Ipv4Network,
    /// Range to probe, within `network`.
    pub target: Ipv4Network,
    /// Capture device carrying the interface address.
    pub device: String,
}

impl ArpPlan {
    pub fn source_ip(&self) -> Ipv4Addr {
        self.network.ip()
    }

    /// Addresses that will receive a request.
    pub fn hosts(&self) -> Vec<Ipv4Addr> {
        enumerate_hosts(&self.target, &self.network)
    }
}

/// Validate an ARP scan of `interface` and resolve what it will touch.
///
/// Nothing is sent. Checks run in a fixed order so the operator sees the
/// most fundamental problem first.
pub fn plan_arp_scan(
    datalink: &dyn Datalink,
    interface: &str,
    target: Option<&str>,
) -> ScanResult<ArpPlan> {
    let iface = datalink
        .interfaces()?
        .into_iter()
        .find(|i| i.name == interface)
        .ok_or_else(|| ScanError::InterfaceNotFound(interface.to_string()))?;

    let network = iface
        .first_ipv4()
        .ok_or_else(|| ScanError::NoIpv4Address(interface.to_string()))?;

    if network.ip().is_loopback() {
        return Err(ScanError::LoopbackRejected {
            interface: interface.to_string(),
            address: network.ip().to_string(),
        });
    }

    if subnet::is_network_too_large(&network) {
        return Err(ScanError::NetworkTooLarge {
            interface: interface.to_string(),
            network: subnet::align_to_network(&network).to_string(),
        });
    }

    let target = match target {
        Some(range) => {
            let requested = TargetSpec::parse_range(range)?;
            if !is_subnet_within(&IpNetwork::V4(network), &IpNetwork::V4(requested)) {
                return Err(ScanError::TargetOutsideInterfaceNetwork {
                    target: subnet::align_to_network(&requested).to_string(),
                    network: subnet::align_to_network(&network).to_string(),
                });
            }
            requested
        }
        None => network,
    };

    let mac = iface.mac.filter(|mac| *mac != MacAddr::zero()).ok_or_else(|| {
        ScanError::InvalidConfig(format!("interface {} has no hardware address", interface))
    })?;

    let device = datalink
        .devices()?
        .into_iter()
        .find(|d| d.has_address(network.ip()))
        .ok_or_else(|| ScanError::DeviceNotFound {
            interface: interface.to_string(),
            address: network.ip().to_string(),
        })?;

    Ok(ArpPlan {
        interface: iface.name,
        mac,
        network,
        target,
        device: device.name,
    })
}

/// Build a broadcast who-has for `target_ip`.
pub fn build_arp_request(
    source_mac: MacAddr,
    source_ip: Ipv4Addr,
    target_ip: Ipv4Addr,
) -> ScanResult<[u8; ARP_FRAME_LEN]> {
    let mut buffer = [0u8; ARP_FRAME_LEN];

    {
        let mut ethernet = MutableEthernetPacket::new(&mut buffer[..ETHERNET_HEADER_LEN])
            .ok_or_else(|| ScanError::InvalidPacket("ethernet buffer too small".to_string()))?;
        ethernet.set_destination(MacAddr::broadcast());
        ethernet.set_source(source_mac);
        ethernet.set_ethertype(EtherTypes::Arp);
    }

    {
        let mut arp = MutableArpPacket::new(&mut buffer[ETHERNET_HEADER_LEN..])
            .ok_or_else(|| ScanError::InvalidPacket("ARP buffer too small".to_string()))?;
        arp.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp.set_protocol_type(EtherTypes::Ipv4);
        arp.set_hw_addr_len(6);
        arp.set_proto_addr_len(4);
        arp.set_operation(ArpOperations::Request);
        arp.set_sender_hw_addr(source_mac);
        arp.set_sender_proto_addr(source_ip);
        arp.set_target_hw_addr(MacAddr::zero());
        arp.set_target_proto_addr(target_ip);
    }

    Ok(buffer)
}

/// Extract the sender of an ARP reply.
///
/// Returns `None` for anything that is not a reply, and for replies whose
/// sender is `own_mac` (our own traffic looped back by the capture).
pub fn parse_arp_reply(frame: &[u8], own_mac: MacAddr) -> Option<(Ipv4Addr, MacAddr)> {
    let ethernet = EthernetPacket::new(frame)?;
    if ethernet.get_ethertype() != EtherTypes::Arp {
        return None;
    }

    let arp = ArpPacket::new(ethernet.payload())?;
    if arp.get_operation() != ArpOperations::Reply {
        return None;
    }

    let sender = arp.get_sender_hw_addr();
    if sender == own_mac {
        return None;
    }

    Some((arp.get_sender_proto_addr(), sender))
}

/// Record one reply. Returns the record if it was new.
fn record_reply(store: &ArpStore, interface: &str, ip: Ipv4Addr, mac: MacAddr) -> Option<ArpResult> {
    let result = ArpResult::new(interface, ip, mac.to_string());
    if store.insert(result.key(), result.clone()) {
        info!("IP {} is at {} from interface {}", ip, mac, interface);
        Some(result)
    } else {
        debug!("Duplicate detected: {} is at {} on {}", ip, mac, interface);
        None
    }
}

/// Read replies until `stop` fires or the capture goes away.
fn capture_replies(
    handle: &CaptureHandle,
    interface: &str,
    own_mac: MacAddr,
    store: &ArpStore,
    stop: &CancellationToken,
) -> Vec<ArpResult> {
    let mut found = Vec::new();

    while !stop.is_cancelled() {
        match handle.read() {
            Ok(Some(frame)) => {
                if let Some((ip, mac)) = parse_arp_reply(&frame, own_mac) {
                    found.extend(record_reply(store, interface, ip, mac));
                }
            }
            Ok(None) => {}
            Err(ScanError::CaptureClosed) => break,
            Err(e) => {
                warn!("ARP capture on {} failed: {}", interface, e);
                break;
            }
        }
    }

    found
}

/// Send one request per host, at most `gate.capacity()` at a time.
///
/// Every dispatched write is awaited; the first failure is returned.
async fn send_requests(
    handle: &Arc<CaptureHandle>,
    plan: &ArpPlan,
    hosts: Vec<Ipv4Addr>,
    gate: &Gate,
    limiter: Option<&RateLimiter>,
) -> Option<ScanError> {
    let mut writers = JoinSet::new();
    let mut first_error = None;

    let reap = |joined: Result<ScanResult<()>, JoinError>, first_error: &mut Option<ScanError>| {
        if let Err(e) = joined.map_err(ScanError::from).and_then(|r| r) {
            debug!("ARP request failed: {}", e);
            first_error.get_or_insert(e);
        }
    };

    for ip in hosts {
        let permit = match gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                first_error = Some(e);
                break;
            }
        };
        if let Some(limiter) = limiter {
            limiter.wait().await;
        }

        while let Some(joined) = writers.try_join_next() {
            reap(joined, &mut first_error);
        }

        let handle = Arc::clone(handle);
        let (mac, source) = (plan.mac, plan.source_ip());
        writers.spawn_blocking(move || {
            let _permit = permit;
            let frame = build_arp_request(mac, source, ip)?;
            handle.write(&frame)
        });
    }

    while let Some(joined) = writers.join_next().await {
        reap(joined, &mut first_error);
    }

    first_error
}

/// Run an ARP scan of `interface`, optionally restricted to `target`.
///
/// Returns the replies first seen during this scan. When a write fails the
/// scan still waits for every dispatched write, then returns the first
/// failure; replies captured before that remain in the session.
pub async fn arp_scan(
    session: &ScanSession,
    datalink: Arc<dyn Datalink>,
    interface: &str,
    target: Option<&str>,
    options: &ScanOptions,
) -> ScanResult<Vec<ArpResult>> {
    options.validate()?;
    let plan = plan_arp_scan(datalink.as_ref(), interface, target)?;
    let hosts = plan.hosts();

    info!(
        "ARP scanning {} ({} hosts) on {} from {} [{}]",
        subnet::align_to_network(&plan.target),
        hosts.len(),
        plan.interface,
        plan.source_ip(),
        plan.mac
    );

    let handle = Arc::new(datalink.open(&plan.device, CaptureConfig::promiscuous())?);
    let stop = CancellationToken::new();

    let reader = tokio::task::spawn_blocking({
        let handle = Arc::clone(&handle);
        let store = Arc::clone(&session.arp);
        let stop = stop.clone();
        let interface = plan.interface.clone();
        let own_mac = plan.mac;
        move || capture_replies(&handle, &interface, own_mac, &store, &stop)
    });

    let gate = Gate::new(options.concurrency);
    let limiter = RateLimiter::per_second(options.rate_limit);
    let first_error = send_requests(&handle, &plan, hosts, &gate, limiter.as_ref()).await;

    if first_error.is_none() {
        tokio::time::sleep(options.arp_grace).await;
    }

    stop.cancel();
    let found = reader.await;
    handle.close();

    if let Some(e) = first_error {
        return Err(e);
    }
    let found = found?;
    info!("ARP scan of {} complete: {} hosts answered", plan.interface, found.len());
    Ok(found)
}
