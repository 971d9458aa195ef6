//! In-memory stand-ins for the network collaborators, for unit tests.

use crate::capture::{
    CaptureConfig, CaptureDevice, CaptureHandle, Datalink, FrameSink, FrameSource, LinkInterface,
};
use crate::error::{ScanError, ScanResult};
use crate::scanner::{EchoProber, ReverseResolver};
use async_trait::async_trait;
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::MutableIpv4Packet;
use pnet::packet::Packet;
use pnet::util::MacAddr;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An Ethernet frame carrying an ARP reply.
pub fn build_arp_reply(
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> Vec<u8> {
    let mut buffer = vec![0u8; 42];
    {
        let mut ethernet = MutableEthernetPacket::new(&mut buffer[..14]).unwrap();
        ethernet.set_destination(target_mac);
        ethernet.set_source(sender_mac);
        ethernet.set_ethertype(EtherTypes::Arp);
    }
    {
        let mut arp = MutableArpPacket::new(&mut buffer[14..]).unwrap();
        arp.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp.set_protocol_type(EtherTypes::Ipv4);
        arp.set_hw_addr_len(6);
        arp.set_proto_addr_len(4);
        arp.set_operation(ArpOperations::Reply);
        arp.set_sender_hw_addr(sender_mac);
        arp.set_sender_proto_addr(sender_ip);
        arp.set_target_hw_addr(target_mac);
        arp.set_target_proto_addr(target_ip);
    }
    buffer
}

/// An Ethernet frame carrying a bare IPv4/TCP header from `src` to `dst`.
pub fn ipv4_frame(src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
    let mut buffer = vec![0u8; 34];
    {
        let mut ethernet = MutableEthernetPacket::new(&mut buffer[..14]).unwrap();
        ethernet.set_destination(MacAddr::new(2, 0, 0, 0, 0, 5));
        ethernet.set_source(MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01));
        ethernet.set_ethertype(EtherTypes::Ipv4);
    }
    {
        let mut ipv4 = MutableIpv4Packet::new(&mut buffer[14..]).unwrap();
        ipv4.set_version(4);
        ipv4.set_header_length(5);
        ipv4.set_total_length(20);
        ipv4.set_ttl(64);
        ipv4.set_next_level_protocol(IpNextHeaderProtocols::Tcp);
        ipv4.set_source(src);
        ipv4.set_destination(dst);
    }
    buffer
}

/// Target address of an ARP request frame.
fn arp_request_target(frame: &[u8]) -> Option<(Ipv4Addr, MacAddr, Ipv4Addr)> {
    let ethernet = EthernetPacket::new(frame)?;
    if ethernet.get_ethertype() != EtherTypes::Arp {
        return None;
    }
    let arp = ArpPacket::new(ethernet.payload())?;
    (arp.get_operation() == ArpOperations::Request).then(|| {
        (
            arp.get_target_proto_addr(),
            arp.get_sender_hw_addr(),
            arp.get_sender_proto_addr(),
        )
    })
}

#[derive(Clone, Default)]
struct LinkBehavior {
    responders: HashMap<Ipv4Addr, MacAddr>,
    failing: HashSet<Ipv4Addr>,
    write_delay: Duration,
}

#[derive(Default)]
struct LinkState {
    sent: Mutex<Vec<Vec<u8>>>,
    inbound: Mutex<VecDeque<Vec<u8>>>,
    opened: AtomicUsize,
    live: AtomicUsize,
    last_closed: Mutex<Option<Arc<AtomicBool>>>,
}

/// A scripted network segment.
///
/// ARP requests aimed at a responder produce a reply on the capture;
/// unsolicited frames are queued when a capture is opened.
#[derive(Default)]
pub struct FakeDatalink {
    interfaces: Vec<LinkInterface>,
    devices: Vec<CaptureDevice>,
    unsolicited: Vec<Vec<u8>>,
    behavior: LinkBehavior,
    fail_open: bool,
    state: Arc<LinkState>,
}

impl FakeDatalink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interface(mut self, iface: LinkInterface) -> Self {
        self.interfaces.push(iface);
        self
    }

    pub fn with_device(mut self, device: CaptureDevice) -> Self {
        self.devices.push(device);
        self
    }

    pub fn with_responder(mut self, ip: Ipv4Addr, mac: MacAddr) -> Self {
        self.behavior.responders.insert(ip, mac);
        self
    }

    pub fn with_unsolicited(mut self, frame: Vec<u8>) -> Self {
        self.unsolicited.push(frame);
        self
    }

    pub fn failing_writes_to(mut self, ip: Ipv4Addr) -> Self {
        self.behavior.failing.insert(ip);
        self
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.behavior.write_delay = delay;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Every frame written, failed writes included.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.state.sent.lock().unwrap().clone()
    }

    /// Target addresses of the ARP requests written.
    pub fn requested_targets(&self) -> Vec<Ipv4Addr> {
        self.sent_frames()
            .iter()
            .filter_map(|f| arp_request_target(f))
            .map(|(target, _, _)| target)
            .collect()
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Captures opened and not yet closed.
    pub fn live_handles(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn last_handle_closed(&self) -> bool {
        self.state
            .last_closed
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|closed| closed.load(Ordering::SeqCst))
    }
}

impl Datalink for FakeDatalink {
    fn interfaces(&self) -> ScanResult<Vec<LinkInterface>> {
        Ok(self.interfaces.clone())
    }

    fn devices(&self) -> ScanResult<Vec<CaptureDevice>> {
        Ok(self.devices.clone())
    }

    fn open(&self, device: &str, _config: CaptureConfig) -> ScanResult<CaptureHandle> {
        if self.fail_open {
            return Err(ScanError::CaptureOpen {
                device: device.to_string(),
                reason: "scripted failure".to_string(),
            });
        }

        self.state.opened.fetch_add(1, Ordering::SeqCst);
        self.state.live.fetch_add(1, Ordering::SeqCst);
        self.state
            .inbound
            .lock()
            .unwrap()
            .extend(self.unsolicited.iter().cloned());

        let closed = Arc::new(AtomicBool::new(false));
        *self.state.last_closed.lock().unwrap() = Some(Arc::clone(&closed));

        let sink = FakeSink {
            behavior: self.behavior.clone(),
            state: Arc::clone(&self.state),
        };
        let source = FakeSource {
            state: Arc::clone(&self.state),
            closed,
        };
        Ok(CaptureHandle::new(device, Box::new(sink), Box::new(source)))
    }
}

struct FakeSink {
    behavior: LinkBehavior,
    state: Arc<LinkState>,
}

impl FrameSink for FakeSink {
    fn send(&mut self, frame: &[u8]) -> ScanResult<()> {
        if !self.behavior.write_delay.is_zero() {
            std::thread::sleep(self.behavior.write_delay);
        }
        self.state.sent.lock().unwrap().push(frame.to_vec());

        let Some((target, sender_mac, sender_ip)) = arp_request_target(frame) else {
            return Ok(());
        };
        if self.behavior.failing.contains(&target) {
            return Err(ScanError::RawSocketError(format!("scripted failure for {}", target)));
        }
        if let Some(mac) = self.behavior.responders.get(&target) {
            let reply = build_arp_reply(*mac, target, sender_mac, sender_ip);
            self.state.inbound.lock().unwrap().push_back(reply);
        }
        Ok(())
    }
}

struct FakeSource {
    state: Arc<LinkState>,
    closed: Arc<AtomicBool>,
}

impl FrameSource for FakeSource {
    fn next_frame(&mut self) -> ScanResult<Option<Vec<u8>>> {
        let frame = self.state.inbound.lock().unwrap().pop_front();
        if frame.is_none() {
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(frame)
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.state.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Echo prober answering for a fixed set of hosts.
#[derive(Default)]
pub struct FakeProber {
    alive: HashMap<Ipv4Addr, Duration>,
    delay: Duration,
    calls: Mutex<Vec<Ipv4Addr>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// `ip` answers every echo after `rtt`.
    pub fn alive(mut self, ip: Ipv4Addr, rtt: Duration) -> Self {
        self.alive.insert(ip, rtt);
        self
    }

    /// Every echo takes at least `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Targets in call order.
    pub fn probed(&self) -> Vec<Ipv4Addr> {
        self.calls.lock().unwrap().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EchoProber for FakeProber {
    async fn echo(&self, target: Ipv4Addr, _seq: u16, _timeout: Duration) -> ScanResult<Duration> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(target);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.alive.get(&target).copied().ok_or(ScanError::Timeout)
    }
}

/// PTR answers from a table.
#[derive(Default)]
pub struct FakeResolver {
    names: HashMap<Ipv4Addr, Vec<String>>,
    failures: HashMap<Ipv4Addr, String>,
    slow: HashMap<Ipv4Addr, Duration>,
    lookups: Mutex<Vec<Ipv4Addr>>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names(mut self, ip: Ipv4Addr, names: &[&str]) -> Self {
        self.names.insert(ip, names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_failure(mut self, ip: Ipv4Addr, message: &str) -> Self {
        self.failures.insert(ip, message.to_string());
        self
    }

    pub fn with_slow(mut self, ip: Ipv4Addr, delay: Duration) -> Self {
        self.slow.insert(ip, delay);
        self
    }

    pub fn lookups(&self) -> Vec<Ipv4Addr> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReverseResolver for FakeResolver {
    async fn reverse(&self, ip: Ipv4Addr) -> ScanResult<Vec<String>> {
        self.lookups.lock().unwrap().push(ip);

        if let Some(delay) = self.slow.get(&ip) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(message) = self.failures.get(&ip) {
            return Err(ScanError::DnsResolution(message.clone()));
        }
        Ok(self.names.get(&ip).cloned().unwrap_or_default())
    }
}
