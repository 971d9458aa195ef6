//! Link-layer access: interface enumeration and live capture handles.
//!
//! The scanners never touch `pnet` directly. They go through the
//! [`Datalink`] trait so the same scan logic runs against the real network
//! ([`PnetDatalink`]) or against an in-memory fake in tests.

mod handle;
mod pnet_backend;

pub use handle::{CaptureHandle, FrameSink, FrameSource};
pub use pnet_backend::PnetDatalink;

use crate::error::ScanResult;
use ipnetwork::{IpNetwork, Ipv4Network};
use pnet::util::MacAddr;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// An OS network interface as seen by the scanners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkInterface {
    pub name: String,
    /// Hardware address, if the interface has one.
    #[serde(serialize_with = "serialize_mac")]
    pub mac: Option<MacAddr>,
    pub ips: Vec<IpNetwork>,
    pub is_up: bool,
    pub is_loopback: bool,
}

impl LinkInterface {
    /// The first IPv4 network bound to this interface.
    ///
    /// The returned network keeps the interface's own address in `ip()`.
    pub fn first_ipv4(&self) -> Option<Ipv4Network> {
        self.ips.iter().find_map(|net| match net {
            IpNetwork::V4(v4) => Some(*v4),
            IpNetwork::V6(_) => None,
        })
    }

    /// All non-loopback addresses bound to this interface.
    pub fn non_loopback_addrs(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.ips.iter().map(|net| net.ip()).filter(|ip| !ip.is_loopback())
    }
}

fn serialize_mac<S: serde::Serializer>(mac: &Option<MacAddr>, s: S) -> Result<S::Ok, S::Error> {
    match mac {
        Some(mac) => s.serialize_some(&mac.to_string()),
        None => s.serialize_none(),
    }
}

/// A device a live capture can be opened on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDevice {
    pub name: String,
    pub addresses: Vec<IpAddr>,
}

impl CaptureDevice {
    pub fn has_address(&self, addr: Ipv4Addr) -> bool {
        self.addresses.contains(&IpAddr::V4(addr))
    }
}

/// Options for opening a live capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Receive frames not addressed to this host.
    pub promiscuous: bool,
    /// How long a single read may block before reporting "nothing yet".
    pub read_timeout: Duration,
}

impl CaptureConfig {
    /// Promiscuous capture, used while waiting for ARP replies.
    pub fn promiscuous() -> Self {
        Self {
            promiscuous: true,
            read_timeout: Duration::from_millis(200),
        }
    }

    /// Non-promiscuous capture, used for passive observation.
    pub fn passive() -> Self {
        Self {
            promiscuous: false,
            read_timeout: Duration::from_millis(200),
        }
    }
}

/// Access to interfaces, capture devices and live captures.
pub trait Datalink: Send + Sync {
    /// Enumerate the host's network interfaces.
    fn interfaces(&self) -> ScanResult<Vec<LinkInterface>>;

    /// Enumerate devices a capture can be opened on.
    fn devices(&self) -> ScanResult<Vec<CaptureDevice>>;

    /// Open a live capture on `device`.
    fn open(&self, device: &str, config: CaptureConfig) -> ScanResult<CaptureHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_ipv4_skips_ipv6() {
        let iface = LinkInterface {
            name: "eth0".to_string(),
            mac: Some(MacAddr::new(0, 1, 2, 3, 4, 5)),
            ips: vec!["fe80::1/64".parse().unwrap(), "10.0.0.5/24".parse().unwrap()],
            is_up: true,
            is_loopback: false,
        };
        let net = iface.first_ipv4().unwrap();
        assert_eq!(net.ip(), Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(net.prefix(), 24);
    }

    #[test]
    fn test_device_has_address() {
        let device = CaptureDevice {
            name: "eth0".to_string(),
            addresses: vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))],
        };
        assert!(device.has_address(Ipv4Addr::new(10, 0, 0, 5)));
        assert!(!device.has_address(Ipv4Addr::new(10, 0, 0, 6)));
    }
}
