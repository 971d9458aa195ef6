//! Result records produced by the scanners.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// A host that answered an ARP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpResult {
    /// Interface the reply was captured on.
    pub interface: String,
    /// Sender protocol address of the reply.
    pub ip: Ipv4Addr,
    /// Sender hardware address, colon separated.
    pub mac: String,
}

/// Deduplication key for ARP replies.
pub type ArpKey = (String, Ipv4Addr, String);

impl ArpResult {
    pub fn new(interface: impl Into<String>, ip: Ipv4Addr, mac: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            ip,
            mac: mac.into(),
        }
    }

    /// The key two replies must share to count as duplicates.
    pub fn key(&self) -> ArpKey {
        (self.interface.clone(), self.ip, self.mac.clone())
    }
}

/// A host that answered at least one ICMP echo request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmpResult {
    pub ip: Ipv4Addr,
    /// Mean round-trip time over the replies received.
    #[serde(with = "duration_micros")]
    pub avg_rtt: Duration,
}

impl IcmpResult {
    pub fn new(ip: Ipv4Addr, avg_rtt: Duration) -> Self {
        Self { ip, avg_rtt }
    }
}

/// A peer observed sending traffic to one of our addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassiveResult {
    pub src_ip: Ipv4Addr,
    /// IPv4 next-level protocol, e.g. "Tcp".
    pub protocol: String,
    pub src_mac: String,
    pub dst_mac: String,
    /// Ethernet type of the carrying frame, e.g. "Ipv4".
    pub ether_type: String,
}

/// Reverse-DNS outcome for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostnameResult {
    pub ip: Ipv4Addr,
    /// PTR names with any trailing root dot removed.
    pub ptr_names: Vec<String>,
    /// First PTR name, empty when none.
    pub fqdn: String,
    /// Lookup error text, empty on success.
    pub error: String,
}

impl HostnameResult {
    /// An empty result for `ip`.
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            ptr_names: Vec::new(),
            fqdn: String::new(),
            error: String::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.fqdn.is_empty()
    }
}

mod duration_micros {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_micros() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_micros)
    }
}
