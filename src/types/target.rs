//! Scan target specification.
//!
//! A target is either a single IPv4 host or an IPv4 CIDR range:
//! - Single IP: "192.168.1.1"
//! - CIDR: "192.168.1.0/24"

use crate::error::{ScanError, ScanResult};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// What a single scan invocation is pointed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanTarget {
    /// Interface the scan is bound to.
    pub interface: String,
    /// Optional range or host; `None` means the interface's own network.
    pub range: Option<String>,
}

impl ScanTarget {
    /// Create a target covering the whole interface network.
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            range: None,
        }
    }

    /// Narrow the target to a range or host.
    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{} via {}", range, self.interface),
            None => write!(f, "{}", self.interface),
        }
    }
}

/// A parsed target range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSpec {
    /// A single host.
    Host(Ipv4Addr),
    /// A CIDR network range.
    Range(Ipv4Network),
}

impl TargetSpec {
    /// Parse a target specification.
    ///
    /// Anything containing a `/` must be a valid IPv4 CIDR; everything else
    /// must be a plain IPv4 address. IPv6 is not supported.
    pub fn parse(s: &str) -> ScanResult<Self> {
        let s = s.trim();

        if s.contains('/') {
            return s
                .parse::<Ipv4Network>()
                .map(Self::Range)
                .map_err(|_| ScanError::InvalidTarget(s.to_string()));
        }

        s.parse::<Ipv4Addr>()
            .map(Self::Host)
            .map_err(|_| ScanError::InvalidTarget(s.to_string()))
    }

    /// Parse a target that must be a range (ARP targets).
    pub fn parse_range(s: &str) -> ScanResult<Ipv4Network> {
        match Self::parse(s)? {
            Self::Range(net) => Ok(net),
            Self::Host(_) => Err(ScanError::InvalidTarget(s.trim().to_string())),
        }
    }

    /// Whether this target is a sweep over a range.
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range(_))
    }
}

impl FromStr for TargetSpec {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(ip) => write!(f, "{}", ip),
            Self::Range(network) => write!(f, "{}", network),
        }
    }
}
