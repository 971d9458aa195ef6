//! # hostsweep - Local Network Host Discovery
//!
//! hostsweep finds live hosts on the networks this machine is attached to.
//!
//! ## Features
//!
//! - **ARP Scanning**: who-has every address of the local segment and collect replies
//! - **ICMP Sweeps**: echo a CIDR range or a single host, with average RTT
//! - **Passive Capture**: record peers that send traffic to this host, without probing
//! - **Hostname Enrichment**: reverse-DNS lookups of everything discovered
//! - **Bounded Concurrency**: every scan runs under a fixed-size gate, with optional rate limiting
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use hostsweep::scanner::{ActiveRequest, Discovery, ScanMode};
//! use hostsweep::storage::ScanSession;
//! use hostsweep::types::ScanTarget;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let discovery = Discovery::system();
//!     let session = ScanSession::new();
//!     let request = ActiveRequest::new(ScanTarget::new("eth0"), ScanMode::Arp);
//!
//!     let report = discovery
//!         .run_active(&session, &request, &CancellationToken::new())
//!         .await
//!         .unwrap();
//!
//!     for host in session.arp_results() {
//!         println!("{} is at {}", host.ip, host.mac);
//!     }
//!     println!("{} hosts in {}ms", report.hosts_found(), report.duration_ms);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Subnet arithmetic and target parsing
//! - [`capture`] - Interface enumeration and live captures behind the `Datalink` trait
//! - [`scanner`] - ARP, ICMP, passive and reverse-DNS scanners, and the `Discovery` orchestrator
//! - [`storage`] - Result records and the per-invocation `ScanSession`
//! - [`config`] - Settings file handling
//! - [`error`] - Error types
//! - [`output`] - Plain and JSON rendering
//! - [`cli`] - Command-line definitions

pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod scanner;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use error::{CliError, ScanError};
pub use scanner::{ActiveRequest, Discovery, ScanMode, ScanOptions};
pub use storage::{ArpResult, HostnameResult, IcmpResult, PassiveResult, ScanSession};
pub use types::{ScanTarget, TargetSpec};
