//! Core type definitions: targets and subnet arithmetic.

pub mod subnet;
mod target;

pub use subnet::{align_to_network, enumerate_hosts, is_subnet_within, network_and_broadcast};
pub use target::{ScanTarget, TargetSpec};
