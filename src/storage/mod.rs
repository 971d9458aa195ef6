//! Scan result collection.
//!
//! Results live in deduplicating in-memory stores owned by a per-invocation
//! [`ScanSession`]. Nothing is persisted across runs.

mod records;
mod result_store;
mod session;

pub use records::{ArpKey, ArpResult, HostnameResult, IcmpResult, PassiveResult};
pub use result_store::ResultStore;
pub use session::{ArpStore, HostnameStore, IcmpStore, PassiveStore, ScanSession};
