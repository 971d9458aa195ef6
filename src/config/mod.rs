//! Configuration management for hostsweep.
//!
//! Provides XDG-compliant settings storage. Command-line flags override
//! whatever the settings file holds.

mod settings;

pub use settings::{AppSettings, Paths};
