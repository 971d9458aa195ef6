//! Error types for hostsweep.
//!
//! Uses `thiserror` for ergonomic error definitions.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for discovery operations.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("interface {0} has no IPv4 address")]
    NoIpv4Address(String),

    #[error("interface {interface} is bound to loopback address {address}, skipping")]
    LoopbackRejected { interface: String, address: String },

    #[error("network {network} on interface {interface} is too large to probe (prefix must be /16 or longer)")]
    NetworkTooLarge { interface: String, network: String },

    #[error("requested range {target} is outside interface network {network}")]
    TargetOutsideInterfaceNetwork { target: String, network: String },

    #[error("invalid target {0:?}: expected an IPv4 address or CIDR range")]
    InvalidTarget(String),

    #[error("cannot find a capture device for interface {interface} ({address})")]
    DeviceNotFound { interface: String, address: String },

    #[error("failed to open capture on {device}: {reason}")]
    CaptureOpen { device: String, reason: String },

    #[error("capture handle is closed")]
    CaptureClosed,

    #[error("probe timed out")]
    Timeout,

    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Raw socket error: {0}")]
    RawSocketError(String),

    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("worker task failed: {0}")]
    Worker(String),
}

impl ScanError {
    /// Errors caused by the operator's input, raised before any network I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InterfaceNotFound(_)
                | Self::NoIpv4Address(_)
                | Self::LoopbackRejected { .. }
                | Self::NetworkTooLarge { .. }
                | Self::TargetOutsideInterfaceNetwork { .. }
                | Self::InvalidTarget(_)
                | Self::InvalidConfig(_)
        )
    }

    /// Errors caused by a missing or unusable capture/socket resource.
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. }
                | Self::CaptureOpen { .. }
                | Self::CaptureClosed
                | Self::PermissionDenied(_)
                | Self::RawSocketError(_)
        )
    }
}

impl From<tokio::task::JoinError> for ScanError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Worker(e.to_string())
    }
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors raised while loading or saving settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine a configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level error for command handlers.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// Follow-up advice for the operator, if the failure has an obvious fix.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Scan(e) if e.is_configuration() => {
                Some("check the interface name and target range (see `hostsweep interfaces`)")
            }
            Self::Scan(e) if e.is_resource() => {
                Some("packet capture needs root/sudo or CAP_NET_RAW on an interface that is up")
            }
            Self::Config(_) => Some("fix or remove the settings file, or pass --config"),
            _ => None,
        }
    }
}

/// Result type alias for command handlers.
pub type CliResult<T> = Result<T, CliError>;
