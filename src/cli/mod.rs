//! CLI subcommand definitions and handlers.
//!
//! - `hostsweep active -i <iface>` - ARP or ICMP discovery
//! - `hostsweep passive -i <iface>` - listen for peers
//! - `hostsweep interfaces` - list usable interfaces

mod active;
mod interfaces;
mod passive;

pub use active::ActiveCommand;
pub use interfaces::InterfacesCommand;
pub use passive::PassiveCommand;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

/// hostsweep - local network host discovery.
///
/// Finds live hosts with ARP requests on the local segment or ICMP echo
/// sweeps, or by passively watching traffic addressed to this machine.
#[derive(Parser, Debug)]
#[command(name = "hostsweep")]
#[command(author = "HueCodes <huecodes@proton.me>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Local network host discovery", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to custom configuration file
    #[arg(long, global = true, value_name = "PATH", env = "HOSTSWEEP_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe a range with ARP requests or ICMP echoes
    #[command(alias = "a")]
    Active(ActiveCommand),

    /// Listen for hosts talking to this machine
    #[command(alias = "p")]
    Passive(PassiveCommand),

    /// List network interfaces
    #[command(alias = "i")]
    Interfaces(InterfacesCommand),
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Check if running with root privileges.
pub fn is_root() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// A spinner on stderr, or `None` when output should stay quiet.
pub(crate) fn spinner(message: String, quiet: bool, format: OutputFormat) -> Option<ProgressBar> {
    if quiet || format == OutputFormat::Json {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_active_icmp() {
        let cli = Cli::try_parse_from([
            "hostsweep", "active", "-i", "eth0", "-r", "10.0.0.0/24", "--icmp", "-p", "8", "-c", "3",
            "--no-resolve", "-o", "json",
        ])
        .unwrap();

        let Commands::Active(cmd) = cli.command else {
            panic!("expected active command");
        };
        assert_eq!(cmd.interface.as_deref(), Some("eth0"));
        assert_eq!(cmd.range.as_deref(), Some("10.0.0.0/24"));
        assert!(cmd.icmp);
        assert_eq!(cmd.concurrency, Some(8));
        assert_eq!(cmd.count, Some(3));
        assert!(cmd.no_resolve);
        assert_eq!(cmd.output, OutputFormat::Json);
    }

    #[test]
    fn test_parse_passive_with_globals() {
        let cli = Cli::try_parse_from(["hostsweep", "-v", "passive", "-i", "eth0", "-d", "5"]).unwrap();
        assert!(cli.verbose);
        let Commands::Passive(cmd) = cli.command else {
            panic!("expected passive command");
        };
        assert_eq!(cmd.duration, Some(5));
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["hostsweep", "-v", "-q", "interfaces"]).is_err());
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Plain.to_string(), "plain");
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
