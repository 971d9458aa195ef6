//! Active subcommand implementation.
//!
//! Handles `hostsweep active` for ARP and ICMP discovery.

use crate::cli::{is_root, spinner, OutputFormat};
use crate::config::AppSettings;
use crate::error::{CliError, CliResult};
use crate::output;
use crate::scanner::{ActiveRequest, Discovery, ScanMode, ScanOptions};
use crate::storage::ScanSession;
use crate::types::ScanTarget;
use clap::Parser;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Discover hosts by probing them.
#[derive(Parser, Debug)]
pub struct ActiveCommand {
    /// Network interface to scan from
    ///
    /// Required for ARP scans, and for ICMP scans without --range.
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Range or host to probe (e.g. "192.168.1.0/24", "192.168.1.10")
    ///
    /// Defaults to the interface's network. ARP ranges must lie within it.
    #[arg(short, long, value_name = "RANGE")]
    pub range: Option<String>,

    /// Use ICMP echo instead of ARP
    #[arg(long)]
    pub icmp: bool,

    /// Maximum number of probes in flight
    #[arg(short = 'p', long)]
    pub concurrency: Option<usize>,

    /// Per-probe timeout in milliseconds
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// ICMP echoes per host
    #[arg(short = 'c', long)]
    pub count: Option<u32>,

    /// Rate limit in probes per second (0 = unlimited)
    #[arg(long = "rate")]
    pub rate_limit: Option<u32>,

    /// Skip reverse-DNS lookups of discovered hosts
    #[arg(long)]
    pub no_resolve: bool,

    /// Output format for results
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,
}

impl ActiveCommand {
    pub fn mode(&self) -> ScanMode {
        if self.icmp {
            ScanMode::Icmp
        } else {
            ScanMode::Arp
        }
    }

    /// Settings with this command's flags applied on top.
    pub fn options(&self, settings: &AppSettings) -> ScanOptions {
        let mut options = settings.scan_options();
        if let Some(concurrency) = self.concurrency {
            options.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            options.timeout = Duration::from_millis(timeout);
        }
        if let Some(count) = self.count {
            options.count = count;
        }
        if let Some(rate) = self.rate_limit {
            options.rate_limit = rate;
        }
        options
    }

    /// Build the scan request, checking the flag combination.
    pub fn request(&self, settings: &AppSettings) -> CliResult<ActiveRequest> {
        let mode = self.mode();
        let interface = match (&self.interface, mode, &self.range) {
            (Some(iface), _, _) => iface.clone(),
            (None, ScanMode::Icmp, Some(_)) => String::new(),
            (None, ScanMode::Arp, _) => {
                return Err(CliError::Other("ARP scans need --interface".to_string()))
            }
            (None, ScanMode::Icmp, None) => {
                return Err(CliError::Other(
                    "ICMP scans need --interface or --range".to_string(),
                ))
            }
        };

        let mut target = ScanTarget::new(interface);
        if let Some(range) = &self.range {
            target = target.with_range(range.clone());
        }

        let options = self.options(settings);
        options.validate()?;

        Ok(ActiveRequest::new(target, mode)
            .with_options(options)
            .with_resolve(settings.resolve_hostnames && !self.no_resolve))
    }

    /// Execute the active command.
    pub async fn execute(
        &self,
        settings: &AppSettings,
        quiet: bool,
        cancel: CancellationToken,
    ) -> CliResult<()> {
        let request = self.request(settings)?;

        if !is_root() && !quiet {
            output::print_warning(&format!(
                "{} scanning needs root/sudo or CAP_NET_RAW; the scan may fail.",
                request.mode
            ));
        }

        let target_label = request
            .target
            .range
            .clone()
            .unwrap_or_else(|| "interface network".to_string());
        if !quiet && self.output == OutputFormat::Plain {
            output::print_scan_header(
                &request.mode.to_string(),
                &request.target.interface,
                &target_label,
            );
        }

        let progress = spinner(
            format!("{} scan of {}", request.mode, target_label),
            quiet,
            self.output,
        );

        let discovery = Discovery::system();
        let session = ScanSession::new();
        let result = discovery.run_active(&session, &request, &cancel).await;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let report = result?;
        output::print_active(&report, self.output)?;
        Ok(())
    }
}
