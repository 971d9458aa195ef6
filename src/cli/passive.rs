//! Passive subcommand implementation.

use crate::cli::{is_root, spinner, OutputFormat};
use crate::config::AppSettings;
use crate::error::CliResult;
use crate::output;
use crate::scanner::Discovery;
use crate::storage::ScanSession;
use clap::Parser;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Listen for hosts sending traffic to this machine.
#[derive(Parser, Debug)]
pub struct PassiveCommand {
    /// Network interface to listen on
    #[arg(short, long)]
    pub interface: String,

    /// How long to listen, in seconds
    #[arg(short, long, value_name = "SECONDS")]
    pub duration: Option<u64>,

    /// Output format for results
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,
}

impl PassiveCommand {
    pub fn capture_duration(&self, settings: &AppSettings) -> Duration {
        self.duration
            .map(Duration::from_secs)
            .unwrap_or_else(|| settings.capture_duration())
    }

    /// Execute the passive command.
    pub async fn execute(
        &self,
        settings: &AppSettings,
        quiet: bool,
        cancel: CancellationToken,
    ) -> CliResult<()> {
        let duration = self.capture_duration(settings);

        if !is_root() && !quiet {
            output::print_warning("Packet capture needs root/sudo or CAP_NET_RAW.");
        }

        let progress = spinner(
            format!("Listening on {} for {}s", self.interface, duration.as_secs()),
            quiet,
            self.output,
        );

        let discovery = Discovery::system();
        let session = ScanSession::new();
        let result = discovery
            .run_passive(&session, &self.interface, duration, &cancel)
            .await;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        output::print_passive(&result?, self.output)?;
        Ok(())
    }
}
