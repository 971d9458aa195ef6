//! Interfaces subcommand implementation.

use crate::capture::{Datalink, LinkInterface, PnetDatalink};
use crate::cli::OutputFormat;
use crate::error::CliResult;
use crate::output;
use clap::Parser;

/// List network interfaces usable for discovery.
#[derive(Parser, Debug)]
pub struct InterfacesCommand {
    /// Include interfaces that are down or loopback
    #[arg(short, long)]
    pub all: bool,

    /// Output format for results
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,
}

impl InterfacesCommand {
    /// Apply the `--all` filter.
    pub fn select(&self, interfaces: Vec<LinkInterface>) -> Vec<LinkInterface> {
        if self.all {
            return interfaces;
        }
        interfaces
            .into_iter()
            .filter(|i| i.is_up && !i.is_loopback && i.first_ipv4().is_some())
            .collect()
    }

    /// Execute the interfaces command.
    pub fn execute(&self) -> CliResult<()> {
        let interfaces = self.select(PnetDatalink::new().interfaces()?);
        output::print_interfaces(&interfaces, self.output)?;
        Ok(())
    }
}
