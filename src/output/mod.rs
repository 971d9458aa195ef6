//! Output formatting module.
//!
//! Results go to stdout as plain text or JSON; diagnostics go to stderr.

mod json_format;
mod plain;

pub use json_format::write_json;
pub use plain::{
    print_error, print_scan_header, print_warning, render_active, render_interfaces,
    render_passive,
};

use crate::capture::LinkInterface;
use crate::cli::OutputFormat;
use crate::scanner::{ActiveReport, PassiveReport};
use std::io;

/// Print an active scan report.
pub fn print_active(report: &ActiveReport, format: OutputFormat) -> io::Result<()> {
    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Plain => render_active(&mut out, report),
        OutputFormat::Json => write_json(&mut out, report),
    }
}

/// Print a passive capture report.
pub fn print_passive(report: &PassiveReport, format: OutputFormat) -> io::Result<()> {
    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Plain => render_passive(&mut out, report),
        OutputFormat::Json => write_json(&mut out, report),
    }
}

/// Print the interface listing.
pub fn print_interfaces(interfaces: &[LinkInterface], format: OutputFormat) -> io::Result<()> {
    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Plain => render_interfaces(&mut out, interfaces),
        OutputFormat::Json => write_json(&mut out, interfaces),
    }
}
