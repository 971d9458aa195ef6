//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::capture::LinkInterface;
use crate::scanner::{ActiveReport, IcmpOutcome, PassiveReport};
use crate::storage::{ArpResult, HostnameResult, IcmpResult, PassiveResult};
use console::style;
use ipnetwork::IpNetwork;
use std::collections::HashMap;
use std::io::{self, Write};
use std::net::Ipv4Addr;

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

fn banner<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out, "                {} {}", style("hostsweep").cyan().bold(), title)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)
}

fn footer<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)
}

fn hostname_index(hostnames: &[HostnameResult]) -> HashMap<Ipv4Addr, &str> {
    hostnames
        .iter()
        .filter(|h| h.is_resolved())
        .map(|h| (h.ip, h.fqdn.as_str()))
        .collect()
}

/// Render an active scan report.
pub fn render_active<W: Write>(out: &mut W, report: &ActiveReport) -> io::Result<()> {
    banner(out, &format!("{} Discovery", report.mode))?;

    writeln!(out, "  {} {}", style("Interface:").bold(), report.interface)?;
    writeln!(out, "  {} {}", style("Target:").bold(), report.target)?;
    writeln!(
        out,
        "  {} {} hosts up in {:.2}s",
        style("Statistics:").bold(),
        style(report.hosts_found()).green().bold(),
        report.duration_ms as f64 / 1000.0
    )?;
    if report.icmp.as_ref().is_some_and(IcmpOutcome::was_interrupted) {
        writeln!(out, "  {}", style("Sweep interrupted before completion.").yellow())?;
    }
    writeln!(out)?;

    let names = hostname_index(&report.hostnames);
    match &report.icmp {
        Some(outcome) => render_icmp(out, &outcome.results(), &names)?,
        None => render_arp(out, &report.arp, &names)?,
    }

    footer(out)
}

fn render_arp<W: Write>(
    out: &mut W,
    results: &[ArpResult],
    names: &HashMap<Ipv4Addr, &str>,
) -> io::Result<()> {
    if results.is_empty() {
        return writeln!(out, "  {}", style("No hosts answered.").dim());
    }

    let mut sorted: Vec<&ArpResult> = results.iter().collect();
    sorted.sort_by_key(|r| r.ip);

    writeln!(out, "  {}", style(THIN_RULE).dim())?;
    writeln!(
        out,
        "  {:<15}  {:<17}  {:<10}  {}",
        style("IP").bold(),
        style("MAC").bold(),
        style("INTERFACE").bold(),
        style("HOSTNAME").bold()
    )?;
    writeln!(out, "  {}", style(THIN_RULE).dim())?;

    for result in sorted {
        writeln!(
            out,
            "  {:<15}  {:<17}  {:<10}  {}",
            style(result.ip).green(),
            result.mac,
            result.interface,
            style(names.get(&result.ip).copied().unwrap_or("")).dim()
        )?;
    }

    writeln!(out, "  {}", style(THIN_RULE).dim())
}

fn render_icmp<W: Write>(
    out: &mut W,
    results: &[IcmpResult],
    names: &HashMap<Ipv4Addr, &str>,
) -> io::Result<()> {
    if results.is_empty() {
        return writeln!(out, "  {}", style("No hosts answered.").dim());
    }

    let mut sorted: Vec<&IcmpResult> = results.iter().collect();
    sorted.sort_by_key(|r| r.ip);

    writeln!(out, "  {}", style(THIN_RULE).dim())?;
    writeln!(
        out,
        "  {:<15}  {:>10}  {}",
        style("IP").bold(),
        style("AVG RTT").bold(),
        style("HOSTNAME").bold()
    )?;
    writeln!(out, "  {}", style(THIN_RULE).dim())?;

    for result in sorted {
        writeln!(
            out,
            "  {:<15}  {:>10}  {}",
            style(result.ip).green(),
            format!("{:.2}ms", result.avg_rtt.as_secs_f64() * 1000.0),
            style(names.get(&result.ip).copied().unwrap_or("")).dim()
        )?;
    }

    writeln!(out, "  {}", style(THIN_RULE).dim())
}

/// Render a passive capture report.
pub fn render_passive<W: Write>(out: &mut W, report: &PassiveReport) -> io::Result<()> {
    banner(out, "Passive Capture")?;

    writeln!(out, "  {} {}", style("Interface:").bold(), report.interface)?;
    writeln!(
        out,
        "  {} {} peers seen in {:.2}s",
        style("Statistics:").bold(),
        style(report.peers.len()).green().bold(),
        report.duration_ms as f64 / 1000.0
    )?;
    writeln!(out)?;

    if report.peers.is_empty() {
        writeln!(out, "  {}", style("No traffic addressed to this host was seen.").dim())?;
        return footer(out);
    }

    let mut sorted: Vec<&PassiveResult> = report.peers.iter().collect();
    sorted.sort_by_key(|r| r.src_ip);

    writeln!(out, "  {}", style(THIN_RULE).dim())?;
    writeln!(
        out,
        "  {:<15}  {:<8}  {:<17}  {:<17}  {}",
        style("SOURCE").bold(),
        style("PROTO").bold(),
        style("SRC MAC").bold(),
        style("DST MAC").bold(),
        style("ETHERTYPE").bold()
    )?;
    writeln!(out, "  {}", style(THIN_RULE).dim())?;

    for peer in sorted {
        writeln!(
            out,
            "  {:<15}  {:<8}  {:<17}  {:<17}  {}",
            style(peer.src_ip).green(),
            peer.protocol,
            peer.src_mac,
            peer.dst_mac,
            style(&peer.ether_type).dim()
        )?;
    }

    writeln!(out, "  {}", style(THIN_RULE).dim())?;
    footer(out)
}

/// Render the interface listing.
pub fn render_interfaces<W: Write>(out: &mut W, interfaces: &[LinkInterface]) -> io::Result<()> {
    if interfaces.is_empty() {
        return writeln!(out, "{}", style("No network interfaces found.").dim());
    }

    for iface in interfaces {
        let mut flags = Vec::new();
        if iface.is_up {
            flags.push("up");
        }
        if iface.is_loopback {
            flags.push("loopback");
        }

        writeln!(
            out,
            "{} {}",
            style(&iface.name).cyan().bold(),
            style(format!("[{}]", flags.join(","))).dim()
        )?;
        if let Some(mac) = iface.mac {
            writeln!(out, "    {} {}", style("mac").dim(), mac)?;
        }
        for net in &iface.ips {
            if let IpNetwork::V4(v4) = net {
                writeln!(out, "    {} {}", style("inet").dim(), v4)?;
            }
        }
    }

    Ok(())
}

/// Print a header before a scan begins.
pub fn print_scan_header(kind: &str, interface: &str, target: &str) {
    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("hostsweep").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{} Mode: {}", style("•").dim(), style(kind).yellow());
    println!("{} Interface: {}", style("•").dim(), style(interface).white().bold());
    println!("{} Target: {}", style("•").dim(), style(target).white().bold());
    println!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}
