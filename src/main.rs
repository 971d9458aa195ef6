use anyhow::Context;
use clap::Parser;
use hostsweep::cli::{Cli, Commands};
use hostsweep::config::AppSettings;
use hostsweep::error::CliError;
use hostsweep::output;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(cli: &Cli) -> anyhow::Result<AppSettings> {
    match &cli.config {
        Some(path) => AppSettings::load_from(path)
            .map_err(CliError::from)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => AppSettings::load()
            .map_err(CliError::from)
            .context("loading settings"),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = load_settings(&cli)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping");
                cancel.cancel();
            }
        }
    });

    match &cli.command {
        Commands::Active(cmd) => cmd.execute(&settings, cli.quiet, cancel).await?,
        Commands::Passive(cmd) => cmd.execute(&settings, cli.quiet, cancel).await?,
        Commands::Interfaces(cmd) => cmd.execute()?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            if let Some(hint) = e.downcast_ref::<CliError>().and_then(CliError::hint) {
                output::print_warning(hint);
            }
            ExitCode::FAILURE
        }
    }
}
