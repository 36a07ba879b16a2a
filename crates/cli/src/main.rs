// gaia CLI entry point.

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod client;
mod commands;
mod config;
mod exit_code;
mod output;

use crate::config::CliConfig;
use crate::exit_code::ExitCode;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "gaia", about = "Operator tools for the Gaia wiki orchestrator")]
struct Cli {
    /// Orchestrator base URL (overrides config and GAIA_SERVER_URL).
    #[arg(long, global = true)]
    server: Option<String>,
    /// Shared secret sent as X-Api-Secret (overrides config and GAIA_API_SECRET).
    #[arg(long, global = true)]
    api_secret: Option<String>,
    /// Force JSON output.
    #[arg(long, global = true)]
    json: bool,
    /// Log salvage and HTTP details to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> process::ExitCode {
    let cli = Cli::parse();
    let format = OutputFormat::detect(cli.json);

    let default_filter = if cli.verbose { "debug" } else { "error" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = CliConfig::load().with_overrides(cli.server, cli.api_secret);

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(anyhow::Error::from)
        .and_then(|runtime| runtime.block_on(commands::run(cli.command, &config, format)));

    match result {
        Ok(()) => ExitCode::Success.into(),
        Err(err) => {
            output::print_anyhow_error(format, &err, &config);
            ExitCode::from_error(&err).into()
        }
    }
}
