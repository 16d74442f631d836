use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod schema;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let default = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
    commands::run_command(cli)
}
