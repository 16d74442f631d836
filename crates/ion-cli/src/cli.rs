use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ionrepo",
    about = "ION object repository tools",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Workbench configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run two in-process workbenches through create, push, edit and pull
    Demo(DemoArgs),
    /// List the heads and items of a transfer container
    Inspect(InspectArgs),
    /// Show the branches and history of an exported repository
    Log(LogArgs),
    /// Print the effective workbench configuration
    Config,
}

#[derive(Args)]
pub struct DemoArgs {
    /// Owner of the demo address book
    #[arg(long, default_value = "David")]
    pub owner: String,
    /// Write the final repository to this file
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct InspectArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct LogArgs {
    pub file: PathBuf,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}
