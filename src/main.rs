mod cli;
mod commands;
mod integration;
mod process;
mod steam;
mod switcher;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, CommandKind};

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        CommandKind::List { steam_dir } => commands::list(steam_dir),
        CommandKind::Switch {
            yes,
            steam_dir,
            account,
        } => commands::switch(yes, steam_dir, account),
        CommandKind::Delete {
            yes,
            steam_dir,
            account,
        } => commands::delete(yes, steam_dir, &account),
        CommandKind::Status { steam_dir } => commands::status(steam_dir),
        CommandKind::Integrate => commands::integrate(),
        CommandKind::Completions { shell } => commands::completions(shell),
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("steamswap=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}
