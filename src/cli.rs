use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "steamswap")]
#[command(about = "Switch the active Steam account from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: CommandKind,
}

#[derive(Subcommand)]
pub enum CommandKind {
    #[command(about = "List known accounts, most recent first", alias = "ls")]
    List {
        #[arg(short = 's', long, help = "Path to Steam installation")]
        steam_dir: Option<String>,
    },
    #[command(about = "Switch auto-login to ACCOUNT, or clear it for a fresh login")]
    Switch {
        #[arg(
            short = 'y',
            long,
            help = "Skip the confirmation prompt when Steam is running"
        )]
        yes: bool,
        #[arg(short = 's', long, help = "Path to Steam installation")]
        steam_dir: Option<String>,
        #[arg(help = "Account name to log in as (omit to get the login prompt)")]
        account: Option<String>,
    },
    #[command(
        about = "Forget an account: drop its login history and stored credentials",
        alias = "rm"
    )]
    Delete {
        #[arg(short = 'y', long, help = "Skip the confirmation prompt")]
        yes: bool,
        #[arg(short = 's', long, help = "Path to Steam installation")]
        steam_dir: Option<String>,
        #[arg(help = "Account name to forget")]
        account: String,
    },
    #[command(about = "Show the located install, session layout, and auto-login account")]
    Status {
        #[arg(short = 's', long, help = "Path to Steam installation")]
        steam_dir: Option<String>,
    },
    #[command(about = "Register a launcher shortcut for the running AppImage")]
    Integrate,
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(help = "Shell to generate completions for (bash, zsh, fish, elvish, powershell)")]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
