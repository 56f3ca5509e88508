use std::io::{self, Write as _};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use clap::CommandFactory;
use clap_complete::Shell;

use crate::cli::Cli;
use crate::integration::{self, DesktopIntegration};
use crate::process::ClientProcess;
use crate::steam::{SessionLayout, Steam};
use crate::switcher::{SessionSwitcher, SwitchOutcome};

/// Exact executable name of the external client, as it appears in the
/// process table.
pub const CLIENT_EXE: &str = "steam";

pub fn list(steam_dir: Option<String>) -> Result<()> {
    let steam = Steam::locate(steam_dir)?;
    let accounts = steam.list_accounts();
    if accounts.is_empty() {
        println!("No accounts found");
        return Ok(());
    }
    for account in accounts {
        println!(
            "{}\t{}\t{}\t{}",
            account.account_name,
            account.persona_name,
            account.steam_id,
            format_last_login(&account.timestamp)
        );
    }
    Ok(())
}

pub fn switch(yes: bool, steam_dir: Option<String>, account: Option<String>) -> Result<()> {
    let steam = Steam::locate(steam_dir)?;
    let target = account.unwrap_or_default();
    let mut switcher = SessionSwitcher::new(steam, ClientProcess::new(CLIENT_EXE));

    match switcher.request_switch(&target)? {
        SwitchOutcome::Switched => {}
        SwitchOutcome::NeedsConfirmation => {
            let question = if target.is_empty() {
                "Steam is running. Close it and open the login prompt?"
            } else {
                "Steam is running. Close it and switch accounts?"
            };
            if !(yes || confirm(question)?) {
                switcher.cancel();
                println!("Aborted");
                return Ok(());
            }
            switcher.confirm_termination()?;
        }
    }

    // Report what the file actually says after the edit.
    match switcher.steam().auto_login_user() {
        Some(user) => println!("Auto-login set to {user}"),
        None => println!("Auto-login cleared; Steam will show the login prompt"),
    }
    Ok(())
}

pub fn delete(yes: bool, steam_dir: Option<String>, account: &str) -> Result<()> {
    let steam = Steam::locate(steam_dir)?;
    let question =
        format!("Forget account {account}? This drops its login history and stored credentials");
    if !(yes || confirm(&question)?) {
        println!("Aborted");
        return Ok(());
    }

    let switcher = SessionSwitcher::new(steam, ClientProcess::new(CLIENT_EXE));
    let report = switcher.delete_account(account);
    if report.history_removed == 0 && !report.credentials_removed {
        println!("No traces of {account} found");
    } else {
        println!(
            "Removed {} login history record(s); stored credentials {}",
            report.history_removed,
            if report.credentials_removed {
                "dropped"
            } else {
                "not present"
            }
        );
    }
    Ok(())
}

pub fn status(steam_dir: Option<String>) -> Result<()> {
    let steam = Steam::locate(steam_dir)?;
    let client = ClientProcess::new(CLIENT_EXE);
    println!("Steam root: {}", steam.root_path().display());
    println!(
        "Session file: {} ({})",
        steam.session_path().display(),
        match steam.layout() {
            SessionLayout::Registry => "registry layout",
            SessionLayout::ConfigStore => "config store layout",
        }
    );
    match steam.auto_login_user() {
        Some(user) => println!("Auto-login: {user}"),
        None => println!("Auto-login: (none)"),
    }
    println!(
        "Client: {}",
        if client.is_running() {
            "running"
        } else {
            "stopped"
        }
    );
    Ok(())
}

pub fn integrate() -> Result<()> {
    let Some(appimage) = integration::appimage_path() else {
        bail!("Not running from an AppImage; nothing to integrate");
    };
    let desktop = DesktopIntegration::from_user_dirs()?;
    if desktop.is_installed() {
        println!("Launcher shortcut already registered");
        return Ok(());
    }
    desktop.install(&appimage)?;
    println!("Launcher shortcut registered");
    Ok(())
}

pub fn completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("Failed to read from stdin")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn format_last_login(timestamp: &str) -> String {
    timestamp
        .parse::<i64>()
        .ok()
        .filter(|secs| *secs > 0)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|when| when.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_timestamps_render_as_never() {
        assert_eq!(format_last_login("0"), "never");
        assert_eq!(format_last_login(""), "never");
        assert_eq!(format_last_login("not-a-number"), "never");
    }

    #[test]
    fn real_timestamps_render_as_dates() {
        assert!(format_last_login("1700000200").starts_with("2023-11-1"));
    }
}
