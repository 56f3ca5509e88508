use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::process::ClientProcess;
use crate::steam::{RemovalReport, Steam};

/// Delay between a confirmed client exit and the config edit, giving the
/// client time to finish flushing its own shutdown writes.
const SETTLE_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchState {
    Idle,
    /// A switch was requested while the client is running; nothing has
    /// been touched yet.
    ConfirmingTermination { target: String },
    Terminating,
    Switching,
    Relaunched,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The client is live, so the switch needs `confirm_termination` (or
    /// `cancel`) before any file is edited.
    NeedsConfirmation,
    Switched,
}

/// Orchestrates a switch: decide the target, stop the client if needed,
/// rewrite the session config, relaunch. The layout mode lives in `steam`,
/// chosen once at locate time.
pub struct SessionSwitcher {
    steam: Steam,
    client: ClientProcess,
    state: SwitchState,
}

impl SessionSwitcher {
    pub fn new(steam: Steam, client: ClientProcess) -> Self {
        Self {
            steam,
            client,
            state: SwitchState::Idle,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &SwitchState {
        &self.state
    }

    pub fn steam(&self) -> &Steam {
        &self.steam
    }

    /// Select `target` as the auto-login account; the empty string is the
    /// fresh-login sentinel. While the client is live this only records
    /// the request. The mutation must not race the client's own config
    /// writes, so it waits for an explicit confirmation.
    pub fn request_switch(&mut self, target: &str) -> Result<SwitchOutcome> {
        if self.client.is_running() {
            self.state = SwitchState::ConfirmingTermination {
                target: target.to_owned(),
            };
            return Ok(SwitchOutcome::NeedsConfirmation);
        }
        self.perform_switch(target)?;
        Ok(SwitchOutcome::Switched)
    }

    /// Proceed with the switch recorded by `request_switch`: stop the
    /// client, then edit and relaunch once it is down (or the termination
    /// window is spent).
    pub fn confirm_termination(&mut self) -> Result<()> {
        let target = match &self.state {
            SwitchState::ConfirmingTermination { target } => target.clone(),
            _ => bail!("no switch awaiting confirmation"),
        };
        self.state = SwitchState::Terminating;
        if !self.client.terminate() {
            info!("client still up; the relaunch will refuse a second instance");
        }
        thread::sleep(SETTLE_DELAY);
        self.perform_switch(&target)
    }

    pub fn cancel(&mut self) {
        self.state = SwitchState::Idle;
    }

    /// Forget an account. Orthogonal to switching: never terminates or
    /// relaunches the client.
    pub fn delete_account(&self, account_name: &str) -> RemovalReport {
        self.steam.remove_account(account_name)
    }

    fn perform_switch(&mut self, target: &str) -> Result<()> {
        self.state = SwitchState::Switching;
        let edit = self.steam.set_auto_login(target);
        if let Err(err) = &edit {
            warn!("session config not updated: {err:#}");
        }
        // Relaunch happens even after a best-effort edit failure or an
        // unconfirmed termination.
        self.state = SwitchState::Relaunched;
        if let Err(err) = self.client.launch() {
            warn!("client not relaunched: {err:#}");
        }
        self.state = SwitchState::Idle;
        edit
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::process::{Child, Command};

    use anyhow::{Context, Result};
    use tempfile::TempDir;

    use crate::process::pids_by_name;
    use crate::steam::SessionLayout;

    use super::*;

    const REGISTRY: &str = r#""Registry"
{
	"HKCU"
	{
		"Software"
		{
			"Valve"
			{
				"Steam"
				{
					"AutoLoginUser"		"bob"
				}
			}
		}
	}
}
"#;

    fn fixture_steam(dir: &TempDir) -> Result<Steam> {
        let root = dir.path().join("Steam");
        fs::create_dir_all(root.join("config"))?;
        fs::write(root.join("registry.vdf"), REGISTRY)?;
        Steam::locate(Some(root.to_string_lossy().into_owned()))
    }

    fn sleep_binary() -> Option<PathBuf> {
        ["/bin/sleep", "/usr/bin/sleep"]
            .into_iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }

    /// A copy of `sleep` under a name nothing else on the machine uses, so
    /// process-table scans and signals only ever touch our own child.
    fn spawn_decoy(dir: &TempDir, name: &str) -> Result<Option<Child>> {
        let Some(sleep) = sleep_binary() else {
            return Ok(None);
        };
        let decoy = dir.path().join(name);
        fs::copy(sleep, &decoy)?;
        let child = Command::new(&decoy)
            .arg("30")
            .spawn()
            .context("Failed to spawn decoy client")?;
        // Give /proc a moment to show the new comm.
        for _ in 0..50 {
            if !pids_by_name(name).is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        Ok(Some(child))
    }

    #[test]
    fn switching_with_a_stopped_client_completes_directly() -> Result<()> {
        let dir = TempDir::new()?;
        let steam = fixture_steam(&dir)?;
        let mut switcher =
            SessionSwitcher::new(steam, ClientProcess::new("steamswap-no-such-process"));

        let outcome = switcher.request_switch("alice")?;
        assert_eq!(outcome, SwitchOutcome::Switched);
        assert_eq!(switcher.state(), &SwitchState::Idle);
        assert_eq!(switcher.steam().auto_login_user().as_deref(), Some("alice"));
        assert_eq!(switcher.steam().layout(), SessionLayout::Registry);
        Ok(())
    }

    #[test]
    fn clearing_uses_the_empty_sentinel() -> Result<()> {
        let dir = TempDir::new()?;
        let steam = fixture_steam(&dir)?;
        let mut switcher =
            SessionSwitcher::new(steam, ClientProcess::new("steamswap-no-such-process"));

        switcher.request_switch("")?;
        assert_eq!(switcher.steam().auto_login_user(), None);
        Ok(())
    }

    #[test]
    fn confirming_without_a_pending_switch_is_an_error() -> Result<()> {
        let dir = TempDir::new()?;
        let steam = fixture_steam(&dir)?;
        let mut switcher =
            SessionSwitcher::new(steam, ClientProcess::new("steamswap-no-such-process"));
        assert!(switcher.confirm_termination().is_err());
        Ok(())
    }

    #[test]
    fn a_live_client_requires_confirmation_before_any_edit() -> Result<()> {
        let dir = TempDir::new()?;
        let steam = fixture_steam(&dir)?;
        let session_path = steam.session_path().to_path_buf();
        let Some(mut child) = spawn_decoy(&dir, "swapdecoya")? else {
            return Ok(());
        };

        let mut switcher = SessionSwitcher::new(steam, ClientProcess::new("swapdecoya"));
        let outcome = switcher.request_switch("alice")?;
        assert_eq!(outcome, SwitchOutcome::NeedsConfirmation);
        assert_eq!(
            switcher.state(),
            &SwitchState::ConfirmingTermination {
                target: "alice".to_string()
            }
        );
        // Nothing was written while the request sits unconfirmed.
        assert_eq!(fs::read_to_string(&session_path)?, REGISTRY);

        switcher.cancel();
        assert_eq!(switcher.state(), &SwitchState::Idle);

        child.kill()?;
        child.wait()?;
        Ok(())
    }

    #[test]
    fn confirmation_terminates_then_switches() -> Result<()> {
        let dir = TempDir::new()?;
        let steam = fixture_steam(&dir)?;
        let Some(mut child) = spawn_decoy(&dir, "swapdecoyb")? else {
            return Ok(());
        };
        // Reap on exit so the decoy does not linger as a zombie during the
        // liveness poll.
        let reaper = thread::spawn(move || {
            let _ = child.wait();
        });

        let mut switcher = SessionSwitcher::new(steam, ClientProcess::new("swapdecoyb"));
        assert_eq!(
            switcher.request_switch("alice")?,
            SwitchOutcome::NeedsConfirmation
        );
        switcher.confirm_termination()?;

        assert!(pids_by_name("swapdecoyb").is_empty());
        assert_eq!(switcher.steam().auto_login_user().as_deref(), Some("alice"));
        assert_eq!(switcher.state(), &SwitchState::Idle);

        reaper
            .join()
            .map_err(|_| anyhow::anyhow!("reaper thread panicked"))?;
        Ok(())
    }
}
