pub mod tree;
pub mod vdf;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use keyvalues_parser::{Obj, Value, Vdf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::steam::vdf::LoginHistory;

#[derive(Debug, Error)]
pub enum SteamError {
    #[error("no Steam installation found in any known location")]
    RootNotFound,
    #[error("\"{key}\" holds a value where a section was expected")]
    Structure { key: String },
}

/// Which on-disk layout the active-session file uses. Fixed when the
/// installation is located and never rediscovered per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLayout {
    /// Legacy `registry.vdf` at the root or its parent.
    Registry,
    /// Modern per-install `config/config.vdf`.
    ConfigStore,
}

impl SessionLayout {
    fn root_key(self) -> &'static str {
        match self {
            Self::Registry => "Registry",
            Self::ConfigStore => "InstallConfigStore",
        }
    }

    fn steam_path(self) -> &'static [&'static str] {
        match self {
            Self::Registry => &["HKCU", "Software", "Valve", "Steam"],
            Self::ConfigStore => &["Software", "Valve", "Steam"],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub steam_id: String,
    pub account_name: String,
    pub persona_name: String,
    /// Last-login time as the numeric string the client stores; used only
    /// for sort ordering and display.
    pub timestamp: String,
}

/// Outcome of a best-effort account removal. Each half is attempted
/// independently; a miss on one side does not abort the other.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub history_removed: usize,
    pub credentials_removed: bool,
}

pub struct Steam {
    root: PathBuf,
    login_users: PathBuf,
    session_file: PathBuf,
    layout: SessionLayout,
}

impl Steam {
    pub fn locate(steam_dir: Option<String>) -> Result<Self> {
        let root = match steam_dir {
            Some(dir) => {
                let root = PathBuf::from(dir);
                if !root.exists() {
                    bail!("Steam directory not found at {}", root.display());
                }
                root
            }
            None => {
                let home = std::env::var("HOME").context("HOME environment variable not set")?;
                find_root(Path::new(&home))?
            }
        };

        Ok(Self::resolve(root))
    }

    fn resolve(root: PathBuf) -> Self {
        let login_users = root.join("config/loginusers.vdf");
        let root_legacy = root.join("registry.vdf");
        let parent_legacy = root.parent().map(|parent| parent.join("registry.vdf"));

        let (session_file, layout) = if root_legacy.is_file() {
            (root_legacy, SessionLayout::Registry)
        } else if let Some(legacy) = parent_legacy.filter(|path| path.is_file()) {
            (legacy, SessionLayout::Registry)
        } else {
            (root.join("config/config.vdf"), SessionLayout::ConfigStore)
        };
        debug!("using {} ({:?} layout)", session_file.display(), layout);

        Self {
            root,
            login_users,
            session_file,
            layout,
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn session_path(&self) -> &Path {
        &self.session_file
    }

    pub fn layout(&self) -> SessionLayout {
        self.layout
    }

    /// Known accounts, most recently used first. A missing or unparsable
    /// login history reads as "no accounts", never as an error.
    pub fn list_accounts(&self) -> Vec<Account> {
        let content = match fs::read_to_string(&self.login_users) {
            Ok(content) => content,
            Err(err) => {
                debug!("no login history at {}: {err}", self.login_users.display());
                return Vec::new();
            }
        };
        let history: LoginHistory = match keyvalues_serde::from_str(&content) {
            Ok(history) => history,
            Err(err) => {
                warn!("unreadable {}: {err}", self.login_users.display());
                return Vec::new();
            }
        };

        let mut accounts: Vec<Account> = history
            .users
            .into_iter()
            .map(|(steam_id, entry)| Account {
                steam_id,
                account_name: entry.account_name.unwrap_or_else(|| "(unknown)".to_string()),
                persona_name: entry.persona_name.unwrap_or_else(|| "(unknown)".to_string()),
                timestamp: entry.timestamp.unwrap_or_else(|| "0".to_string()),
            })
            .collect();

        // The client stores timestamps as fixed-width numeric strings, so a
        // plain string comparison matches its own ordering.
        accounts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        accounts
    }

    /// Point auto-login at `account_name`, or clear it with the empty
    /// sentinel. The session file is re-read for every call so a client
    /// rewrite between operations is never clobbered with stale state.
    pub fn set_auto_login(&self, account_name: &str) -> Result<()> {
        let content = fs::read_to_string(&self.session_file)
            .with_context(|| format!("Failed to read {}", self.session_file.display()))?;
        let mut config = Vdf::parse(&content)
            .with_context(|| format!("Failed to parse {}", self.session_file.display()))?;

        {
            let steam = self.steam_node(&mut config)?;
            tree::set_str(steam, "AutoLoginUser", account_name);
            let remember = if account_name.is_empty() { "0" } else { "1" };
            tree::set_str(steam, "RememberPassword", remember);
            // Cleared unconditionally; a leftover "1" makes the client skip
            // the login prompt it is being restarted for.
            tree::set_str(steam, "AlreadyLoggedIn", "0");
        }

        fs::write(&self.session_file, config.to_string())
            .with_context(|| format!("Failed to write {}", self.session_file.display()))?;
        Ok(())
    }

    /// Current `AutoLoginUser`, if one is set. Read-only: never vivifies
    /// missing sections.
    pub fn auto_login_user(&self) -> Option<String> {
        let content = fs::read_to_string(&self.session_file).ok()?;
        let config = Vdf::parse(&content).ok()?;
        if !config.key.eq_ignore_ascii_case(self.layout.root_key()) {
            return None;
        }
        let root = match &config.value {
            Value::Obj(obj) => obj,
            Value::Str(_) => return None,
        };
        let steam = tree::get_path(root, self.layout.steam_path())?;
        tree::get_str(steam, "AutoLoginUser")
            .filter(|user| !user.is_empty())
            .map(str::to_owned)
    }

    /// Forget an account: drop its login-history records and its stored
    /// credentials. The halves are independent; failures are logged and
    /// reflected in the report, not escalated.
    pub fn remove_account(&self, account_name: &str) -> RemovalReport {
        let history_removed = match self.remove_login_entries(account_name) {
            Ok(count) => count,
            Err(err) => {
                warn!("login history for {account_name} not removed: {err:#}");
                0
            }
        };
        let credentials_removed = match self.remove_stored_credentials(account_name) {
            Ok(removed) => removed,
            Err(err) => {
                warn!("stored credentials for {account_name} not removed: {err:#}");
                false
            }
        };
        RemovalReport {
            history_removed,
            credentials_removed,
        }
    }

    /// Removes every record whose AccountName matches. The login-history
    /// key is a session identifier, not the account name, so duplicates
    /// are possible and are all dropped rather than just the first hit.
    fn remove_login_entries(&self, account_name: &str) -> Result<usize> {
        let content = fs::read_to_string(&self.login_users)
            .with_context(|| format!("Failed to read {}", self.login_users.display()))?;
        let mut history = Vdf::parse(&content)
            .with_context(|| format!("Failed to parse {}", self.login_users.display()))?;

        if !history.key.eq_ignore_ascii_case("users") {
            return Err(SteamError::Structure {
                key: history.key.to_string(),
            }
            .into());
        }
        let users = match &mut history.value {
            Value::Obj(obj) => obj,
            Value::Str(_) => {
                return Err(SteamError::Structure {
                    key: "users".to_string(),
                }
                .into());
            }
        };

        let doomed: Vec<String> = users
            .iter()
            .filter_map(|(steam_id, values)| {
                let entry = values.first().and_then(|value| match value {
                    Value::Obj(obj) => Some(obj),
                    Value::Str(_) => None,
                })?;
                let name = tree::get_str(entry, "AccountName")?;
                (name == account_name).then(|| steam_id.to_string())
            })
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        for steam_id in &doomed {
            users.remove(steam_id.as_str());
        }
        if doomed.len() > 1 {
            info!("{account_name} had {} login history records", doomed.len());
        }

        fs::write(&self.login_users, history.to_string())
            .with_context(|| format!("Failed to write {}", self.login_users.display()))?;
        Ok(doomed.len())
    }

    fn remove_stored_credentials(&self, account_name: &str) -> Result<bool> {
        let content = fs::read_to_string(&self.session_file)
            .with_context(|| format!("Failed to read {}", self.session_file.display()))?;
        let mut config = Vdf::parse(&content)
            .with_context(|| format!("Failed to parse {}", self.session_file.display()))?;

        let removed = {
            let steam = self.steam_node(&mut config)?;
            let accounts = tree::ensure_section(steam, "Accounts")?;
            tree::remove_key(accounts, account_name)
        };
        if removed {
            fs::write(&self.session_file, config.to_string())
                .with_context(|| format!("Failed to write {}", self.session_file.display()))?;
        }
        Ok(removed)
    }

    /// The per-application settings node of the session file, vivifying
    /// intermediate sections along the layout's fixed path.
    fn steam_node<'a, 'text>(
        &self,
        config: &'a mut Vdf<'text>,
    ) -> Result<&'a mut Obj<'text>, SteamError> {
        let root_key = self.layout.root_key();
        if !config.key.eq_ignore_ascii_case(root_key) {
            return Err(SteamError::Structure {
                key: config.key.to_string(),
            });
        }
        let root = match &mut config.value {
            Value::Obj(obj) => obj,
            Value::Str(_) => {
                return Err(SteamError::Structure {
                    key: root_key.to_string(),
                });
            }
        };
        tree::ensure_path(root, self.layout.steam_path())
    }
}

/// Probe the conventional install locations, preferring any that already
/// contains a `config` directory; a bare `~/.local/share/Steam` is the
/// last resort before giving up.
fn find_root(home: &Path) -> Result<PathBuf, SteamError> {
    let candidates = [
        home.join(".steam/steam"),
        home.join(".local/share/Steam"),
        home.join(".var/app/com.valvesoftware.Steam/.steam/steam"),
    ];
    for candidate in &candidates {
        if candidate.is_dir() && candidate.join("config").is_dir() {
            return Ok(candidate.clone());
        }
    }

    let fallback = home.join(".local/share/Steam");
    if fallback.exists() {
        return Ok(fallback);
    }
    Err(SteamError::RootNotFound)
}
