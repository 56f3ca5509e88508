use std::collections::HashMap;

use serde::Deserialize;

/// `loginusers.vdf` under its `users` root key: one record per SteamID64.
#[derive(Debug, Deserialize)]
pub struct LoginHistory {
    #[serde(flatten)]
    pub users: HashMap<String, LoginEntry>,
}

/// The login-history fields we read; everything else the client records
/// (offline-mode flags, MostRecent, ...) is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginEntry {
    #[serde(rename = "AccountName")]
    pub account_name: Option<String>,
    #[serde(rename = "PersonaName")]
    pub persona_name: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<String>,
}
