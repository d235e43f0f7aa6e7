//! Messaging configuration loaded from environment variables.
//!
//! All settings have defaults so a local session can start with zero
//! configuration.

use std::path::PathBuf;

use parley_shared::constants::{DEFAULT_SUBSCRIPTION_BUFFER, FALLBACK_DISPLAY_NAME};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// SQLite database file.
    /// Env: `PARLEY_DB_PATH`
    /// Default: platform data directory (`None` here).
    pub database_path: Option<PathBuf>,

    /// Identity to sign in as at startup.
    /// Env: `PARLEY_IDENTITY`
    /// Default: none.
    pub identity: Option<String>,

    /// Capacity of each live subscription's delivery channel.
    /// Env: `PARLEY_SUBSCRIPTION_BUFFER`
    /// Default: `32`
    pub subscription_buffer: usize,

    /// Label for participants with no profile and no listing.
    /// Env: `PARLEY_FALLBACK_NAME`
    /// Default: `"User"`
    pub fallback_display_name: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            identity: None,
            subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER,
            fallback_display_name: FALLBACK_DISPLAY_NAME.to_string(),
        }
    }
}

impl ChatConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("PARLEY_DB_PATH").filter(|p| !p.is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(identity) = lookup("PARLEY_IDENTITY").filter(|s| !s.trim().is_empty()) {
            config.identity = Some(identity.trim().to_string());
        }

        if let Some(val) = lookup("PARLEY_SUBSCRIPTION_BUFFER") {
            match val.parse::<usize>() {
                Ok(n) => config.subscription_buffer = n.max(1),
                Err(_) => {
                    tracing::warn!(
                        value = %val,
                        "Invalid PARLEY_SUBSCRIPTION_BUFFER, using default"
                    );
                }
            }
        }

        if let Some(name) = lookup("PARLEY_FALLBACK_NAME").filter(|s| !s.trim().is_empty()) {
            config.fallback_display_name = name;
        }

        config
    }
}
