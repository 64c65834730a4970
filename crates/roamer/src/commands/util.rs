//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use roamer_config::Config;
use roamer_core::{
    Command as CoreCommand, CommandResult, ConfigStore, Controller, Drivers, JsonFileStore,
    NetworkConfig, NetworkId, Uid,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Session ──────────────────────────────────────────────────────────

/// A running controller over the on-disk store, for one CLI invocation.
///
/// The CLI drives no radio, so the engine gets the null drivers: scans
/// and connects are accepted and dropped, and only the decisions and
/// the persisted store are observable.
pub struct Session {
    pub controller: Controller,
    pub store_path: PathBuf,
    pub uid: Uid,
}

impl Session {
    pub async fn open(cfg: &Config, global: &GlobalOpts) -> Result<Self, CliError> {
        let engine_config = cfg.to_engine_config()?;
        let store_path = global.store.clone().unwrap_or_else(|| cfg.state_path());
        tracing::debug!(path = %store_path.display(), uid = global.uid, "opening network store");

        let store = ConfigStore::load(
            Box::new(JsonFileStore::new(&store_path)),
            engine_config.store.clone(),
        )
        .map_err(|e| CliError::from(e).with_store_path(&store_path))?;

        let controller = Controller::new(engine_config, store, Drivers::null());
        controller.start().await?;
        Ok(Self {
            controller,
            store_path,
            uid: global.uid,
        })
    }

    /// Execute a command as the caller's uid.
    pub async fn execute(&self, command: CoreCommand) -> Result<CommandResult, CliError> {
        Ok(self.controller.execute_as(self.uid, command).await?)
    }

    pub async fn close(&self) {
        self.controller.shutdown().await;
    }
}

// ── Lookups ──────────────────────────────────────────────────────────

/// Look a network id up in the current snapshot.
pub fn find_network(session: &Session, raw: u32) -> Result<Arc<NetworkConfig>, CliError> {
    let id = NetworkId::new(raw);
    session
        .controller
        .networks_snapshot()
        .iter()
        .find(|n| n.id == id)
        .cloned()
        .ok_or_else(|| CliError::NotFound {
            resource_type: "network".into(),
            identifier: raw.to_string(),
            list_command: "networks list".into(),
        })
}

// ── Configuration ────────────────────────────────────────────────────

/// The config file this invocation reads: `--config`, else the platform path.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(roamer_config::config_path)
}

pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(roamer_config::load_config_from(&config_file(global))?)
}

// ── Prompts ──────────────────────────────────────────────────────────

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Render a wall-clock millisecond timestamp as RFC 3339.
pub fn format_millis(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map_or_else(|| ms.to_string(), |t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn millis_render_as_utc() {
        assert_eq!(format_millis(1_700_000_000_000), "2023-11-14T22:13:20Z");
    }
}
