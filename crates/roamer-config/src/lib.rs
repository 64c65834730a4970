//! Configuration for the roamer tools.
//!
//! One TOML file holding the state file location, CLI output defaults and
//! engine tuning, layered with `ROAMER_*` environment overrides and
//! translated into `roamer_core::EngineConfig`. Every key is optional;
//! an empty file yields the built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use roamer_core::{AutoJoinConfig, EngineConfig, ScheduleConfig, SelectorConfig, StoreConfig};

const STATE_FILE: &str = "networks.json";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Saved network state file. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub selector: SelectorSection,

    #[serde(default)]
    pub schedule: ScheduleSection,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub autojoin: AutoJoinSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// Selector thresholds and awards. RSSI values in dBm.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorSection {
    pub min_reselection_interval_secs: u64,
    pub enable_selection_when_associated: bool,
    pub qualified_rssi_24: i32,
    pub qualified_rssi_5: i32,
    pub saturated_rssi_24: i32,
    pub saturated_rssi_5: i32,
    pub minimum_rssi_24: i32,
    pub minimum_rssi_5: i32,
    pub rssi_score_slope: i32,
    pub rssi_score_offset: i32,
    pub band_award_5ghz: i32,
    pub current_network_boost: i32,
    pub same_bssid_award: i32,
    pub last_selection_award: i32,
    pub passpoint_security_award: i32,
    pub security_award: i32,
    pub bssid_blacklist_threshold: u32,
    pub bssid_blacklist_expiry_secs: u64,
}

impl Default for SelectorSection {
    fn default() -> Self {
        Self::from(&SelectorConfig::default())
    }
}

impl From<&SelectorConfig> for SelectorSection {
    fn from(c: &SelectorConfig) -> Self {
        Self {
            min_reselection_interval_secs: c.min_reselection_interval.as_secs(),
            enable_selection_when_associated: c.enable_selection_when_associated,
            qualified_rssi_24: c.qualified_rssi_24,
            qualified_rssi_5: c.qualified_rssi_5,
            saturated_rssi_24: c.saturated_rssi_24,
            saturated_rssi_5: c.saturated_rssi_5,
            minimum_rssi_24: c.minimum_rssi_24,
            minimum_rssi_5: c.minimum_rssi_5,
            rssi_score_slope: c.rssi_score_slope,
            rssi_score_offset: c.rssi_score_offset,
            band_award_5ghz: c.band_award_5ghz,
            current_network_boost: c.current_network_boost,
            same_bssid_award: c.same_bssid_award,
            last_selection_award: c.last_selection_award,
            passpoint_security_award: c.passpoint_security_award,
            security_award: c.security_award,
            bssid_blacklist_threshold: c.bssid_blacklist_threshold,
            bssid_blacklist_expiry_secs: c.bssid_blacklist_expiry.as_secs(),
        }
    }
}

impl SelectorSection {
    fn to_core(&self) -> Result<SelectorConfig, ConfigError> {
        for (band, minimum, qualified, saturated) in [
            ("24", self.minimum_rssi_24, self.qualified_rssi_24, self.saturated_rssi_24),
            ("5", self.minimum_rssi_5, self.qualified_rssi_5, self.saturated_rssi_5),
        ] {
            if !(minimum <= qualified && qualified <= saturated) {
                return Err(invalid(
                    &format!("selector.qualified_rssi_{band}"),
                    format!(
                        "expected minimum <= qualified <= saturated, got {minimum} / {qualified} / {saturated}"
                    ),
                ));
            }
        }
        if self.rssi_score_slope <= 0 {
            return Err(invalid("selector.rssi_score_slope", "must be positive"));
        }
        if self.bssid_blacklist_threshold == 0 {
            return Err(invalid("selector.bssid_blacklist_threshold", "must be at least 1"));
        }

        Ok(SelectorConfig {
            min_reselection_interval: Duration::from_secs(self.min_reselection_interval_secs),
            enable_selection_when_associated: self.enable_selection_when_associated,
            qualified_rssi_24: self.qualified_rssi_24,
            qualified_rssi_5: self.qualified_rssi_5,
            saturated_rssi_24: self.saturated_rssi_24,
            saturated_rssi_5: self.saturated_rssi_5,
            minimum_rssi_24: self.minimum_rssi_24,
            minimum_rssi_5: self.minimum_rssi_5,
            rssi_score_slope: self.rssi_score_slope,
            rssi_score_offset: self.rssi_score_offset,
            band_award_5ghz: self.band_award_5ghz,
            current_network_boost: self.current_network_boost,
            same_bssid_award: self.same_bssid_award,
            last_selection_award: self.last_selection_award,
            passpoint_security_award: self.passpoint_security_award,
            security_award: self.security_award,
            bssid_blacklist_threshold: self.bssid_blacklist_threshold,
            bssid_blacklist_expiry: Duration::from_secs(self.bssid_blacklist_expiry_secs),
        })
    }
}

/// Scan cadence and retry budget, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub periodic_scan_interval_secs: u64,
    pub pno_scan_interval_secs: u64,
    pub watchdog_interval_secs: u64,
    pub restart_scan_delay_secs: u64,
    pub max_scan_restarts: u32,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        let c = ScheduleConfig::default();
        Self {
            periodic_scan_interval_secs: c.periodic_scan_interval.as_secs(),
            pno_scan_interval_secs: c.pno_scan_interval.as_secs(),
            watchdog_interval_secs: c.watchdog_interval.as_secs(),
            restart_scan_delay_secs: c.restart_scan_delay.as_secs(),
            max_scan_restarts: c.max_scan_restarts,
        }
    }
}

impl ScheduleSection {
    fn to_core(&self) -> Result<ScheduleConfig, ConfigError> {
        for (field, secs) in [
            ("schedule.periodic_scan_interval_secs", self.periodic_scan_interval_secs),
            ("schedule.pno_scan_interval_secs", self.pno_scan_interval_secs),
            ("schedule.watchdog_interval_secs", self.watchdog_interval_secs),
        ] {
            if secs == 0 {
                return Err(invalid(field, "must be at least 1 second"));
            }
        }
        Ok(ScheduleConfig {
            periodic_scan_interval: Duration::from_secs(self.periodic_scan_interval_secs),
            pno_scan_interval: Duration::from_secs(self.pno_scan_interval_secs),
            watchdog_interval: Duration::from_secs(self.watchdog_interval_secs),
            restart_scan_delay: Duration::from_secs(self.restart_scan_delay_secs),
            max_scan_restarts: self.max_scan_restarts,
        })
    }
}

/// Scan cache sizing and linkage heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSection {
    pub scan_cache_capacity: usize,
    pub scan_result_max_age_secs: u64,
    pub link_bssid_prefix_len: usize,
    pub link_max_cache_entries: usize,
    pub link_requires_identical_psk: bool,
}

impl Default for StoreSection {
    fn default() -> Self {
        let c = StoreConfig::default();
        Self {
            scan_cache_capacity: c.scan_cache_capacity,
            scan_result_max_age_secs: c.scan_result_max_age.as_secs(),
            link_bssid_prefix_len: c.link_bssid_prefix_len,
            link_max_cache_entries: c.link_max_cache_entries,
            link_requires_identical_psk: c.link_requires_identical_psk,
        }
    }
}

impl StoreSection {
    fn to_core(&self) -> Result<StoreConfig, ConfigError> {
        if self.scan_cache_capacity == 0 {
            return Err(invalid("store.scan_cache_capacity", "must be at least 1"));
        }
        // A MAC address is 17 characters long.
        if self.link_bssid_prefix_len == 0 || self.link_bssid_prefix_len > 17 {
            return Err(invalid("store.link_bssid_prefix_len", "must be between 1 and 17"));
        }
        Ok(StoreConfig {
            scan_cache_capacity: self.scan_cache_capacity,
            scan_result_max_age: Duration::from_secs(self.scan_result_max_age_secs),
            link_bssid_prefix_len: self.link_bssid_prefix_len,
            link_max_cache_entries: self.link_max_cache_entries,
            link_requires_identical_psk: self.link_requires_identical_psk,
        })
    }
}

/// Connect choice buckets and the auto-join rate limit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AutoJoinSection {
    pub connect_choice_min_rssi: i32,
    pub weak_preference_gap: i32,
    pub moderate_preference_gap: i32,
    pub max_connection_attempts: usize,
    pub connection_attempt_window_secs: u64,
}

impl Default for AutoJoinSection {
    fn default() -> Self {
        let c = AutoJoinConfig::default();
        Self {
            connect_choice_min_rssi: c.connect_choice_min_rssi,
            weak_preference_gap: c.weak_preference_gap,
            moderate_preference_gap: c.moderate_preference_gap,
            max_connection_attempts: c.max_connection_attempts,
            connection_attempt_window_secs: c.connection_attempt_window.as_secs(),
        }
    }
}

impl AutoJoinSection {
    fn to_core(&self) -> Result<AutoJoinConfig, ConfigError> {
        if self.weak_preference_gap < self.moderate_preference_gap {
            return Err(invalid(
                "autojoin.weak_preference_gap",
                "must not be smaller than moderate_preference_gap",
            ));
        }
        if self.max_connection_attempts == 0 {
            return Err(invalid("autojoin.max_connection_attempts", "must be at least 1"));
        }
        Ok(AutoJoinConfig {
            connect_choice_min_rssi: self.connect_choice_min_rssi,
            weak_preference_gap: self.weak_preference_gap,
            moderate_preference_gap: self.moderate_preference_gap,
            max_connection_attempts: self.max_connection_attempts,
            connection_attempt_window: Duration::from_secs(self.connection_attempt_window_secs),
        })
    }
}

impl Config {
    /// Validate the tuning sections and build the engine configuration.
    pub fn to_engine_config(&self) -> Result<EngineConfig, ConfigError> {
        Ok(EngineConfig {
            selector: self.selector.to_core()?,
            schedule: self.schedule.to_core()?,
            store: self.store.to_core()?,
            autojoin: self.autojoin.to_core()?,
        })
    }

    /// The saved network state file: `store_path`, or `networks.json`
    /// in the platform data directory.
    pub fn state_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(default_state_path)
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "roamer", "roamer")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the saved network state file.
pub fn default_state_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".local/share").join(STATE_FILE),
        |dirs| dirs.data_dir().join(STATE_FILE),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("roamer");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file is not an error.
///
/// Environment keys use `__` between section and field, e.g.
/// `ROAMER_SELECTOR__QUALIFIED_RSSI_24=-70` or `ROAMER_STORE_PATH=...`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ROAMER_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_match_engine_defaults() {
        let engine = Config::default().to_engine_config().unwrap();
        assert_eq!(engine, EngineConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
store_path = "/tmp/roamer-networks.json"

[selector]
qualified_rssi_24 = -70
min_reselection_interval_secs = 30

[autojoin]
max_connection_attempts = 3
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.state_path(), PathBuf::from("/tmp/roamer-networks.json"));
        assert_eq!(config.defaults.output, "table");

        let engine = config.to_engine_config().unwrap();
        assert_eq!(engine.selector.qualified_rssi_24, -70);
        assert_eq!(engine.selector.qualified_rssi_5, -70);
        assert_eq!(engine.selector.min_reselection_interval, Duration::from_secs(30));
        assert_eq!(engine.autojoin.max_connection_attempts, 3);
        assert_eq!(engine.schedule, ScheduleConfig::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.selector, SelectorSection::default());
        assert!(config.store_path.is_none());
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let config = Config {
            selector: SelectorSection {
                qualified_rssi_5: -90,
                ..SelectorSection::default()
            },
            ..Config::default()
        };
        let err = config.to_engine_config().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation { ref field, .. } if field == "selector.qualified_rssi_5"
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = Config {
            schedule: ScheduleSection {
                periodic_scan_interval_secs: 0,
                ..ScheduleSection::default()
            },
            ..Config::default()
        };
        assert!(config.to_engine_config().is_err());
    }

    #[test]
    fn saved_config_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            store_path: Some(dir.path().join("state.json")),
            defaults: Defaults {
                output: "json".into(),
                color: "never".into(),
            },
            ..Config::default()
        };

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
