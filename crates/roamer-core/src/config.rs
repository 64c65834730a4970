// ── Runtime tuning ──
//
// Every tunable the engine reads lives here, grouped by the component
// that consumes it. Values are immutable once handed to the engine;
// runtime changes go through `Controller::update_config`.

use std::time::Duration;

/// Scoring thresholds and awards used by the network selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Minimum time between two selections while connected.
    pub min_reselection_interval: Duration,
    /// Whether a better network may be chosen while already associated.
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
    /// Award for the last user-selected network, reduced by one point
    /// per minute since the selection.
    pub last_selection_award: i32,
    pub passpoint_security_award: i32,
    pub security_award: i32,
    /// Association rejections before a BSSID is blacklisted.
    pub bssid_blacklist_threshold: u32,
    pub bssid_blacklist_expiry: Duration,
}

impl SelectorConfig {
    /// Largest RSSI-only score a result can reach.
    pub fn initial_score_max(&self) -> i32 {
        (self.saturated_rssi_24 + self.rssi_score_offset) * self.rssi_score_slope
    }

    /// Penalty for networks that reported no internet and never validated.
    ///
    /// Sized so that any network with internet access outranks one without.
    pub fn no_internet_penalty(&self) -> i32 {
        self.initial_score_max()
            + self.band_award_5ghz
            + self.current_network_boost
            + self.same_bssid_award
            + self.security_award
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_reselection_interval: Duration::from_secs(10),
            enable_selection_when_associated: true,
            qualified_rssi_24: -73,
            qualified_rssi_5: -70,
            saturated_rssi_24: -60,
            saturated_rssi_5: -57,
            minimum_rssi_24: -85,
            minimum_rssi_5: -82,
            rssi_score_slope: 4,
            rssi_score_offset: 85,
            band_award_5ghz: 40,
            current_network_boost: 16,
            same_bssid_award: 24,
            last_selection_award: 480,
            passpoint_security_award: 40,
            security_award: 80,
            bssid_blacklist_threshold: 3,
            bssid_blacklist_expiry: Duration::from_secs(30 * 60),
        }
    }
}

/// Scan cadence, retry budget and watchdog interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub periodic_scan_interval: Duration,
    pub pno_scan_interval: Duration,
    pub watchdog_interval: Duration,
    pub restart_scan_delay: Duration,
    pub max_scan_restarts: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            periodic_scan_interval: Duration::from_secs(20),
            pno_scan_interval: Duration::from_secs(160),
            watchdog_interval: Duration::from_secs(20 * 60),
            restart_scan_delay: Duration::from_secs(2),
            max_scan_restarts: 5,
        }
    }
}

/// Scan cache sizing and network linkage heuristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub scan_cache_capacity: usize,
    pub scan_result_max_age: Duration,
    /// Leading BSSID characters two APs must share to count as one box.
    pub link_bssid_prefix_len: usize,
    /// Prefix linking is only attempted when both caches are this small.
    pub link_max_cache_entries: usize,
    pub link_requires_identical_psk: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            scan_cache_capacity: 128,
            scan_result_max_age: Duration::from_secs(40),
            link_bssid_prefix_len: 16,
            link_max_cache_entries: 5,
            link_requires_identical_psk: false,
        }
    }
}

/// Connect-choice bookkeeping and connection attempt rate limiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoJoinConfig {
    /// Alternatives weaker than this are not recorded as overridden.
    pub connect_choice_min_rssi: i32,
    /// RSSI gap (chosen minus alternative) at or above which the
    /// recorded preference is weak.
    pub weak_preference_gap: i32,
    /// Gap at or above which the preference is moderate.
    pub moderate_preference_gap: i32,
    pub max_connection_attempts: usize,
    pub connection_attempt_window: Duration,
}

impl Default for AutoJoinConfig {
    fn default() -> Self {
        Self {
            connect_choice_min_rssi: -80,
            weak_preference_gap: 20,
            moderate_preference_gap: 5,
            max_connection_attempts: 6,
            connection_attempt_window: Duration::from_secs(4 * 60),
        }
    }
}

/// Complete engine configuration, handed to the controller at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub selector: SelectorConfig,
    pub schedule: ScheduleConfig,
    pub store: StoreConfig,
    pub autojoin: AutoJoinConfig,
}
