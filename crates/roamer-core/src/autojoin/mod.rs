// ── AutoJoin bookkeeping ──
//
// The pieces of the join path that sit between the selector and the
// station driver: how strongly a user pick overrides each alternative,
// how often the engine may start a connection on its own, the PNO
// network list and the engine counters.

mod compare;

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::millis;
use crate::config::{AutoJoinConfig, ScheduleConfig, SelectorConfig};
use crate::driver::{NetworkScorer, PnoNetwork, PnoSettings};
use crate::model::{NetworkConfig, NetworkId, PreferenceStrength};
use crate::store::ConfigStore;

pub use compare::{compare_networks, compare_networks_with_scorer, rank_networks};

/// Counters exposed through `Controller::metrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineMetrics {
    pub scans_started: u64,
    pub scan_failures: u64,
    pub selections: u64,
    pub roams: u64,
    pub connects: u64,
    /// Auto-join attempts dropped by the rate limit.
    pub skipped_attempts: u64,
    /// Watchdog scans that found nothing PNO had missed.
    pub pno_good: u64,
    /// Watchdog scans that found a candidate PNO should have reported.
    pub pno_bad: u64,
}

#[derive(Debug)]
pub struct AutoJoin {
    config: AutoJoinConfig,
    attempts: VecDeque<u64>,
    pub metrics: EngineMetrics,
}

impl AutoJoin {
    pub fn new(config: AutoJoinConfig) -> Self {
        Self {
            config,
            attempts: VecDeque::new(),
            metrics: EngineMetrics::default(),
        }
    }

    pub fn config(&self) -> &AutoJoinConfig {
        &self.config
    }

    pub fn update_config(&mut self, config: AutoJoinConfig) {
        self.config = config;
    }

    // ── Connect choice strength ──────────────────────────────────────

    /// Strength of the preference for `chosen` over `alternative`, from
    /// the gap between their best fresh RSSI readings. `None` when the
    /// alternative is too weak for the pick to mean anything.
    pub fn preference_strength(
        &self,
        store: &ConfigStore,
        chosen: NetworkId,
        alternative: &NetworkConfig,
        now_ms: u64,
    ) -> Option<PreferenceStrength> {
        let other = store.visibility(alternative.id, now_ms).best();
        if other < self.config.connect_choice_min_rssi {
            debug!(network = %alternative.id, rssi = other, "alternative too weak to record");
            return None;
        }
        let gap = store.visibility(chosen, now_ms).best() - other;
        Some(if gap >= self.config.weak_preference_gap {
            PreferenceStrength::Weak
        } else if gap >= self.config.moderate_preference_gap {
            PreferenceStrength::Moderate
        } else {
            PreferenceStrength::Strong
        })
    }

    /// [`preference_strength`](Self::preference_strength) for every saved
    /// network other than `chosen`.
    pub fn preference_strengths(
        &self,
        store: &ConfigStore,
        chosen: NetworkId,
        now_ms: u64,
    ) -> HashMap<NetworkId, PreferenceStrength> {
        store
            .all_networks()
            .filter(|n| n.id != chosen)
            .filter_map(|n| {
                self.preference_strength(store, chosen, n, now_ms)
                    .map(|s| (n.id, s))
            })
            .collect()
    }

    // ── Rate limit ───────────────────────────────────────────────────

    /// Record an auto-initiated connection attempt. Returns false, and
    /// records nothing, when the window is already full.
    pub fn try_attempt(&mut self, now_ms: u64) -> bool {
        let window = millis(self.config.connection_attempt_window);
        while self
            .attempts
            .front()
            .is_some_and(|at| now_ms.saturating_sub(*at) >= window)
        {
            self.attempts.pop_front();
        }
        if self.attempts.len() >= self.config.max_connection_attempts {
            warn!(
                attempts = self.attempts.len(),
                "too many connection attempts; skipping"
            );
            self.metrics.skipped_attempts += 1;
            return false;
        }
        self.attempts.push_back(now_ms);
        true
    }

    pub fn clear_attempts(&mut self) {
        self.attempts.clear();
    }

    // ── PNO ──────────────────────────────────────────────────────────

    /// Enabled saved networks, most preferred first.
    pub fn pno_networks(
        store: &ConfigStore,
        scorer: Option<&dyn NetworkScorer>,
        now_ms: u64,
    ) -> Vec<PnoNetwork> {
        let networks: Vec<&NetworkConfig> = store
            .configured_networks()
            .filter(|n| n.status.is_enabled())
            .collect();
        rank_networks(networks, store, scorer, now_ms)
            .into_iter()
            .map(|n| PnoNetwork {
                ssid: n.ssid.clone(),
                security: n.security,
                hidden: n.hidden,
            })
            .collect()
    }

    pub fn pno_settings(
        selector: &SelectorConfig,
        schedule: &ScheduleConfig,
        networks: Vec<PnoNetwork>,
    ) -> PnoSettings {
        PnoSettings {
            min_5ghz_rssi: selector.minimum_rssi_5,
            min_24ghz_rssi: selector.minimum_rssi_24,
            initial_score_max: selector.initial_score_max(),
            current_connection_bonus: selector.current_network_boost,
            same_network_bonus: selector.same_bssid_award,
            secure_bonus: selector.security_award,
            band_5ghz_bonus: selector.band_award_5ghz,
            interval: schedule.pno_scan_interval,
            networks,
        }
    }
}
