// ── Qualified network selection ──
//
// Ranks a scan batch against the saved networks and picks the access
// point to be on. Holds only the transient selection context (current
// network, current BSSID, last pass time) and the per-BSSID blacklist;
// all network state is read from and written back to the ConfigStore.

mod blacklist;
mod score;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use strum::Display;
use tracing::{debug, info, warn};

use crate::clock::millis;
use crate::config::SelectorConfig;
use crate::driver::NetworkScorer;
use crate::error::CoreError;
use crate::model::{
    Band, BandPreference, Bssid, ConnectChoice, NetworkConfig, NetworkId, NetworkKey,
    PreferenceStrength, ScanResult, SecurityClass, StatusUpdate, UNKNOWN_UID,
};
use crate::store::ConfigStore;

pub use blacklist::{BssidBlacklist, BssidBlacklistStatus};
pub use score::{ScoreBreakdown, ScoreContext, calculate_bssid_score};

// ── Request / result types ──────────────────────────────────────────

/// Link-layer state at the time of the pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStatus {
    pub debouncing: bool,
    pub connected: bool,
    pub disconnected: bool,
    pub supplicant_transient: bool,
}

/// What the station is associated with right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationInfo {
    pub network: NetworkId,
    pub bssid: Bssid,
    pub rssi: i32,
    pub frequency: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct SelectionRequest<'a> {
    /// Select even if the current network is good enough.
    pub force: bool,
    pub allow_untrusted: bool,
    pub scan_results: &'a [ScanResult],
    pub link: LinkStatus,
    pub association: Option<&'a AssociationInfo>,
}

/// How to get from the current association to the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectKind {
    /// The candidate is the BSSID already in use.
    AlreadyConnected,
    /// Same network or a linked one: move without a full reconnect.
    Roam,
    Connect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CandidateScore {
    Saved(ScoreBreakdown),
    /// Score reported by the reputation service.
    Untrusted { score: i32 },
}

impl CandidateScore {
    pub fn total(&self) -> i32 {
        match self {
            Self::Saved(breakdown) => breakdown.total,
            Self::Untrusted { score } => *score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub network: NetworkConfig,
    pub candidate: ScanResult,
    pub score: CandidateScore,
    pub kind: ConnectKind,
}

// ── NetworkSelector ─────────────────────────────────────────────────

pub struct NetworkSelector {
    config: SelectorConfig,
    current_network: Option<NetworkId>,
    current_bssid: Option<Bssid>,
    last_selection_ms: Option<u64>,
    blacklist: BssidBlacklist,
    /// Set when a sweep expired entries the driver still holds.
    blacklist_expired: bool,
    band_preference: BandPreference,
    scorer: Option<Arc<dyn NetworkScorer>>,
}

impl std::fmt::Debug for NetworkSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkSelector")
            .field("current_network", &self.current_network)
            .field("current_bssid", &self.current_bssid)
            .field("last_selection_ms", &self.last_selection_ms)
            .field("band_preference", &self.band_preference)
            .field("scorer", &self.scorer.is_some())
            .finish_non_exhaustive()
    }
}

/// Running best candidate of a pass.
struct Best {
    score: ScoreBreakdown,
    result: ScanResult,
    network: NetworkId,
}

impl NetworkSelector {
    pub fn new(config: SelectorConfig, scorer: Option<Arc<dyn NetworkScorer>>) -> Self {
        let blacklist =
            BssidBlacklist::new(config.bssid_blacklist_threshold, config.bssid_blacklist_expiry);
        Self {
            config,
            current_network: None,
            current_bssid: None,
            last_selection_ms: None,
            blacklist,
            blacklist_expired: false,
            band_preference: BandPreference::Auto,
            scorer,
        }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn update_config(&mut self, config: SelectorConfig) {
        self.blacklist
            .reconfigure(config.bssid_blacklist_threshold, config.bssid_blacklist_expiry);
        self.config = config;
    }

    pub fn current_network(&self) -> Option<NetworkId> {
        self.current_network
    }

    pub fn current_bssid(&self) -> Option<&Bssid> {
        self.current_bssid.as_ref()
    }

    pub fn last_selection_ms(&self) -> Option<u64> {
        self.last_selection_ms
    }

    pub fn blacklist(&self) -> &BssidBlacklist {
        &self.blacklist
    }

    pub fn band_preference(&self) -> BandPreference {
        self.band_preference
    }

    /// Returns whether the preference changed.
    pub fn set_user_preferred_band(&mut self, band: BandPreference) -> bool {
        let changed = self.band_preference != band;
        self.band_preference = band;
        changed
    }

    /// Forget the cached association, e.g. after the driver desynced.
    pub fn clear_current(&mut self) {
        self.current_network = None;
        self.current_bssid = None;
    }

    /// Track a failure against (or re-enable) a BSSID. Returns true
    /// when the call newly blacklisted it, or, for an enable, when the
    /// BSSID had been tracked.
    pub fn enable_bssid(&mut self, bssid: &Bssid, enable: bool, now_ms: u64) -> bool {
        self.blacklist.enable_bssid(bssid, enable, now_ms)
    }

    pub fn is_bssid_disabled(&self, bssid: &Bssid) -> bool {
        self.blacklist.is_disabled(bssid)
    }

    /// Whether a pass since the last call expired blacklist entries.
    pub fn take_blacklist_expired(&mut self) -> bool {
        std::mem::take(&mut self.blacklist_expired)
    }

    /// Lazy expiry. Expired BSSIDs also leave the store's supplicant list.
    fn sweep_blacklist(&mut self, store: &mut ConfigStore, now_ms: u64) {
        let expired = self.blacklist.update(now_ms);
        for bssid in &expired {
            store.unblacklist_bssid(bssid);
        }
        if !expired.is_empty() {
            self.blacklist_expired = true;
        }
    }

    // ── Selection pass ───────────────────────────────────────────────

    #[allow(clippy::too_many_lines)]
    pub fn select_qualified_network(
        &mut self,
        store: &mut ConfigStore,
        request: &SelectionRequest<'_>,
        now_ms: u64,
    ) -> Option<Selection> {
        if let Some(association) = request.association {
            if self.current_network.is_none() {
                self.current_network = Some(association.network);
            }
            if self.current_bssid.is_none() {
                self.current_bssid = Some(association.bssid.clone());
            }
        }

        if !request.force && !self.need_qualified_network_selection(store, request, now_ms) {
            debug!("current network is good enough; skipping selection");
            return None;
        }

        let last_selected = store.last_selected().and_then(|last| {
            store
                .network_by_key(&last.key)
                .map(|n| (n.id, last.timestamp_ms))
        });

        self.update_saved_network_selection_status(store, now_ms);
        self.sweep_blacklist(store, now_ms);

        let current = self.current_network.and_then(|id| store.network(id).cloned());
        let mut best: Option<Best> = None;
        let mut untrusted: Option<(i32, &ScanResult)> = None;
        let mut breakdowns: HashMap<NetworkId, ScoreBreakdown> = HashMap::new();
        let mut unscored: Vec<NetworkKey> = Vec::new();
        let mut skipped = SkipCounts::default();

        for result in request.scan_results {
            if result.ssid.is_empty() {
                skipped.no_ssid += 1;
                continue;
            }
            if store.is_bssid_blacklisted(&result.bssid)
                || self.blacklist.is_disabled(&result.bssid)
            {
                debug!(bssid = %result.bssid, ssid = %result.ssid, "bssid is blacklisted");
                skipped.blacklisted += 1;
                continue;
            }
            if self.below_floor(result) {
                skipped.low_signal += 1;
                continue;
            }
            if let Some(scorer) = &self.scorer {
                if scorer.network_score(result).is_none() {
                    unscored.push(result.network_key());
                }
            }

            let saved = store
                .update_saved_network_with_new_scan_detail(result)
                .filter(|ids| {
                    !(ids.len() == 1
                        && ids
                            .first()
                            .and_then(|id| store.network(*id))
                            .is_some_and(|n| n.ephemeral))
                });
            let Some(ids) = saved else {
                skipped.not_saved += 1;
                if request.allow_untrusted {
                    if let Some(score) = self.scorer.as_ref().and_then(|s| s.network_score(result)) {
                        if untrusted.is_none_or(|(best_score, _)| score > best_score) {
                            debug!(bssid = %result.bssid, score, "new untrusted candidate");
                            untrusted = Some((score, result));
                        }
                    }
                }
                continue;
            };

            let mut highest: Option<(ScoreBreakdown, NetworkId)> = None;
            for id in ids {
                let Some(network) = store.network(id) else {
                    continue;
                };
                let eligible = network.status.is_enabled() && !network.rejects_bssid(result);
                let breakdown = eligible.then(|| {
                    let ctx = ScoreContext {
                        config: &self.config,
                        current_network: current.as_ref(),
                        current_bssid: self.current_bssid.as_ref(),
                        last_selected_ms: last_selected
                            .filter(|(last_id, _)| *last_id == id)
                            .map(|(_, at)| at),
                        now_ms,
                    };
                    calculate_bssid_score(result, network, &ctx)
                });

                let Some(status) = store.status_mut(id) else {
                    continue;
                };
                status.mark_seen();
                let Some(breakdown) = breakdown else {
                    continue;
                };
                debug!(
                    network = %id,
                    bssid = %result.bssid,
                    rssi = result.level(),
                    score = breakdown.total,
                    "scored candidate"
                );
                if status.candidate_score().is_none_or(|s| breakdown.total > s) {
                    breakdowns.insert(id, breakdown);
                }
                status.offer_candidate(result, breakdown.total);
                if highest.is_none_or(|(h, _)| breakdown.total > h.total) {
                    highest = Some((breakdown, id));
                }
            }

            let Some((score, network)) = highest else {
                continue;
            };
            let better = best.as_ref().is_none_or(|b| {
                score.total > b.score.total
                    || (score.total == b.score.total && result.level() > b.result.level())
            });
            if better {
                best = Some(Best {
                    score,
                    result: result.clone(),
                    network,
                });
            }
        }

        if let Some(scorer) = &self.scorer {
            if !unscored.is_empty() {
                scorer.request_scores(&unscored);
            }
        }
        debug!(
            no_ssid = skipped.no_ssid,
            blacklisted = skipped.blacklisted,
            low_signal = skipped.low_signal,
            not_saved = skipped.not_saved,
            "selection pass filtered scan results"
        );

        let (network_id, candidate, score) = match best {
            Some(best) => {
                let (id, result) = resolve_connect_choice(store, best.network, best.result);
                let score = breakdowns.get(&id).copied().unwrap_or(best.score);
                (id, result, CandidateScore::Saved(score))
            }
            None if request.allow_untrusted => {
                let (score, result) = untrusted?;
                let id = self.materialize_untrusted(store, result)?;
                (id, result.clone(), CandidateScore::Untrusted { score })
            }
            None => {
                debug!("no candidate found");
                return None;
            }
        };

        let network = store.network(network_id)?.clone();
        let kind = if self.current_bssid.as_ref() == Some(&candidate.bssid) {
            ConnectKind::AlreadyConnected
        } else if current.as_ref().is_some_and(|c| c.is_same_or_linked(&network)) {
            ConnectKind::Roam
        } else {
            ConnectKind::Connect
        };
        info!(
            network = %network.id,
            ssid = %network.ssid,
            bssid = %candidate.bssid,
            score = score.total(),
            kind = %kind,
            "selected network"
        );

        self.current_bssid = Some(candidate.bssid.clone());
        self.current_network = Some(network.id);
        self.last_selection_ms = Some(now_ms);

        Some(Selection {
            network,
            candidate,
            score,
            kind,
        })
    }

    /// Record that the user explicitly picked `id`.
    ///
    /// The network is re-enabled if needed. With `persist`, every other
    /// network seen in the last pass records `id` as its connect choice,
    /// with the strength `strength` reports; `None` leaves that network
    /// alone. Returns whether any connect choice changed.
    pub fn user_select_network<F>(
        &mut self,
        store: &mut ConfigStore,
        id: NetworkId,
        persist: bool,
        now_ms: u64,
        strength: F,
    ) -> Result<bool, CoreError>
    where
        F: Fn(&NetworkConfig) -> Option<PreferenceStrength>,
    {
        let selected = store.require(id)?;
        let key = selected.config_key();
        if !selected.status.is_enabled() {
            store.update_network_selection_status(id, StatusUpdate::Enable, now_ms)?;
        }
        if !persist {
            debug!(network = %id, "transient selection; connect choices untouched");
            return Ok(false);
        }

        let mut changed = store.clear_connect_choice(id)?;
        for other in store.network_ids() {
            if other == id {
                continue;
            }
            let Some(network) = store.network(other) else {
                continue;
            };
            if network.ephemeral || !network.status.seen_in_last_selection() {
                continue;
            }
            if network
                .status
                .connect_choice
                .as_ref()
                .is_some_and(|c| c.key == key)
            {
                continue;
            }
            let Some(preference) = strength(network) else {
                continue;
            };
            debug!(
                network = %other,
                choice = %key,
                strength = %preference,
                "recording connect choice"
            );
            store.set_connect_choice(
                other,
                ConnectChoice {
                    key: key.clone(),
                    timestamp_ms: now_ms,
                    strength: preference,
                },
            )?;
            changed = true;
        }
        Ok(changed)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn need_qualified_network_selection(
        &mut self,
        store: &ConfigStore,
        request: &SelectionRequest<'_>,
        now_ms: u64,
    ) -> bool {
        if request.scan_results.is_empty() {
            debug!("empty scan result");
            return false;
        }
        if request.link.debouncing {
            debug!("link is debouncing");
            return false;
        }

        if request.link.connected {
            if !self.config.enable_selection_when_associated {
                return false;
            }
            if let Some(last) = self.last_selection_ms {
                let gap = now_ms.saturating_sub(last);
                if gap < millis(self.config.min_reselection_interval) {
                    debug!(gap_ms = gap, "too soon after last selection");
                    return false;
                }
            }
            let Some(association) = request.association else {
                return false;
            };
            let Some(current) = store.network(association.network) else {
                // Connected but the network is unknown; wait for disconnect.
                return false;
            };
            if self.current_network.is_some_and(|id| id != current.id) {
                warn!(
                    expected = ?self.current_network,
                    actual = %current.id,
                    "supplicant switched network silently"
                );
                self.current_network = Some(current.id);
                self.current_bssid = Some(association.bssid.clone());
                return true;
            }
            self.current_network = Some(current.id);
            if self
                .current_bssid
                .as_ref()
                .is_some_and(|b| b != &association.bssid)
            {
                warn!(bssid = %association.bssid, "supplicant roamed silently");
                self.current_bssid = Some(association.bssid.clone());
                return true;
            }
            return !self.is_network_qualified(current, association);
        }

        if request.link.disconnected {
            self.clear_current();
            return !request.link.supplicant_transient;
        }

        debug!("neither connected nor disconnected");
        false
    }

    fn is_network_qualified(&self, network: &NetworkConfig, association: &AssociationInfo) -> bool {
        if network.ephemeral || network.is_open_network() {
            return false;
        }
        let band = Band::from_frequency(association.frequency);
        let band_mismatch = matches!(
            (self.band_preference, band),
            (BandPreference::FiveGhz, Some(Band::TwoPointFourGhz))
                | (BandPreference::TwoGhz, Some(Band::FiveGhz))
        );
        if band_mismatch {
            debug!(band = ?band, preference = %self.band_preference, "current band not preferred");
            return false;
        }
        let threshold = if band == Some(Band::FiveGhz) {
            self.config.qualified_rssi_5
        } else {
            self.config.qualified_rssi_24
        };
        association.rssi >= threshold
    }

    fn below_floor(&self, result: &ScanResult) -> bool {
        let level = result.level();
        match result.band() {
            Some(Band::TwoPointFourGhz) => level < self.config.minimum_rssi_24,
            Some(Band::FiveGhz) => level < self.config.minimum_rssi_5,
            None => level < self.config.minimum_rssi_24.max(self.config.minimum_rssi_5),
        }
    }

    fn update_saved_network_selection_status(&self, store: &mut ConfigStore, now_ms: u64) {
        for id in store.network_ids() {
            let temporarily_disabled = store
                .network(id)
                .is_some_and(|n| n.status.is_temporarily_disabled());
            if temporarily_disabled {
                store.try_enable_network(id, now_ms);
            }
        }
        store.reset_candidates();
    }

    fn materialize_untrusted(
        &self,
        store: &mut ConfigStore,
        result: &ScanResult,
    ) -> Option<NetworkId> {
        let existing = store
            .network_by_key(&result.config_key())
            .filter(|n| n.ephemeral)
            .map(|n| n.id);
        let id = if let Some(id) = existing {
            id
        } else {
            let mut network = store.network_from_scan_result(result);
            network.metered_hint = self
                .scorer
                .as_ref()
                .is_some_and(|s| s.metered_hint(result));
            match store.save_network(network, UNKNOWN_UID) {
                Ok(id) => {
                    info!(network = %id, ssid = %result.ssid, "new ephemeral candidate");
                    id
                }
                Err(e) => {
                    warn!(error = %e, ssid = %result.ssid, "could not save ephemeral network");
                    return None;
                }
            }
        };
        store.status_mut(id)?.set_candidate(result.clone());
        Some(id)
    }
}

#[derive(Default)]
struct SkipCounts {
    no_ssid: u32,
    blacklisted: u32,
    low_signal: u32,
    not_saved: u32,
}

/// Follow connect choices from `start`, moving to any network on the
/// chain that is enabled and has a candidate from this pass.
fn resolve_connect_choice(
    store: &mut ConfigStore,
    start: NetworkId,
    result: ScanResult,
) -> (NetworkId, ScanResult) {
    let mut chosen = (start, result);
    let mut visited = BTreeSet::from([start]);
    let mut cursor = start;

    loop {
        let Some(choice) = store
            .network(cursor)
            .and_then(|n| n.status.connect_choice.clone())
        else {
            break;
        };
        let Some(next) = store.network_by_key(&choice.key) else {
            warn!(network = %cursor, choice = %choice.key, "connect choice has no saved network");
            if let Err(e) = store.clear_connect_choice(cursor) {
                warn!(error = %e, "could not drop dangling connect choice");
            }
            break;
        };
        let next_id = next.id;
        if !visited.insert(next_id) {
            warn!(network = %next_id, "connect choice cycle");
            break;
        }
        if next.status.is_enabled() {
            if let Some(candidate) = next.status.candidate() {
                chosen = (next_id, candidate.clone());
            }
        }
        cursor = next_id;
    }

    if chosen.0 != start {
        debug!(from = %start, to = %chosen.0, "user connect choice overrides score");
    }
    chosen
}
