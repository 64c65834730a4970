// ── Single-writer engine ──
//
// Owns every piece of mutable selection state: the store, the selector,
// the scheduler state and the autojoin bookkeeping. Exactly one task
// drives it, one message at a time, so no handler ever observes another
// one half done. Driver calls are fire-and-forget; their outcomes come
// back later as notifications.

use std::collections::VecDeque;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::alarm::AlarmService;
use crate::autojoin::{AutoJoin, EngineMetrics};
use crate::clock::Clock;
use crate::command::{
    Action, Command, CommandResult, ConnectionEvent, Decision, EngineEvent, Notification,
};
use crate::config::EngineConfig;
use crate::driver::{
    NetworkScorer, NullDriver, ScanBand, ScanDriver, ScanSettings, StationDriver,
};
use crate::error::CoreError;
use crate::model::{
    BandPreference, Bssid, DisableReason, NetworkConfig, NetworkId, SYSTEM_UID, ScanResult,
    StatusUpdate, Uid,
};
use crate::scheduler::{
    Effect, ScanKind, ScanMode, SchedulerEvent, SchedulerState, WifiState,
};
use crate::selector::{
    AssociationInfo, ConnectKind, LinkStatus, NetworkSelector, Selection, SelectionRequest,
};
use crate::store::ConfigStore;

/// External capabilities the engine calls out to.
#[derive(Clone)]
pub struct Drivers {
    pub scan: Arc<dyn ScanDriver>,
    pub station: Arc<dyn StationDriver>,
    pub scorer: Option<Arc<dyn NetworkScorer>>,
}

impl Drivers {
    /// Drivers that accept everything and do nothing; no scorer.
    pub fn null() -> Self {
        Self {
            scan: Arc::new(NullDriver),
            station: Arc::new(NullDriver),
            scorer: None,
        }
    }
}

impl std::fmt::Debug for Drivers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Drivers")
            .field("scorer", &self.scorer.is_some())
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of the engine, for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct EngineStatus {
    pub wifi_enabled: bool,
    pub screen_on: bool,
    pub wifi_state: WifiState,
    pub scan_mode: ScanMode,
    pub band: BandPreference,
    pub untrusted_allowed: bool,
    pub current_network: Option<NetworkId>,
    pub current_bssid: Option<Bssid>,
    pub blacklisted_bssids: Vec<Bssid>,
}

pub struct Engine {
    config: Arc<ArcSwap<EngineConfig>>,
    store: ConfigStore,
    selector: NetworkSelector,
    scheduler: SchedulerState,
    autojoin: AutoJoin,
    drivers: Drivers,
    clock: Arc<dyn Clock>,
    alarms: Box<dyn AlarmService>,
    association: Option<AssociationInfo>,
    link: LinkStatus,
    /// uid credited with the next successful connection.
    pending_connect_uid: Option<Uid>,
    outbox: Vec<EngineEvent>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("store", &self.store)
            .field("selector", &self.selector)
            .field("scheduler", &self.scheduler)
            .field("association", &self.association)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        store: ConfigStore,
        drivers: Drivers,
        clock: Arc<dyn Clock>,
        alarms: Box<dyn AlarmService>,
    ) -> Self {
        let mut selector = NetworkSelector::new(config.selector.clone(), drivers.scorer.clone());
        let preferences = store.preferences();
        selector.set_user_preferred_band(preferences.band);
        let scheduler = SchedulerState {
            band: preferences.band,
            untrusted_allowed: preferences.untrusted_allowed,
            ..SchedulerState::default()
        };
        let autojoin = AutoJoin::new(config.autojoin.clone());
        let mut store = store;
        store.update_config(config.store.clone());

        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            store,
            selector,
            scheduler,
            autojoin,
            drivers,
            clock,
            alarms,
            association: None,
            link: LinkStatus {
                disconnected: true,
                ..LinkStatus::default()
            },
            pending_connect_uid: None,
            outbox: Vec::new(),
        }
    }

    /// Bring scanning up for the initial state: Wi-Fi on, disconnected.
    pub fn start(&mut self) {
        info!(
            networks = self.store.configured_networks().count(),
            band = %self.scheduler.band,
            "engine starting"
        );
        self.feed(SchedulerEvent::ConnectionStateChanged(WifiState::Disconnected));
    }

    pub(crate) fn shared_config(&self) -> Arc<ArcSwap<EngineConfig>> {
        Arc::clone(&self.config)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> Arc<EngineConfig> {
        self.config.load_full()
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn selector(&self) -> &NetworkSelector {
        &self.selector
    }

    pub fn scheduler(&self) -> &SchedulerState {
        &self.scheduler
    }

    pub fn metrics(&self) -> EngineMetrics {
        self.autojoin.metrics
    }

    pub fn association(&self) -> Option<&AssociationInfo> {
        self.association.as_ref()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            wifi_enabled: self.scheduler.wifi_enabled,
            screen_on: self.scheduler.screen_on,
            wifi_state: self.scheduler.wifi_state,
            scan_mode: self.scheduler.mode,
            band: self.scheduler.band,
            untrusted_allowed: self.scheduler.untrusted_allowed,
            current_network: self.selector.current_network(),
            current_bssid: self.selector.current_bssid().cloned(),
            blacklisted_bssids: self.selector.blacklist().blacklisted(),
        }
    }

    /// Saved networks as users see them: ephemeral ones excluded.
    pub fn network_snapshot(&self) -> Vec<Arc<NetworkConfig>> {
        self.store
            .configured_networks()
            .map(|n| Arc::new(n.clone()))
            .collect()
    }

    /// Events produced since the last call.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Swap in a new configuration and push it to every component.
    pub fn update_config(&mut self, config: EngineConfig) {
        self.config.store(Arc::new(config));
        self.apply_config();
    }

    fn apply_config(&mut self) {
        let config = self.config.load_full();
        self.selector.update_config(config.selector.clone());
        self.store.update_config(config.store.clone());
        self.autojoin.update_config(config.autojoin.clone());
        info!("engine configuration updated");
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn handle_command(&mut self, uid: Uid, command: Command) -> Result<CommandResult, CoreError> {
        let now = self.clock.now_ms();
        debug!(uid, ?command, "handling command");
        match command {
            Command::SaveNetwork(request) => {
                let id = self.store.add_or_update_network(request, uid)?;
                self.outbox.push(EngineEvent::NetworksChanged);
                Ok(CommandResult::Saved(id))
            }
            Command::ForgetNetwork { id } => {
                let forgotten = self.store.forget_network(id, uid)?;
                if self.is_current(id) {
                    info!(network = %id, "forgot current network; disconnecting");
                    self.drivers.station.disconnect();
                    self.selector.clear_current();
                }
                self.outbox.push(EngineEvent::NetworksChanged);
                Ok(CommandResult::Forgotten(Box::new(forgotten)))
            }
            Command::EnableNetwork { id } => {
                self.store.check_permission(id, uid, "enable")?;
                let changed =
                    self.store
                        .update_network_selection_status(id, StatusUpdate::Enable, now)?;
                self.outbox.push(EngineEvent::NetworksChanged);
                Ok(CommandResult::Changed(changed))
            }
            Command::DisableNetwork { id } => {
                self.store.check_permission(id, uid, "disable")?;
                let changed = self.store.update_network_selection_status(
                    id,
                    StatusUpdate::Disable(DisableReason::ByUser),
                    now,
                )?;
                if self.is_current(id) {
                    self.drivers.station.disconnect();
                    self.selector.clear_current();
                }
                self.outbox.push(EngineEvent::NetworksChanged);
                Ok(CommandResult::Changed(changed))
            }
            Command::SelectNetwork { id, persistent } => {
                self.select_network(uid, id, persistent, now).map(CommandResult::Changed)
            }
            Command::EvaluateScan { results, force } => Ok(CommandResult::Decision(
                self.process_scan_results(ScanKind::Single, &results, force),
            )),
            Command::SetBandPreference(band) => {
                let changed = self.store.set_band_preference(band)?;
                self.selector.set_user_preferred_band(band);
                self.feed(SchedulerEvent::BandPreferenceChanged(band));
                Ok(CommandResult::Changed(changed))
            }
            Command::SetUntrustedAllowed(allowed) => {
                let changed = self.store.set_untrusted_allowed(allowed)?;
                self.feed(SchedulerEvent::UntrustedAllowedChanged(allowed));
                Ok(CommandResult::Changed(changed))
            }
            Command::SetWifiEnabled(enabled) => {
                let changed = self.scheduler.wifi_enabled != enabled;
                if !enabled {
                    self.selector.clear_current();
                    self.association = None;
                }
                self.feed(SchedulerEvent::WifiEnabledChanged(enabled));
                Ok(CommandResult::Changed(changed))
            }
            Command::ForceScan => {
                if !self.scheduler.wifi_enabled {
                    return Err(CoreError::invalid("wifi", "Wi-Fi is disabled"));
                }
                self.feed(SchedulerEvent::ForceScan);
                Ok(CommandResult::Ok)
            }
        }
    }

    fn select_network(
        &mut self,
        uid: Uid,
        id: NetworkId,
        persistent: bool,
        now: u64,
    ) -> Result<bool, CoreError> {
        self.store.check_permission(id, uid, "select")?;
        let strengths = self.autojoin.preference_strengths(&self.store, id, now);
        let changed = self.selector.user_select_network(
            &mut self.store,
            id,
            persistent,
            now,
            |network| strengths.get(&network.id).copied(),
        )?;
        if persistent {
            self.store.set_last_selected(id, now)?;
        }
        info!(network = %id, uid, persistent, "user selected network");

        self.autojoin.clear_attempts();
        self.pending_connect_uid = Some(uid);
        if let Some(target) = self.best_cached(id, now) {
            self.connect(id, &target);
        }
        self.feed(SchedulerEvent::UserSelectedNetwork);
        self.outbox.push(EngineEvent::NetworksChanged);
        Ok(changed)
    }

    // ── Notifications ────────────────────────────────────────────────

    pub fn handle_notification(&mut self, notification: Notification) {
        let now = self.clock.now_ms();
        match notification {
            Notification::ScanResults { kind, results } => {
                self.process_scan_results(kind, &results, false);
            }
            Notification::ScanFailed { kind } => {
                warn!(%kind, "scan failed");
                self.autojoin.metrics.scan_failures += 1;
                self.feed(SchedulerEvent::ScanFailed(kind));
            }
            Notification::Connection(event) => self.connection_changed(event, now),
            Notification::RssiChanged { rssi } => {
                if let Some(association) = self.association.as_mut() {
                    association.rssi = rssi;
                }
            }
            Notification::ScreenChanged { on } => self.feed(SchedulerEvent::ScreenChanged { on }),
            Notification::AssociationRejected { network, bssid } => {
                self.association_rejected(network, bssid, now);
            }
            Notification::ConnectionFailure { network, reason } => {
                if let Err(e) = self.store.update_network_selection_status(
                    network,
                    StatusUpdate::Disable(reason),
                    now,
                ) {
                    warn!(error = %e, network = %network, "could not record connection failure");
                }
                self.outbox.push(EngineEvent::NetworksChanged);
            }
            Notification::Validation {
                network,
                has_internet,
            } => {
                let result = if has_internet {
                    self.store.note_validated(network)
                } else {
                    self.store.note_no_internet(network)
                };
                if let Err(e) = result {
                    warn!(error = %e, network = %network, "could not record validation");
                }
                self.outbox.push(EngineEvent::NetworksChanged);
            }
            Notification::TimerFired { kind, generation } => {
                if self.alarms.accept(kind, generation) {
                    self.feed(SchedulerEvent::TimerFired(kind));
                }
            }
            Notification::ConfigUpdated => self.apply_config(),
        }
    }

    fn connection_changed(&mut self, event: ConnectionEvent, now: u64) {
        match event {
            ConnectionEvent::Connected {
                association,
                gateway,
                uid,
            } => {
                let id = association.network;
                if self.store.network(id).is_none() {
                    warn!(network = %id, "connected to a network the store does not know");
                    self.drivers.station.disconnect();
                    self.selector.clear_current();
                    self.association = None;
                    self.outbox.push(EngineEvent::Desync { network: id });
                    return;
                }
                let uid = Some(uid.or(self.pending_connect_uid.take()).unwrap_or(SYSTEM_UID));
                if let Err(e) = self.store.note_connected(id, uid, gateway) {
                    warn!(error = %e, network = %id, "could not record connection");
                }
                if let Err(e) =
                    self.store
                        .update_network_selection_status(id, StatusUpdate::Enable, now)
                {
                    warn!(error = %e, network = %id, "could not re-enable network");
                }
                if self.selector.enable_bssid(&association.bssid, true, now) {
                    self.push_blacklist();
                }
                self.store.clear_bssid_blacklist();
                info!(network = %id, bssid = %association.bssid, "connected");

                self.association = Some(association);
                self.link = LinkStatus {
                    connected: true,
                    ..LinkStatus::default()
                };
                self.outbox.push(EngineEvent::NetworksChanged);
                self.feed(SchedulerEvent::ConnectionStateChanged(WifiState::Connected));
            }
            ConnectionEvent::Disconnected { transient } => {
                self.association = None;
                self.link = LinkStatus {
                    disconnected: true,
                    supplicant_transient: transient,
                    ..LinkStatus::default()
                };
                self.feed(SchedulerEvent::ConnectionStateChanged(WifiState::Disconnected));
            }
            ConnectionEvent::Connecting => {
                self.link = LinkStatus::default();
                self.feed(SchedulerEvent::ConnectionStateChanged(WifiState::Transitioning));
            }
            ConnectionEvent::Debouncing => {
                self.link = LinkStatus {
                    debouncing: true,
                    ..LinkStatus::default()
                };
                self.feed(SchedulerEvent::ConnectionStateChanged(WifiState::Transitioning));
            }
        }
    }

    fn association_rejected(&mut self, network: NetworkId, bssid: Bssid, now: u64) {
        if let Err(e) = self.store.record_association_failure(network, &bssid, now) {
            warn!(error = %e, network = %network, "could not record association failure");
        }
        if self.selector.enable_bssid(&bssid, false, now) {
            self.store.blacklist_bssid(bssid.clone());
            self.push_blacklist();
            self.outbox.push(EngineEvent::BssidBlacklisted { bssid });
            self.feed(SchedulerEvent::BssidBlacklisted);
        }
        self.outbox.push(EngineEvent::NetworksChanged);
    }

    fn push_blacklist(&self) {
        let blacklisted = self.selector.blacklist().blacklisted();
        if !self.drivers.scan.set_bssid_blacklist(&blacklisted) {
            warn!(count = blacklisted.len(), "driver refused the bssid blacklist");
        }
    }

    // ── Selection ────────────────────────────────────────────────────

    fn process_scan_results(
        &mut self,
        kind: ScanKind,
        results: &[ScanResult],
        force: bool,
    ) -> Decision {
        let now = self.clock.now_ms();
        if kind == ScanKind::Pno {
            self.feed(SchedulerEvent::PnoResultsArrived);
        }
        if !self.scheduler.wifi_enabled {
            debug!("wifi disabled; ignoring scan results");
            return Decision {
                source: kind,
                selection: None,
                action: Action::None,
            };
        }

        let forced = force || self.scheduler.force_select;
        let association = self.association.clone();
        let request = SelectionRequest {
            force: forced,
            allow_untrusted: self.scheduler.untrusted_allowed,
            scan_results: results,
            link: self.link,
            association: association.as_ref(),
        };
        let selection = self
            .selector
            .select_qualified_network(&mut self.store, &request, now);
        if self.selector.take_blacklist_expired() {
            self.push_blacklist();
        }
        if self.scheduler.force_select {
            self.feed(SchedulerEvent::SelectionDone);
        }

        if kind == ScanKind::Watchdog {
            if selection.is_some() {
                self.autojoin.metrics.pno_bad += 1;
            } else {
                self.autojoin.metrics.pno_good += 1;
            }
        }

        let action = match &selection {
            Some(selection) => {
                self.autojoin.metrics.selections += 1;
                self.act_on(selection, now)
            }
            None => Action::None,
        };
        let decision = Decision {
            source: kind,
            selection,
            action,
        };
        self.outbox.push(EngineEvent::NetworksChanged);
        self.outbox.push(EngineEvent::Decision(decision.clone()));
        decision
    }

    fn act_on(&mut self, selection: &Selection, now: u64) -> Action {
        if selection.kind == ConnectKind::AlreadyConnected {
            return Action::AlreadyConnected;
        }
        if !self.autojoin.try_attempt(now) {
            return Action::RateLimited;
        }
        if self.pending_connect_uid.is_none() {
            self.pending_connect_uid = Some(SYSTEM_UID);
        }
        self.connect(selection.network.id, &selection.candidate)
    }

    /// Roam when the target is the current network or linked to it,
    /// otherwise start a fresh connection.
    fn connect(&mut self, id: NetworkId, target: &ScanResult) -> Action {
        let roam = self
            .association
            .as_ref()
            .and_then(|a| self.store.network(a.network))
            .zip(self.store.network(id))
            .is_some_and(|(current, next)| current.is_same_or_linked(next));

        if self
            .association
            .as_ref()
            .is_some_and(|a| a.bssid == target.bssid)
        {
            debug!(network = %id, bssid = %target.bssid, "already on target bssid");
            return Action::AlreadyConnected;
        }
        if roam {
            info!(network = %id, bssid = %target.bssid, "roaming");
            self.drivers.station.auto_roam(id, target);
            self.autojoin.metrics.roams += 1;
            Action::Roam
        } else {
            info!(network = %id, bssid = %target.bssid, "connecting");
            self.drivers.station.auto_connect(id, &target.bssid);
            self.autojoin.metrics.connects += 1;
            Action::Connect
        }
    }

    /// Strongest fresh, non-blacklisted BSSID of a saved network.
    fn best_cached(&self, id: NetworkId, now: u64) -> Option<ScanResult> {
        let max_age = self.store.config().scan_result_max_age;
        self.store
            .scan_cache(id)?
            .fresh(now, max_age)
            .filter(|c| !self.selector.is_bssid_disabled(&c.result.bssid))
            .max_by_key(|c| c.result.level())
            .map(|c| c.result.clone())
    }

    fn is_current(&self, id: NetworkId) -> bool {
        self.selector.current_network() == Some(id)
            || self.association.as_ref().is_some_and(|a| a.network == id)
    }

    // ── Scheduler plumbing ───────────────────────────────────────────

    /// Step the scheduler and run its effects. Effects may produce
    /// follow-up events (a refused scan is a failure), which are queued
    /// and stepped in order.
    fn feed(&mut self, event: SchedulerEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let config = self.config.load_full();
            let state = std::mem::take(&mut self.scheduler);
            let (next, effects) = state.step(event, &config.schedule);
            self.scheduler = next;
            for effect in effects {
                if let Some(follow_up) = self.run_effect(effect) {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    fn run_effect(&mut self, effect: Effect) -> Option<SchedulerEvent> {
        match effect {
            Effect::StartSingleScan { kind, band } => {
                let settings = self.scan_settings(band);
                let started = self.drivers.scan.start_scan(&settings);
                self.scan_started(kind, started)
            }
            Effect::StartPnoScan { mode, band } => {
                let now = self.clock.now_ms();
                let config = self.config.load_full();
                let networks =
                    AutoJoin::pno_networks(&self.store, self.drivers.scorer.as_deref(), now);
                let pno = AutoJoin::pno_settings(&config.selector, &config.schedule, networks);
                let settings = self.scan_settings(band);
                debug!(%mode, networks = pno.networks.len(), "starting pno scan");
                let started = self.drivers.scan.start_pno_scan(mode, &settings, &pno);
                self.scan_started(ScanKind::Pno, started)
            }
            Effect::StopPnoScan => {
                self.drivers.scan.stop_pno_scan();
                None
            }
            Effect::ArmTimer { kind, delay } => {
                self.alarms.arm(kind, delay);
                None
            }
            Effect::CancelTimer { kind } => {
                self.alarms.cancel(kind);
                None
            }
            Effect::GaveUp { kind } => {
                error!(%kind, "scan retries exhausted; waiting for the next trigger");
                self.outbox.push(EngineEvent::ScanGaveUp { kind });
                None
            }
        }
    }

    fn scan_started(&mut self, kind: ScanKind, started: bool) -> Option<SchedulerEvent> {
        if started {
            self.autojoin.metrics.scans_started += 1;
            Some(SchedulerEvent::ScanStarted(kind))
        } else {
            warn!(%kind, "driver refused to start scan");
            self.autojoin.metrics.scan_failures += 1;
            Some(SchedulerEvent::ScanFailed(kind))
        }
    }

    fn scan_settings(&self, band: ScanBand) -> ScanSettings {
        ScanSettings {
            band,
            hidden_ssids: self
                .store
                .hidden_networks()
                .into_iter()
                .map(|n| n.ssid.clone())
                .collect(),
        }
    }
}
