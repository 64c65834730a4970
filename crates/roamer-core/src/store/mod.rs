// ── Saved-network store ──
//
// Sole owner of every `NetworkConfig` and its scan detail cache. Other
// components read through shared references and write back through the
// mutation methods here; every change to persisted fields is written
// through to the `ConfigPersistence` backend before the call returns.

mod linkage;
mod persist;
mod scan_cache;

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::CoreError;
use crate::model::{
    BandPreference, Bssid, ConfigKey, ConnectChoice, DisableReason, MAX_SSID_LEN, MacAddress,
    NetworkConfig, NetworkId, NetworkRequest, NetworkSelectionStatus, ScanResult, SecurityClass,
    SecurityType, StatusUpdate, UNKNOWN_UID, Uid,
};

pub use linkage::{LinkInput, LinkMap, compute_links};
pub use persist::{
    ConfigPersistence, DevicePreferences, JsonFileStore, LastSelected, MemoryStore,
    PersistedState, STATE_VERSION,
};
pub use scan_cache::{BssidStatus, CachedScan, ScanDetailCache, Visibility};

pub struct ConfigStore {
    networks: IndexMap<NetworkId, NetworkConfig>,
    keys: HashMap<ConfigKey, NetworkId>,
    caches: HashMap<NetworkId, ScanDetailCache>,
    last_selected: Option<LastSelected>,
    preferences: DevicePreferences,
    /// BSSIDs the supplicant was told to avoid. Runtime only.
    supplicant_blacklist: BTreeSet<Bssid>,
    config: StoreConfig,
    persistence: Box<dyn ConfigPersistence>,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("networks", &self.networks.len())
            .field("last_selected", &self.last_selected)
            .field("preferences", &self.preferences)
            .finish_non_exhaustive()
    }
}

impl ConfigStore {
    /// Read the persisted document and build the in-memory store.
    pub fn load(
        persistence: Box<dyn ConfigPersistence>,
        config: StoreConfig,
    ) -> Result<Self, CoreError> {
        let state = persistence.load()?.unwrap_or_default();
        let mut store = Self {
            networks: IndexMap::new(),
            keys: HashMap::new(),
            caches: HashMap::new(),
            last_selected: state.last_selected,
            preferences: state.preferences,
            supplicant_blacklist: BTreeSet::new(),
            config,
            persistence,
        };

        for network in state.networks {
            let key = network.config_key();
            if store.keys.contains_key(&key) || store.networks.contains_key(&network.id) {
                warn!(network = %network.id, key = %key, "dropping duplicate saved network");
                continue;
            }
            store.keys.insert(key, network.id);
            store.networks.insert(network.id, network);
        }
        debug!(networks = store.networks.len(), "config store loaded");
        Ok(store)
    }

    /// A store backed by memory only, with nothing saved.
    pub fn in_memory(config: StoreConfig) -> Self {
        Self {
            networks: IndexMap::new(),
            keys: HashMap::new(),
            caches: HashMap::new(),
            last_selected: None,
            preferences: DevicePreferences::default(),
            supplicant_blacklist: BTreeSet::new(),
            config,
            persistence: Box::new(MemoryStore::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn update_config(&mut self, config: StoreConfig) {
        self.config = config;
        self.recompute_links();
    }

    // ── Lookup ───────────────────────────────────────────────────────

    /// Saved networks visible to the user (ephemeral ones excluded).
    pub fn configured_networks(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.values().filter(|n| !n.ephemeral)
    }

    /// Every network, ephemeral included.
    pub fn all_networks(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.values()
    }

    pub fn network_ids(&self) -> Vec<NetworkId> {
        self.networks.keys().copied().collect()
    }

    pub fn network(&self, id: NetworkId) -> Option<&NetworkConfig> {
        self.networks.get(&id)
    }

    pub fn network_by_key(&self, key: &ConfigKey) -> Option<&NetworkConfig> {
        self.keys.get(key).and_then(|id| self.networks.get(id))
    }

    pub fn require(&self, id: NetworkId) -> Result<&NetworkConfig, CoreError> {
        self.networks
            .get(&id)
            .ok_or(CoreError::NetworkNotFound { id })
    }

    /// Networks to probe for explicitly, since they do not beacon their SSID.
    pub fn hidden_networks(&self) -> Vec<&NetworkConfig> {
        self.networks
            .values()
            .filter(|n| n.hidden && !n.ephemeral)
            .collect()
    }

    pub fn scan_cache(&self, id: NetworkId) -> Option<&ScanDetailCache> {
        self.caches.get(&id)
    }

    /// Best fresh RSSI per band for a network.
    pub fn visibility(&self, id: NetworkId, now_ms: u64) -> Visibility {
        self.caches.get(&id).map_or(Visibility::UNSEEN, |cache| {
            cache.visibility(now_ms, self.config.scan_result_max_age)
        })
    }

    /// Fails with `PermissionDenied` unless `uid` may modify the network.
    pub fn check_permission(
        &self,
        id: NetworkId,
        uid: Uid,
        operation: &str,
    ) -> Result<&NetworkConfig, CoreError> {
        let network = self.require(id)?;
        if network.can_be_modified_by(uid) {
            Ok(network)
        } else {
            Err(CoreError::PermissionDenied {
                uid,
                operation: format!("{operation} network {id}"),
            })
        }
    }

    // ── Add / update / forget ────────────────────────────────────────

    /// Add a network, or update the saved network with the same key.
    pub fn add_or_update_network(
        &mut self,
        request: NetworkRequest,
        uid: Uid,
    ) -> Result<NetworkId, CoreError> {
        validate_ssid(&request.ssid)?;
        let security = request.security();
        if let Some(psk) = &request.psk {
            validate_psk(security, psk)?;
        }
        let key = ConfigKey::new(&request.ssid, security);

        let id = if let Some(&id) = self.keys.get(&key) {
            self.check_permission(id, uid, "update")?;
            let network = self.network_mut(id)?;
            network.priority = request.priority;
            network.hidden = request.hidden;
            network.ephemeral = false;
            network.bssid = request.bssid;
            network.fqdn = request.fqdn;
            network.last_updater_uid = uid;
            if request.psk.is_some() {
                network.psk = request.psk;
            }
            if request.default_gateway.is_some() {
                network.default_gateway = request.default_gateway;
            }
            info!(network = %id, key = %key, "updated saved network");
            id
        } else {
            if security == SecurityType::Psk && request.psk.is_none() {
                return Err(CoreError::invalid("psk", "required for psk networks"));
            }
            let id = self.next_free_id();
            let network = NetworkConfig {
                id,
                ssid: request.ssid,
                security,
                psk: request.psk,
                priority: request.priority,
                hidden: request.hidden,
                ephemeral: false,
                bssid: request.bssid,
                fqdn: request.fqdn,
                default_gateway: request.default_gateway,
                status: NetworkSelectionStatus::default(),
                linked: BTreeSet::new(),
                creator_uid: uid,
                last_updater_uid: uid,
                last_connect_uid: None,
                validated_internet: false,
                num_no_internet_reports: 0,
                metered_hint: false,
            };
            self.insert(network);
            info!(network = %id, key = %key, "added saved network");
            id
        };

        self.recompute_links();
        self.persist()?;
        Ok(id)
    }

    /// Save a fully formed network, such as one materialised from a scan
    /// result. An existing network with the same key keeps its id.
    pub fn save_network(&mut self, mut network: NetworkConfig, uid: Uid) -> Result<NetworkId, CoreError> {
        validate_ssid(&network.ssid)?;
        let key = network.config_key();
        if let Some(&existing) = self.keys.get(&key) {
            self.check_permission(existing, uid, "save")?;
            network.id = existing;
        } else if self.networks.contains_key(&network.id) {
            network.id = self.next_free_id();
        }
        network.last_updater_uid = uid;
        let id = network.id;
        self.insert(network);
        self.recompute_links();
        self.persist()?;
        debug!(network = %id, key = %key, "saved network");
        Ok(id)
    }

    /// Remove a network along with its cache and every reference to it.
    pub fn forget_network(&mut self, id: NetworkId, uid: Uid) -> Result<NetworkConfig, CoreError> {
        self.check_permission(id, uid, "forget")?;
        let Some(network) = self.networks.shift_remove(&id) else {
            return Err(CoreError::NetworkNotFound { id });
        };
        let key = network.config_key();
        self.keys.remove(&key);
        self.caches.remove(&id);

        for other in self.networks.values_mut() {
            if other
                .status
                .connect_choice
                .as_ref()
                .is_some_and(|choice| choice.key == key)
            {
                other.status.connect_choice = None;
            }
        }
        if self.last_selected.as_ref().is_some_and(|s| s.key == key) {
            self.last_selected = None;
        }

        self.recompute_links();
        self.persist()?;
        info!(network = %id, key = %key, "forgot network");
        Ok(network)
    }

    /// Build an ephemeral network for an unsaved access point.
    ///
    /// The result is not stored; hand it to [`save_network`](Self::save_network).
    pub fn network_from_scan_result(&self, result: &ScanResult) -> NetworkConfig {
        NetworkConfig {
            id: self.next_free_id(),
            ssid: result.ssid.clone(),
            security: result.security(),
            psk: None,
            priority: 0,
            hidden: false,
            ephemeral: true,
            bssid: None,
            fqdn: None,
            default_gateway: None,
            status: NetworkSelectionStatus::default(),
            linked: BTreeSet::new(),
            creator_uid: UNKNOWN_UID,
            last_updater_uid: UNKNOWN_UID,
            last_connect_uid: None,
            validated_internet: false,
            num_no_internet_reports: 0,
            metered_hint: false,
        }
    }

    // ── Selection status ─────────────────────────────────────────────

    /// Apply an enable/disable transition. Returns whether anything changed.
    pub fn update_network_selection_status(
        &mut self,
        id: NetworkId,
        update: StatusUpdate,
        now_ms: u64,
    ) -> Result<bool, CoreError> {
        let network = self.network_mut(id)?;
        let changed = network.status.apply(update, now_ms);
        if changed {
            debug!(
                network = %id,
                state = %network.status.state(),
                reason = ?network.status.disable_reason(),
                "selection status updated"
            );
            self.persist()?;
        }
        Ok(changed)
    }

    /// Re-enable a temporarily disabled network whose timeout elapsed.
    pub fn try_enable_network(&mut self, id: NetworkId, now_ms: u64) -> bool {
        let Some(network) = self.networks.get_mut(&id) else {
            return false;
        };
        let enabled = network.status.try_enable(now_ms);
        if enabled {
            info!(network = %id, "temporary disable expired");
            self.persist_or_warn();
        }
        enabled
    }

    pub(crate) fn status_mut(&mut self, id: NetworkId) -> Option<&mut NetworkSelectionStatus> {
        self.networks.get_mut(&id).map(|n| &mut n.status)
    }

    /// Clear the candidate annotations of the previous selection pass.
    pub(crate) fn reset_candidates(&mut self) {
        for network in self.networks.values_mut() {
            network.status.reset_candidate();
        }
    }

    pub fn set_connect_choice(
        &mut self,
        id: NetworkId,
        choice: ConnectChoice,
    ) -> Result<(), CoreError> {
        self.network_mut(id)?.status.connect_choice = Some(choice);
        self.persist()
    }

    pub fn clear_connect_choice(&mut self, id: NetworkId) -> Result<bool, CoreError> {
        let cleared = self.network_mut(id)?.status.connect_choice.take().is_some();
        if cleared {
            self.persist()?;
        }
        Ok(cleared)
    }

    // ── Scan detail ──────────────────────────────────────────────────

    /// Fold a scan result into the cache of every saved network it
    /// matches by SSID and security class. Returns the matched ids, or
    /// `None` when no saved network matches.
    pub fn update_saved_network_with_new_scan_detail(
        &mut self,
        result: &ScanResult,
    ) -> Option<Vec<NetworkId>> {
        if result.ssid.is_empty() {
            return None;
        }
        let key = result.config_key();
        let id = *self.keys.get(&key)?;

        let capacity = self.config.scan_cache_capacity;
        let max_age = self.config.scan_result_max_age;
        let cache = self
            .caches
            .entry(id)
            .or_insert_with(|| ScanDetailCache::new(capacity));
        let new_bssid = cache.get(&result.bssid).is_none();
        cache.insert(result.clone(), max_age);

        if new_bssid {
            self.recompute_links();
        }
        Some(vec![id])
    }

    /// Record a failed association against a network and one of its BSSIDs.
    pub fn record_association_failure(
        &mut self,
        id: NetworkId,
        bssid: &Bssid,
        now_ms: u64,
    ) -> Result<bool, CoreError> {
        if let Some(cache) = self.caches.get_mut(&id) {
            cache.record_failure(bssid, now_ms);
        }
        self.update_network_selection_status(
            id,
            StatusUpdate::Disable(DisableReason::AssociationRejection),
            now_ms,
        )
    }

    // ── Supplicant blacklist ─────────────────────────────────────────

    pub fn is_bssid_blacklisted(&self, bssid: &Bssid) -> bool {
        self.supplicant_blacklist.contains(bssid)
    }

    pub fn blacklist_bssid(&mut self, bssid: Bssid) -> bool {
        self.supplicant_blacklist.insert(bssid)
    }

    pub fn unblacklist_bssid(&mut self, bssid: &Bssid) -> bool {
        self.supplicant_blacklist.remove(bssid)
    }

    pub fn clear_bssid_blacklist(&mut self) {
        self.supplicant_blacklist.clear();
    }

    pub fn supplicant_blacklist(&self) -> impl Iterator<Item = &Bssid> {
        self.supplicant_blacklist.iter()
    }

    // ── User selection history ───────────────────────────────────────

    pub fn last_selected(&self) -> Option<&LastSelected> {
        self.last_selected.as_ref()
    }

    pub fn is_last_selected(&self, id: NetworkId) -> bool {
        match (self.last_selected.as_ref(), self.networks.get(&id)) {
            (Some(last), Some(network)) => last.key == network.config_key(),
            _ => false,
        }
    }

    pub fn set_last_selected(&mut self, id: NetworkId, now_ms: u64) -> Result<(), CoreError> {
        let key = self.require(id)?.config_key();
        self.last_selected = Some(LastSelected {
            key,
            timestamp_ms: now_ms,
        });
        self.persist()
    }

    pub fn clear_last_selected(&mut self) -> Result<(), CoreError> {
        if self.last_selected.take().is_some() {
            self.persist()?;
        }
        Ok(())
    }

    // ── Device preferences ───────────────────────────────────────────

    pub fn preferences(&self) -> DevicePreferences {
        self.preferences
    }

    pub fn set_band_preference(
        &mut self,
        band: BandPreference,
    ) -> Result<bool, CoreError> {
        if self.preferences.band == band {
            return Ok(false);
        }
        self.preferences.band = band;
        self.persist()?;
        Ok(true)
    }

    pub fn set_untrusted_allowed(&mut self, allowed: bool) -> Result<bool, CoreError> {
        if self.preferences.untrusted_allowed == allowed {
            return Ok(false);
        }
        self.preferences.untrusted_allowed = allowed;
        self.persist()?;
        Ok(true)
    }

    // ── Connection bookkeeping ───────────────────────────────────────

    /// Record that `id` was joined on behalf of `uid`, learning its
    /// gateway when known.
    pub fn note_connected(
        &mut self,
        id: NetworkId,
        uid: Option<Uid>,
        gateway: Option<MacAddress>,
    ) -> Result<(), CoreError> {
        let network = self.network_mut(id)?;
        if uid.is_some() {
            network.last_connect_uid = uid;
        }
        if gateway.is_some() && network.default_gateway != gateway {
            network.default_gateway = gateway;
            self.recompute_links();
        }
        self.persist()
    }

    pub fn note_no_internet(&mut self, id: NetworkId) -> Result<(), CoreError> {
        let network = self.network_mut(id)?;
        network.num_no_internet_reports = network.num_no_internet_reports.saturating_add(1);
        network.validated_internet = false;
        self.persist()
    }

    pub fn note_validated(&mut self, id: NetworkId) -> Result<(), CoreError> {
        let network = self.network_mut(id)?;
        network.validated_internet = true;
        network.num_no_internet_reports = 0;
        self.persist()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn network_mut(&mut self, id: NetworkId) -> Result<&mut NetworkConfig, CoreError> {
        self.networks
            .get_mut(&id)
            .ok_or(CoreError::NetworkNotFound { id })
    }

    fn insert(&mut self, network: NetworkConfig) {
        let key = network.config_key();
        if let Some(previous) = self.networks.get(&network.id) {
            let previous_key = previous.config_key();
            if previous_key != key {
                self.keys.remove(&previous_key);
            }
        }
        self.keys.insert(key, network.id);
        self.networks.insert(network.id, network);
    }

    fn next_free_id(&self) -> NetworkId {
        let mut candidate = 0;
        while self.networks.contains_key(&NetworkId::new(candidate)) {
            candidate += 1;
        }
        NetworkId::new(candidate)
    }

    fn recompute_links(&mut self) {
        let links = {
            let inputs: Vec<LinkInput<'_>> = self
                .networks
                .values()
                .map(|network| LinkInput {
                    network,
                    bssids: self
                        .caches
                        .get(&network.id)
                        .map(|c| c.bssids().collect())
                        .unwrap_or_default(),
                })
                .collect();
            compute_links(&inputs, &self.config)
        };
        for network in self.networks.values_mut() {
            let updated = links.get(&network.id).cloned().unwrap_or_default();
            if updated != network.linked {
                debug!(network = %network.id, linked = ?updated, "linkage changed");
                network.linked = updated;
            }
        }
    }

    fn snapshot(&self) -> PersistedState {
        PersistedState {
            version: STATE_VERSION,
            networks: self
                .networks
                .values()
                .filter(|n| !n.ephemeral)
                .cloned()
                .collect(),
            last_selected: self.last_selected.clone(),
            preferences: self.preferences,
        }
    }

    fn persist(&self) -> Result<(), CoreError> {
        self.persistence.save(&self.snapshot())
    }

    fn persist_or_warn(&self) {
        if let Err(e) = self.persist() {
            warn!(error = %e, "failed to persist network state");
        }
    }
}

fn validate_ssid(ssid: &str) -> Result<(), CoreError> {
    if ssid.is_empty() {
        return Err(CoreError::invalid("ssid", "must not be empty"));
    }
    if ssid.len() > MAX_SSID_LEN {
        return Err(CoreError::invalid(
            "ssid",
            format!("{} bytes exceeds the {MAX_SSID_LEN}-byte limit", ssid.len()),
        ));
    }
    Ok(())
}

fn validate_psk(security: SecurityType, psk: &SecretString) -> Result<(), CoreError> {
    let psk = psk.expose_secret();
    match security {
        SecurityType::Psk => {
            let raw_hex = psk.len() == 64 && psk.chars().all(|c| c.is_ascii_hexdigit());
            if raw_hex || (8..=63).contains(&psk.len()) {
                Ok(())
            } else {
                Err(CoreError::invalid(
                    "psk",
                    "passphrase must be 8-63 characters or 64 hex digits",
                ))
            }
        }
        SecurityType::Wep => {
            if psk.is_empty() {
                Err(CoreError::invalid("psk", "WEP key must not be empty"))
            } else {
                Ok(())
            }
        }
        SecurityType::Open | SecurityType::Eap => Err(CoreError::invalid(
            "psk",
            format!("{security} networks do not take a pre-shared key"),
        )),
    }
}
