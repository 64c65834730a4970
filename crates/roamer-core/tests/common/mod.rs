// Shared fixtures for the roamer-core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use roamer_core::{
    AssociationInfo, Bssid, ConfigStore, NetworkId, NetworkRequest, NetworkScorer, PnoMode,
    PnoSettings, ScanDriver, ScanResult, ScanSettings, SecurityType, StationDriver, StoreConfig,
    SYSTEM_UID, model::NetworkKey,
};

pub const PSK_CAPS: &str = "[WPA2-PSK-CCMP][ESS]";
pub const OPEN_CAPS: &str = "[ESS]";

// ── Scan results ────────────────────────────────────────────────────

pub fn scan(ssid: &str, bssid: &str, rssi: i32, frequency: u32, seen_ms: u64) -> ScanResult {
    ScanResult {
        ssid: ssid.into(),
        bssid: Bssid::new(bssid),
        rssi: Some(rssi),
        frequency,
        capabilities: PSK_CAPS.into(),
        seen_ms,
    }
}

pub fn open_scan(ssid: &str, bssid: &str, rssi: i32, frequency: u32, seen_ms: u64) -> ScanResult {
    ScanResult {
        capabilities: OPEN_CAPS.into(),
        ..scan(ssid, bssid, rssi, frequency, seen_ms)
    }
}

pub fn association(network: NetworkId, bssid: &str, rssi: i32, frequency: u32) -> AssociationInfo {
    AssociationInfo {
        network,
        bssid: Bssid::new(bssid),
        rssi,
        frequency,
    }
}

// ── Store ───────────────────────────────────────────────────────────

pub fn store() -> ConfigStore {
    ConfigStore::in_memory(StoreConfig::default())
}

pub fn add_psk(store: &mut ConfigStore, ssid: &str) -> NetworkId {
    store
        .add_or_update_network(
            NetworkRequest::new(ssid, SecurityType::Psk).with_psk("correct horse"),
            SYSTEM_UID,
        )
        .unwrap()
}

pub fn add_request(store: &mut ConfigStore, request: NetworkRequest) -> NetworkId {
    store.add_or_update_network(request, SYSTEM_UID).unwrap()
}

// ── Recording drivers ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    StartScan(ScanSettings),
    StartPno(PnoMode, usize),
    StopPno,
    CancelScan,
    SetBlacklist(Vec<Bssid>),
    Roam(NetworkId, Bssid),
    Connect(NetworkId, Bssid),
    Disconnect,
}

/// Scan and station driver that records every call. Scans can be set
/// to be refused.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    calls: Mutex<Vec<DriverCall>>,
    refuse_scans: AtomicBool,
}

impl RecordingDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refuse_scans(&self, refuse: bool) {
        self.refuse_scans.store(refuse, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<DriverCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn count(&self, pred: impl Fn(&DriverCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: DriverCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ScanDriver for RecordingDriver {
    fn start_scan(&self, settings: &ScanSettings) -> bool {
        self.record(DriverCall::StartScan(settings.clone()));
        !self.refuse_scans.load(Ordering::SeqCst)
    }

    fn start_pno_scan(&self, mode: PnoMode, _settings: &ScanSettings, pno: &PnoSettings) -> bool {
        self.record(DriverCall::StartPno(mode, pno.networks.len()));
        !self.refuse_scans.load(Ordering::SeqCst)
    }

    fn stop_pno_scan(&self) {
        self.record(DriverCall::StopPno);
    }

    fn cancel_scan(&self) {
        self.record(DriverCall::CancelScan);
    }

    fn set_bssid_blacklist(&self, bssids: &[Bssid]) -> bool {
        self.record(DriverCall::SetBlacklist(bssids.to_vec()));
        true
    }
}

impl StationDriver for RecordingDriver {
    fn auto_roam(&self, network: NetworkId, target: &ScanResult) {
        self.record(DriverCall::Roam(network, target.bssid.clone()));
    }

    fn auto_connect(&self, network: NetworkId, bssid: &Bssid) {
        self.record(DriverCall::Connect(network, bssid.clone()));
    }

    fn disconnect(&self) {
        self.record(DriverCall::Disconnect);
    }
}

/// Reputation service with a fixed score for every SSID it knows.
#[derive(Debug, Default)]
pub struct FixedScorer {
    pub scores: Vec<(String, i32)>,
    pub requested: Mutex<Vec<NetworkKey>>,
}

impl FixedScorer {
    pub fn new(scores: &[(&str, i32)]) -> Arc<Self> {
        Arc::new(Self {
            scores: scores.iter().map(|(s, v)| ((*s).to_owned(), *v)).collect(),
            requested: Mutex::new(Vec::new()),
        })
    }
}

impl NetworkScorer for FixedScorer {
    fn request_scores(&self, keys: &[NetworkKey]) {
        self.requested.lock().unwrap().extend_from_slice(keys);
    }

    fn network_score(&self, result: &ScanResult) -> Option<i32> {
        self.scores
            .iter()
            .find(|(ssid, _)| *ssid == result.ssid)
            .map(|(_, score)| *score)
    }

    fn metered_hint(&self, _result: &ScanResult) -> bool {
        false
    }
}
