// ── External capabilities ──
//
// What the engine calls out to: the scanning driver, the station
// (association) driver and the network reputation service. Calls are
// fire-and-forget; outcomes come back later as notifications.

use std::time::Duration;

use serde::Serialize;
use strum::Display;

use crate::model::{Bssid, NetworkId, NetworkKey, ScanResult, SecurityType};

/// Channels a scan should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanBand {
    BothWithDfs,
    TwoPointFourGhz,
    FiveGhzWithDfs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSettings {
    pub band: ScanBand,
    /// SSIDs to probe for explicitly.
    pub hidden_ssids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PnoMode {
    Connected,
    Disconnected,
}

/// A saved network the driver should look for while the host sleeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PnoNetwork {
    pub ssid: String,
    pub security: SecurityType,
    pub hidden: bool,
}

/// Scoring knobs handed to the driver so it can rank matches itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PnoSettings {
    pub min_5ghz_rssi: i32,
    pub min_24ghz_rssi: i32,
    pub initial_score_max: i32,
    pub current_connection_bonus: i32,
    pub same_network_bonus: i32,
    pub secure_bonus: i32,
    pub band_5ghz_bonus: i32,
    #[serde(serialize_with = "serialize_secs")]
    pub interval: Duration,
    /// Ordered most preferred first.
    pub networks: Vec<PnoNetwork>,
}

pub trait ScanDriver: Send + Sync {
    /// Returns false when the driver refused to start the scan.
    fn start_scan(&self, settings: &ScanSettings) -> bool;
    fn start_pno_scan(&self, mode: PnoMode, settings: &ScanSettings, pno: &PnoSettings) -> bool;
    fn stop_pno_scan(&self);
    fn cancel_scan(&self);
    fn set_bssid_blacklist(&self, bssids: &[Bssid]) -> bool;
}

pub trait StationDriver: Send + Sync {
    /// Move to another BSSID of the network already joined.
    fn auto_roam(&self, network: NetworkId, target: &ScanResult);
    fn auto_connect(&self, network: NetworkId, bssid: &Bssid);
    fn disconnect(&self);
}

/// Reputation service for access points the user never saved.
pub trait NetworkScorer: Send + Sync {
    fn request_scores(&self, keys: &[NetworkKey]);
    fn network_score(&self, result: &ScanResult) -> Option<i32>;
    fn metered_hint(&self, result: &ScanResult) -> bool;
}

/// A driver that accepts every request and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDriver;

impl ScanDriver for NullDriver {
    fn start_scan(&self, _settings: &ScanSettings) -> bool {
        true
    }

    fn start_pno_scan(&self, _mode: PnoMode, _settings: &ScanSettings, _pno: &PnoSettings) -> bool {
        true
    }

    fn stop_pno_scan(&self) {}

    fn cancel_scan(&self) {}

    fn set_bssid_blacklist(&self, _bssids: &[Bssid]) -> bool {
        true
    }
}

impl StationDriver for NullDriver {
    fn auto_roam(&self, _network: NetworkId, _target: &ScanResult) {}

    fn auto_connect(&self, _network: NetworkId, _bssid: &Bssid) {}

    fn disconnect(&self) {}
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}
