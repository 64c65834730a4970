// ── Domain model ──
//
// Saved networks, scan observations and their identities. Plain data;
// the store owns instances, everything else borrows.

mod ids;
mod network;
mod scan;
mod security;
mod status;

pub use ids::{Bssid, ConfigKey, MacAddress, NetworkId, SYSTEM_UID, UNKNOWN_UID, Uid};
pub use network::{MAX_SSID_LEN, NetworkConfig, NetworkRequest};
pub use scan::{Band, BandPreference, INVALID_RSSI, NetworkKey, ScanResult};
pub use security::{SecurityClass, SecurityType};
pub use status::{
    ConnectChoice, DisableReason, NetworkSelectionStatus, PreferenceStrength, SelectionState,
    StatusUpdate,
};
