// ── Scan observations ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::{Bssid, ConfigKey};
use super::security::{SecurityClass, SecurityType};

/// Signal level used when a result carries no RSSI. Lower than any
/// acceptance floor, so such results never become candidates.
pub const INVALID_RSSI: i32 = -127;

/// Radio band of a scan result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Band {
    #[serde(rename = "2.4GHz")]
    #[strum(serialize = "2.4GHz")]
    TwoPointFourGhz,
    #[serde(rename = "5GHz")]
    #[strum(serialize = "5GHz")]
    FiveGhz,
}

impl Band {
    pub fn from_frequency(mhz: u32) -> Option<Self> {
        match mhz {
            2401..=2499 => Some(Self::TwoPointFourGhz),
            4901..=5899 => Some(Self::FiveGhz),
            _ => None,
        }
    }
}

/// User band preference, shared by scanning and selection.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BandPreference {
    #[default]
    Auto,
    #[strum(serialize = "2g")]
    #[serde(rename = "2g")]
    TwoGhz,
    #[strum(serialize = "5g")]
    #[serde(rename = "5g")]
    FiveGhz,
}

/// One access point as reported by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub ssid: String,
    pub bssid: Bssid,
    #[serde(default)]
    pub rssi: Option<i32>,
    /// Centre frequency in MHz.
    pub frequency: u32,
    #[serde(default)]
    pub capabilities: String,
    /// When the result was observed, in wall-clock milliseconds.
    #[serde(default)]
    pub seen_ms: u64,
}

impl ScanResult {
    /// Signal level, with a missing reading treated as the minimum.
    pub fn level(&self) -> i32 {
        self.rssi.unwrap_or(INVALID_RSSI)
    }

    pub fn band(&self) -> Option<Band> {
        Band::from_frequency(self.frequency)
    }

    pub fn is_24ghz(&self) -> bool {
        self.band() == Some(Band::TwoPointFourGhz)
    }

    pub fn is_5ghz(&self) -> bool {
        self.band() == Some(Band::FiveGhz)
    }

    pub fn config_key(&self) -> ConfigKey {
        ConfigKey::new(&self.ssid, self.security())
    }

    pub fn network_key(&self) -> NetworkKey {
        NetworkKey {
            ssid: self.ssid.clone(),
            bssid: self.bssid.clone(),
        }
    }
}

impl SecurityClass for ScanResult {
    fn security(&self) -> SecurityType {
        SecurityType::from_capabilities(&self.capabilities)
    }
}

/// Key used to ask the reputation service about an access point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkKey {
    pub ssid: String,
    pub bssid: Bssid,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn result(frequency: u32, rssi: Option<i32>) -> ScanResult {
        ScanResult {
            ssid: "Home".into(),
            bssid: Bssid::new("00:11:22:33:44:55"),
            rssi,
            frequency,
            capabilities: "[WPA2-PSK-CCMP]".into(),
            seen_ms: 0,
        }
    }

    #[test]
    fn bands_from_frequency() {
        assert!(result(2412, Some(-50)).is_24ghz());
        assert!(result(5180, Some(-50)).is_5ghz());
        assert_eq!(result(60_480, Some(-50)).band(), None);
    }

    #[test]
    fn missing_rssi_is_minimum() {
        assert_eq!(result(2412, None).level(), INVALID_RSSI);
    }

    #[test]
    fn band_preference_parses_short_names() {
        assert_eq!("5g".parse::<BandPreference>().unwrap(), BandPreference::FiveGhz);
        assert_eq!("AUTO".parse::<BandPreference>().unwrap(), BandPreference::Auto);
    }

    #[test]
    fn scan_result_deserializes_without_optional_fields() {
        let json = r#"{"ssid":"Cafe","bssid":"AA-BB-CC-DD-EE-01","frequency":2437}"#;
        let parsed: ScanResult = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.rssi, None);
        assert_eq!(parsed.bssid.as_str(), "aa:bb:cc:dd:ee:01");
        assert!(parsed.is_open_network());
    }
}
