// ── Identity types ──
//
// NetworkId, MacAddress and ConfigKey identify every saved network and
// access point. ConfigKey is the identity invariant of the store: one
// saved network per SSID + security class.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use super::security::SecurityType;

/// Identity of the acting application, recorded for permission auditing.
pub type Uid = u32;

/// The platform itself. Always allowed to modify any network.
pub const SYSTEM_UID: Uid = 1000;

/// Owner of networks materialised by the selector.
pub const UNKNOWN_UID: Uid = u32::MAX;

// ── NetworkId ───────────────────────────────────────────────────────

/// Stable numeric id of a saved network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(u32);

impl NetworkId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NetworkId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// ── MacAddress ──────────────────────────────────────────────────────

/// MAC address, normalized to lowercase colon-separated format (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MacAddress(String);

/// Access point hardware address.
pub type Bssid = MacAddress;

impl MacAddress {
    /// Create a normalized MAC address. Accepts colon- or dash-separated input.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase().replace('-', ":"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the first `len` characters of both addresses agree.
    ///
    /// Dual-band boxes usually differ only in the last octet, so a long
    /// shared prefix suggests the same physical AP.
    pub fn shares_prefix(&self, other: &Self, len: usize) -> bool {
        match (self.0.get(..len), other.0.get(..len)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for MacAddress {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

// ── ConfigKey ───────────────────────────────────────────────────────

/// Unique identity of a saved network: quoted SSID followed by the
/// key-management tag, e.g. `"Home"WPA_PSK`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigKey(String);

impl ConfigKey {
    pub fn new(ssid: &str, security: SecurityType) -> Self {
        Self(format!("\"{ssid}\"{}", security.key_mgmt_tag()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
