// ── Saved networks ──

use std::collections::BTreeSet;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ids::{Bssid, ConfigKey, MacAddress, NetworkId, Uid};
use super::scan::ScanResult;
use super::security::{SecurityClass, SecurityType};
use super::status::NetworkSelectionStatus;

/// Longest SSID the 802.11 standard allows, in bytes.
pub const MAX_SSID_LEN: usize = 32;

/// A saved network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub id: NetworkId,
    pub ssid: String,
    pub security: SecurityType,
    #[serde(
        default,
        serialize_with = "serialize_psk",
        deserialize_with = "deserialize_psk",
        skip_serializing_if = "Option::is_none"
    )]
    pub psk: Option<SecretString>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub hidden: bool,
    /// Scorer-suggested network, hidden from normal enumeration.
    #[serde(default)]
    pub ephemeral: bool,
    /// Only this BSSID may be used, when set.
    #[serde(default)]
    pub bssid: Option<Bssid>,
    /// Passpoint FQDN, when provisioned through Passpoint.
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub default_gateway: Option<MacAddress>,
    #[serde(default)]
    pub status: NetworkSelectionStatus,
    /// Networks believed to sit behind the same gateway. Recomputed from
    /// scan caches, never persisted.
    #[serde(skip)]
    pub linked: BTreeSet<NetworkId>,
    pub creator_uid: Uid,
    pub last_updater_uid: Uid,
    #[serde(default)]
    pub last_connect_uid: Option<Uid>,
    #[serde(default)]
    pub validated_internet: bool,
    #[serde(default)]
    pub num_no_internet_reports: u32,
    #[serde(default)]
    pub metered_hint: bool,
}

impl NetworkConfig {
    pub fn config_key(&self) -> ConfigKey {
        ConfigKey::new(&self.ssid, self.security)
    }

    pub fn is_passpoint(&self) -> bool {
        self.fqdn.is_some()
    }

    pub fn is_linked(&self, other: NetworkId) -> bool {
        self.linked.contains(&other)
    }

    /// Same network or linked to it.
    pub fn is_same_or_linked(&self, other: &NetworkConfig) -> bool {
        self.id == other.id || self.is_linked(other.id)
    }

    /// True when a pinned BSSID excludes `result`.
    pub fn rejects_bssid(&self, result: &ScanResult) -> bool {
        self.bssid.as_ref().is_some_and(|pinned| pinned != &result.bssid)
    }

    pub fn can_be_modified_by(&self, uid: Uid) -> bool {
        uid == super::ids::SYSTEM_UID || uid == self.creator_uid
    }
}

impl SecurityClass for NetworkConfig {
    fn security(&self) -> SecurityType {
        self.security
    }
}

impl PartialEq for NetworkConfig {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.ssid == other.ssid
            && self.security == other.security
            && self.psk.as_ref().map(ExposeSecret::expose_secret)
                == other.psk.as_ref().map(ExposeSecret::expose_secret)
            && self.priority == other.priority
            && self.hidden == other.hidden
            && self.ephemeral == other.ephemeral
            && self.bssid == other.bssid
            && self.fqdn == other.fqdn
            && self.default_gateway == other.default_gateway
            && self.status == other.status
            && self.creator_uid == other.creator_uid
            && self.last_updater_uid == other.last_updater_uid
    }
}

fn serialize_psk<S: Serializer>(psk: &Option<SecretString>, s: S) -> Result<S::Ok, S::Error> {
    match psk {
        Some(secret) => s.serialize_some(secret.expose_secret()),
        None => s.serialize_none(),
    }
}

fn deserialize_psk<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SecretString>, D::Error> {
    Ok(Option::<String>::deserialize(d)?.map(SecretString::from))
}

// ── Add / update request ────────────────────────────────────────────

/// Caller-supplied fields for adding or updating a saved network.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkRequest {
    pub ssid: String,
    pub security: Option<SecurityType>,
    #[serde(default, deserialize_with = "deserialize_psk")]
    pub psk: Option<SecretString>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub bssid: Option<Bssid>,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub default_gateway: Option<MacAddress>,
}

impl NetworkRequest {
    pub fn new(ssid: impl Into<String>, security: SecurityType) -> Self {
        Self {
            ssid: ssid.into(),
            security: Some(security),
            ..Self::default()
        }
    }

    pub fn with_psk(mut self, psk: impl Into<String>) -> Self {
        self.psk = Some(SecretString::from(psk.into()));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_gateway(mut self, gateway: MacAddress) -> Self {
        self.default_gateway = Some(gateway);
        self
    }

    pub fn security(&self) -> SecurityType {
        self.security.unwrap_or(if self.psk.is_some() {
            SecurityType::Psk
        } else {
            SecurityType::Open
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn psk_round_trips_through_json() {
        let json = r#"{
            "id": 3, "ssid": "Home", "security": "psk", "psk": "hunter22",
            "creator_uid": 1000, "last_updater_uid": 1000
        }"#;
        let config: NetworkConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.psk.as_ref().unwrap().expose_secret(), "hunter22");
        assert_eq!(config.config_key().as_str(), "\"Home\"WPA_PSK");

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["psk"], "hunter22");
        assert!(back.get("linked").is_none());
    }

    #[test]
    fn request_infers_security_from_psk() {
        assert_eq!(NetworkRequest::new("x", SecurityType::Eap).security(), SecurityType::Eap);
        let mut req = NetworkRequest::default().with_psk("secret12");
        assert_eq!(req.security(), SecurityType::Psk);
        req.psk = None;
        assert_eq!(req.security(), SecurityType::Open);
    }
}
