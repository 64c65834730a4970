// ── Security classification ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Security class of a network. Scan results and saved networks only
/// match when their classes are equal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SecurityType {
    Open,
    Wep,
    Psk,
    Eap,
}

impl SecurityType {
    /// Classify a scan result capability string such as `[WPA2-PSK-CCMP][ESS]`.
    pub fn from_capabilities(capabilities: &str) -> Self {
        if capabilities.contains("PSK") {
            Self::Psk
        } else if capabilities.contains("EAP") {
            Self::Eap
        } else if capabilities.contains("WEP") {
            Self::Wep
        } else {
            Self::Open
        }
    }

    pub(crate) fn key_mgmt_tag(self) -> &'static str {
        match self {
            Self::Open => "NONE",
            Self::Wep => "WEP",
            Self::Psk => "WPA_PSK",
            Self::Eap => "WPA_EAP",
        }
    }
}

/// Anything that can be classified by security: saved networks and scan
/// results alike.
pub trait SecurityClass {
    fn security(&self) -> SecurityType;

    fn is_open_network(&self) -> bool {
        self.security() == SecurityType::Open
    }

    fn is_encryption_wep(&self) -> bool {
        self.security() == SecurityType::Wep
    }

    fn is_encryption_psk(&self) -> bool {
        self.security() == SecurityType::Psk
    }

    fn is_encryption_eap(&self) -> bool {
        self.security() == SecurityType::Eap
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn capability_strings_classify() {
        assert_eq!(
            SecurityType::from_capabilities("[WPA2-PSK-CCMP][ESS]"),
            SecurityType::Psk
        );
        assert_eq!(
            SecurityType::from_capabilities("[WPA2-EAP-CCMP][ESS]"),
            SecurityType::Eap
        );
        assert_eq!(SecurityType::from_capabilities("[WEP][ESS]"), SecurityType::Wep);
        assert_eq!(SecurityType::from_capabilities("[ESS]"), SecurityType::Open);
        assert_eq!(SecurityType::from_capabilities(""), SecurityType::Open);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("PSK".parse::<SecurityType>().unwrap(), SecurityType::Psk);
        assert_eq!(SecurityType::Eap.to_string(), "eap");
    }
}
