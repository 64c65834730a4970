// ── BSSID scoring ──
//
// One (scan result, saved network) pair in, an itemised score out. The
// breakdown is kept so callers can show why a candidate won.

use serde::Serialize;

use crate::config::SelectorConfig;
use crate::model::{Bssid, NetworkConfig, ScanResult, SecurityClass};

/// Per-award contributions. `total` is their sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub rssi: i32,
    pub band: i32,
    pub last_selection: i32,
    pub same_network: i32,
    pub same_bssid: i32,
    pub security: i32,
    /// Zero or negative.
    pub no_internet_penalty: i32,
    pub total: i32,
}

/// Inputs that do not belong to the pair being scored.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    pub config: &'a SelectorConfig,
    pub current_network: Option<&'a NetworkConfig>,
    pub current_bssid: Option<&'a Bssid>,
    /// When the network being scored is the user's last pick, the time
    /// of that pick.
    pub last_selected_ms: Option<u64>,
    pub now_ms: u64,
}

pub fn calculate_bssid_score(
    result: &ScanResult,
    network: &NetworkConfig,
    ctx: &ScoreContext<'_>,
) -> ScoreBreakdown {
    let cfg = ctx.config;
    let level = result.level();

    let rssi = (level.min(cfg.saturated_rssi_24) + cfg.rssi_score_offset) * cfg.rssi_score_slope;

    let band = if result.is_5ghz() && level >= cfg.saturated_rssi_5 {
        cfg.band_award_5ghz
    } else {
        0
    };

    let last_selection = ctx
        .last_selected_ms
        .map_or(0, |picked| last_selection_bonus(cfg, picked, ctx.now_ms));

    let same_network = match ctx.current_network {
        Some(current) if current.is_same_or_linked(network) => cfg.current_network_boost,
        _ => 0,
    };

    let same_bssid = if ctx.current_bssid == Some(&result.bssid) {
        cfg.same_bssid_award
    } else {
        0
    };

    let security = if network.is_passpoint() {
        cfg.passpoint_security_award
    } else if network.is_open_network() {
        0
    } else {
        cfg.security_award
    };

    let no_internet_penalty = if network.num_no_internet_reports > 0 && !network.validated_internet {
        -cfg.no_internet_penalty()
    } else {
        0
    };

    ScoreBreakdown {
        rssi,
        band,
        last_selection,
        same_network,
        same_bssid,
        security,
        no_internet_penalty,
        total: rssi
            + band
            + last_selection
            + same_network
            + same_bssid
            + security
            + no_internet_penalty,
    }
}

/// Award minus one point per whole minute since the pick, floored at zero.
fn last_selection_bonus(cfg: &SelectorConfig, picked_ms: u64, now_ms: u64) -> i32 {
    let elapsed = now_ms.saturating_sub(picked_ms);
    if elapsed == 0 {
        return 0;
    }
    let minutes = i32::try_from(elapsed / 60_000).unwrap_or(i32::MAX);
    cfg.last_selection_award.saturating_sub(minutes).max(0)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::model::{NetworkId, NetworkSelectionStatus, SYSTEM_UID, SecurityType};

    fn network(id: u32, security: SecurityType) -> NetworkConfig {
        NetworkConfig {
            id: NetworkId::new(id),
            ssid: format!("net{id}"),
            security,
            psk: None,
            priority: 0,
            hidden: false,
            ephemeral: false,
            bssid: None,
            fqdn: None,
            default_gateway: None,
            status: NetworkSelectionStatus::default(),
            linked: BTreeSet::new(),
            creator_uid: SYSTEM_UID,
            last_updater_uid: SYSTEM_UID,
            last_connect_uid: None,
            validated_internet: false,
            num_no_internet_reports: 0,
            metered_hint: false,
        }
    }

    fn result(rssi: i32, frequency: u32) -> ScanResult {
        ScanResult {
            ssid: "net0".into(),
            bssid: Bssid::new("00:00:00:00:00:01"),
            rssi: Some(rssi),
            frequency,
            capabilities: "[WPA2-PSK-CCMP]".into(),
            seen_ms: 0,
        }
    }

    fn ctx(config: &SelectorConfig) -> ScoreContext<'_> {
        ScoreContext {
            config,
            current_network: None,
            current_bssid: None,
            last_selected_ms: None,
            now_ms: 0,
        }
    }

    #[test]
    fn rssi_is_capped_at_saturation() {
        let cfg = SelectorConfig::default();
        let net = network(0, SecurityType::Psk);
        let strong = calculate_bssid_score(&result(-30, 2412), &net, &ctx(&cfg));
        let saturated = calculate_bssid_score(&result(-60, 2412), &net, &ctx(&cfg));
        assert_eq!(strong.rssi, 100);
        assert_eq!(strong.total, saturated.total);
        assert_eq!(strong.total, 100 + 80);
    }

    #[test]
    fn band_award_needs_strong_5ghz() {
        let cfg = SelectorConfig::default();
        let net = network(0, SecurityType::Psk);
        assert_eq!(calculate_bssid_score(&result(-57, 5180), &net, &ctx(&cfg)).band, 40);
        assert_eq!(calculate_bssid_score(&result(-58, 5180), &net, &ctx(&cfg)).band, 0);
        assert_eq!(calculate_bssid_score(&result(-40, 2412), &net, &ctx(&cfg)).band, 0);
    }

    #[test]
    fn last_selection_decays_per_minute() {
        let cfg = SelectorConfig::default();
        let net = network(0, SecurityType::Open);
        let mut c = ctx(&cfg);
        c.last_selected_ms = Some(0);
        c.now_ms = 10 * 60_000 + 5;
        assert_eq!(calculate_bssid_score(&result(-60, 2412), &net, &c).last_selection, 470);
        c.now_ms = 600 * 60_000;
        assert_eq!(calculate_bssid_score(&result(-60, 2412), &net, &c).last_selection, 0);
        c.now_ms = 0;
        assert_eq!(calculate_bssid_score(&result(-60, 2412), &net, &c).last_selection, 0);
    }

    #[test]
    fn current_network_and_bssid_boosts() {
        let cfg = SelectorConfig::default();
        let net = network(0, SecurityType::Psk);
        let mut linked = network(1, SecurityType::Psk);
        linked.linked.insert(NetworkId::new(0));
        let bssid = Bssid::new("00:00:00:00:00:01");
        let c = ScoreContext {
            current_network: Some(&linked),
            current_bssid: Some(&bssid),
            ..ctx(&cfg)
        };
        let score = calculate_bssid_score(&result(-60, 2412), &net, &c);
        assert_eq!(score.same_network, 16);
        assert_eq!(score.same_bssid, 24);
    }

    #[test]
    fn security_and_no_internet() {
        let cfg = SelectorConfig::default();
        let mut passpoint = network(0, SecurityType::Eap);
        passpoint.fqdn = Some("example.com".into());
        assert_eq!(calculate_bssid_score(&result(-60, 2412), &passpoint, &ctx(&cfg)).security, 40);

        let mut broken = network(1, SecurityType::Psk);
        broken.num_no_internet_reports = 1;
        let score = calculate_bssid_score(&result(-60, 2412), &broken, &ctx(&cfg));
        assert_eq!(score.no_internet_penalty, -cfg.no_internet_penalty());
        assert!(score.total < 0);

        broken.validated_internet = true;
        assert_eq!(calculate_bssid_score(&result(-60, 2412), &broken, &ctx(&cfg)).no_internet_penalty, 0);
    }
}
