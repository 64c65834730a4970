// ── Network linkage ──
//
// Two saved networks are "linked" when they look like the same physical
// network: same default gateway, or access points whose BSSIDs share a
// long prefix. Links are a pure function of the saved networks and their
// caches and are recomputed from scratch whenever either changes.

use std::collections::{BTreeMap, BTreeSet};

use secrecy::ExposeSecret;

use crate::config::StoreConfig;
use crate::model::{Bssid, NetworkConfig, NetworkId, SecurityClass};

/// One network's view for link computation.
pub struct LinkInput<'a> {
    pub network: &'a NetworkConfig,
    pub bssids: Vec<&'a Bssid>,
}

/// Symmetric adjacency: every id maps to the set of ids it is linked to.
/// Networks without links are absent.
pub type LinkMap = BTreeMap<NetworkId, BTreeSet<NetworkId>>;

pub fn compute_links(inputs: &[LinkInput<'_>], rules: &StoreConfig) -> LinkMap {
    let mut links = LinkMap::new();
    for (i, a) in inputs.iter().enumerate() {
        for b in inputs.iter().skip(i + 1) {
            if should_link(a, b, rules) {
                links.entry(a.network.id).or_default().insert(b.network.id);
                links.entry(b.network.id).or_default().insert(a.network.id);
            }
        }
    }
    links
}

fn should_link(a: &LinkInput<'_>, b: &LinkInput<'_>, rules: &StoreConfig) -> bool {
    let (na, nb) = (a.network, b.network);
    if na.id == nb.id || na.ephemeral || nb.ephemeral {
        return false;
    }
    if !na.is_encryption_psk() || !nb.is_encryption_psk() {
        return false;
    }
    if rules.link_requires_identical_psk && !same_psk(na, nb) {
        return false;
    }

    if let (Some(ga), Some(gb)) = (&na.default_gateway, &nb.default_gateway) {
        return ga == gb;
    }

    let small = |input: &LinkInput<'_>| {
        !input.bssids.is_empty() && input.bssids.len() <= rules.link_max_cache_entries
    };
    if !small(a) || !small(b) {
        return false;
    }
    a.bssids.iter().any(|x| {
        b.bssids
            .iter()
            .any(|y| x.shares_prefix(y, rules.link_bssid_prefix_len))
    })
}

fn same_psk(a: &NetworkConfig, b: &NetworkConfig) -> bool {
    match (&a.psk, &b.psk) {
        (Some(x), Some(y)) => x.expose_secret() == y.expose_secret(),
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{MacAddress, NetworkSelectionStatus, SYSTEM_UID, SecurityType};

    fn network(id: u32, ssid: &str, security: SecurityType) -> NetworkConfig {
        NetworkConfig {
            id: NetworkId::new(id),
            ssid: ssid.into(),
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

    #[test]
    fn bssid_prefix_links_dual_band_box() {
        let home = network(0, "Home", SecurityType::Psk);
        let home5 = network(1, "Home-5G", SecurityType::Psk);
        let b24 = Bssid::new("00:11:22:33:44:50");
        let b5 = Bssid::new("00:11:22:33:44:51");
        let inputs = [
            LinkInput { network: &home, bssids: vec![&b24] },
            LinkInput { network: &home5, bssids: vec![&b5] },
        ];
        let links = compute_links(&inputs, &StoreConfig::default());
        assert!(links[&NetworkId::new(0)].contains(&NetworkId::new(1)));
        assert!(links[&NetworkId::new(1)].contains(&NetworkId::new(0)));
    }

    #[test]
    fn differing_gateways_prevent_link() {
        let mut a = network(0, "A", SecurityType::Psk);
        let mut b = network(1, "B", SecurityType::Psk);
        a.default_gateway = Some(MacAddress::new("aa:aa:aa:aa:aa:aa"));
        b.default_gateway = Some(MacAddress::new("bb:bb:bb:bb:bb:bb"));
        let x = Bssid::new("00:11:22:33:44:50");
        let y = Bssid::new("00:11:22:33:44:51");
        let inputs = [
            LinkInput { network: &a, bssids: vec![&x] },
            LinkInput { network: &b, bssids: vec![&y] },
        ];
        assert!(compute_links(&inputs, &StoreConfig::default()).is_empty());
    }

    #[test]
    fn open_and_ephemeral_never_link() {
        let a = network(0, "A", SecurityType::Open);
        let mut b = network(1, "B", SecurityType::Psk);
        let c = network(2, "C", SecurityType::Psk);
        b.ephemeral = true;
        let x = Bssid::new("00:11:22:33:44:50");
        let inputs = [
            LinkInput { network: &a, bssids: vec![&x] },
            LinkInput { network: &b, bssids: vec![&x] },
            LinkInput { network: &c, bssids: vec![&x] },
        ];
        assert!(compute_links(&inputs, &StoreConfig::default()).is_empty());
    }

    #[test]
    fn identical_psk_rule_is_optional() {
        let mut a = network(0, "A", SecurityType::Psk);
        let mut b = network(1, "B", SecurityType::Psk);
        a.psk = Some("one-secret".to_owned().into());
        b.psk = Some("two-secret".to_owned().into());
        let x = Bssid::new("00:11:22:33:44:50");
        let inputs = [
            LinkInput { network: &a, bssids: vec![&x] },
            LinkInput { network: &b, bssids: vec![&x] },
        ];
        assert_eq!(compute_links(&inputs, &StoreConfig::default()).len(), 2);

        let strict = StoreConfig {
            link_requires_identical_psk: true,
            ..StoreConfig::default()
        };
        assert!(compute_links(&inputs, &strict).is_empty());
    }
}
