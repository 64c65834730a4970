// ── Saved network ordering ──
//
// Pairwise preference over two saved networks, used to rank the PNO
// list. `Ordering::Less` means `a` is preferred. The band rule only
// fires against networks never seen on 5 GHz, so the relation is not
// transitive and must not be handed to a std sort.

use std::cmp::Ordering;

use crate::driver::NetworkScorer;
use crate::model::NetworkConfig;
use crate::store::{ConfigStore, Visibility};

/// 5 GHz readings below this never win the band comparison.
const BAND_PREFERENCE_MIN_RSSI_5: i32 = -70;
/// Head start a 5 GHz reading gets against a 2.4 GHz one.
const BAND_PREFERENCE_BOOST_5: i32 = 25;

pub fn compare_networks(
    a: &NetworkConfig,
    b: &NetworkConfig,
    store: &ConfigStore,
    now_ms: u64,
) -> Ordering {
    if a.ephemeral != b.ephemeral {
        return if a.ephemeral {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }

    let va = store.visibility(a.id, now_ms);
    let vb = store.visibility(b.id, now_ms);

    if a.is_same_or_linked(b) && a.id != b.id {
        let by_band = compare_by_band(va, vb);
        if by_band != Ordering::Equal {
            return by_band;
        }
    }

    if prefers(store, a, b) {
        return Ordering::Less;
    }
    if prefers(store, b, a) {
        return Ordering::Greater;
    }

    match b.priority.cmp(&a.priority) {
        Ordering::Equal => compare_by_band(va, vb),
        other => other,
    }
}

/// Like [`compare_networks`], but an available reputation score for both
/// networks decides first.
pub fn compare_networks_with_scorer(
    a: &NetworkConfig,
    b: &NetworkConfig,
    store: &ConfigStore,
    scorer: Option<&dyn NetworkScorer>,
    now_ms: u64,
) -> Ordering {
    if let Some(scorer) = scorer {
        let sa = network_score(a, store, scorer, now_ms);
        let sb = network_score(b, store, scorer, now_ms);
        if let (Some(sa), Some(sb)) = (sa, sb) {
            if sa != sb {
                return sb.cmp(&sa);
            }
        }
    }
    compare_networks(a, b, store, now_ms)
}

/// Rank networks best first. Each network, taken in id order, is
/// inserted ahead of the first ranked network it beats.
pub fn rank_networks<'a>(
    mut networks: Vec<&'a NetworkConfig>,
    store: &ConfigStore,
    scorer: Option<&dyn NetworkScorer>,
    now_ms: u64,
) -> Vec<&'a NetworkConfig> {
    networks.sort_by_key(|n| n.id);
    let mut ranked: Vec<&NetworkConfig> = Vec::with_capacity(networks.len());
    for network in networks {
        let at = ranked
            .iter()
            .position(|other| {
                compare_networks_with_scorer(network, other, store, scorer, now_ms)
                    == Ordering::Less
            })
            .unwrap_or(ranked.len());
        ranked.insert(at, network);
    }
    ranked
}

/// Best reputation score over the network's fresh cached BSSIDs.
fn network_score(
    network: &NetworkConfig,
    store: &ConfigStore,
    scorer: &dyn NetworkScorer,
    now_ms: u64,
) -> Option<i32> {
    let max_age = store.config().scan_result_max_age;
    store
        .scan_cache(network.id)?
        .fresh(now_ms, max_age)
        .filter_map(|cached| scorer.network_score(&cached.result))
        .max()
}

/// Does `winner` carry the user's preference over `loser`? True when the
/// loser's connect choice names the winner or a network linked to it.
fn prefers(store: &ConfigStore, winner: &NetworkConfig, loser: &NetworkConfig) -> bool {
    let Some(choice) = loser.status.connect_choice.as_ref() else {
        return false;
    };
    if choice.key == winner.config_key() {
        return true;
    }
    store
        .network_by_key(&choice.key)
        .is_some_and(|chosen| winner.is_linked(chosen.id))
}

fn compare_by_band(va: Visibility, vb: Visibility) -> Ordering {
    if wins_on_5ghz(va, vb) {
        Ordering::Less
    } else if wins_on_5ghz(vb, va) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

fn wins_on_5ghz(this: Visibility, other: Visibility) -> bool {
    this.rssi5 > BAND_PREFERENCE_MIN_RSSI_5
        && other.rssi5 == Visibility::UNSEEN.rssi5
        && this.rssi5 + BAND_PREFERENCE_BOOST_5 > other.rssi24
}
