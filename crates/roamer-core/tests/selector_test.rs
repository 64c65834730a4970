// Selection pass scenarios run directly against ConfigStore + NetworkSelector.
#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use roamer_core::selector::ScoreContext;
use roamer_core::{
    AssociationInfo, BandPreference, CandidateScore, ConfigKey, ConfigStore, ConnectChoice,
    ConnectKind, DisableReason, LinkStatus, MacAddress, NetworkRequest, NetworkScorer,
    NetworkSelector, PreferenceStrength, ScanResult, SecurityType, Selection, SelectionRequest,
    SelectorConfig, model::StatusUpdate, selector::calculate_bssid_score,
};

use common::{FixedScorer, add_psk, add_request, association, open_scan, scan, store};

const T0: u64 = 1_700_000_000_000;

fn selector() -> NetworkSelector {
    NetworkSelector::new(SelectorConfig::default(), None)
}

fn disconnected() -> LinkStatus {
    LinkStatus {
        disconnected: true,
        ..LinkStatus::default()
    }
}

fn connected() -> LinkStatus {
    LinkStatus {
        connected: true,
        ..LinkStatus::default()
    }
}

fn select(
    selector: &mut NetworkSelector,
    store: &mut ConfigStore,
    results: &[ScanResult],
    link: LinkStatus,
    association: Option<&AssociationInfo>,
    force: bool,
    now: u64,
) -> Option<Selection> {
    let request = SelectionRequest {
        force,
        allow_untrusted: false,
        scan_results: results,
        link,
        association,
    };
    selector.select_qualified_network(store, &request, now)
}

// ── Scenarios ───────────────────────────────────────────────────────

#[test]
fn saved_network_beats_stronger_unsaved_open_network() {
    let mut store = store();
    let home = add_psk(&mut store, "Home");
    let results = [
        scan("Home", "aa:00:00:00:00:01", -60, 2437, T0),
        open_scan("Cafe", "bb:00:00:00:00:01", -40, 2412, T0),
    ];

    let selection = select(
        &mut selector(),
        &mut store,
        &results,
        disconnected(),
        None,
        false,
        T0,
    )
    .unwrap();

    assert_eq!(selection.network.id, home);
    assert_eq!(selection.candidate.bssid.as_str(), "aa:00:00:00:00:01");
    assert_eq!(selection.kind, ConnectKind::Connect);
    assert!(store.network_by_key(&ConfigKey::new("Cafe", SecurityType::Open)).is_none());
}

#[test]
fn weak_link_roams_to_linked_5ghz_network() {
    let gateway = MacAddress::new("02:00:00:00:00:fe");
    let mut store = store();
    let home = add_request(
        &mut store,
        NetworkRequest::new("Home", SecurityType::Psk)
            .with_psk("correct horse")
            .with_gateway(gateway.clone()),
    );
    let home5 = add_request(
        &mut store,
        NetworkRequest::new("Home-5G", SecurityType::Psk)
            .with_psk("correct horse")
            .with_gateway(gateway),
    );
    assert!(store.network(home).unwrap().is_linked(home5));

    let results = [
        scan("Home", "aa:00:00:00:00:01", -80, 2437, T0),
        scan("Home-5G", "aa:00:00:00:00:02", -55, 5180, T0),
    ];
    let current = association(home, "aa:00:00:00:00:01", -80, 2437);

    let selection = select(
        &mut selector(),
        &mut store,
        &results,
        connected(),
        Some(&current),
        false,
        T0,
    )
    .unwrap();

    assert_eq!(selection.network.id, home5);
    assert_eq!(selection.kind, ConnectKind::Roam);
    let CandidateScore::Saved(breakdown) = selection.score else {
        panic!("expected a saved-network score");
    };
    assert_eq!(breakdown.band, 40);
    assert_eq!(breakdown.same_network, 16);
    assert_eq!(breakdown.same_bssid, 0);
    assert_eq!(breakdown.total, 100 + 40 + 16 + 80);
}

#[test]
fn qualified_connection_is_left_alone() {
    let mut store = store();
    let home = add_psk(&mut store, "Home");
    let results = [
        scan("Home", "aa:00:00:00:00:01", -50, 2437, T0),
        scan("Home", "aa:00:00:00:00:02", -30, 5180, T0),
    ];
    let current = association(home, "aa:00:00:00:00:01", -50, 2437);

    let selection = select(
        &mut selector(),
        &mut store,
        &results,
        connected(),
        Some(&current),
        false,
        T0,
    );
    assert!(selection.is_none());
}

#[test]
fn reselection_waits_for_minimum_interval() {
    let mut store = store();
    let home = add_psk(&mut store, "Home");
    let mut selector = selector();
    let results = [scan("Home", "aa:00:00:00:00:01", -80, 2437, T0)];
    let current = association(home, "aa:00:00:00:00:01", -80, 2437);

    let first = select(&mut selector, &mut store, &results, connected(), Some(&current), true, T0);
    assert!(first.is_some());

    let soon = T0 + 5_000;
    let second = select(&mut selector, &mut store, &results, connected(), Some(&current), false, soon);
    assert!(second.is_none(), "second pass within 10 s must not select");

    let later = T0 + 11_000;
    let third = select(&mut selector, &mut store, &results, connected(), Some(&current), false, later)
        .unwrap();
    assert_eq!(third.kind, ConnectKind::AlreadyConnected);
}

#[test]
fn selection_is_deterministic() {
    let run = |results: &[ScanResult]| {
        let mut store = store();
        add_psk(&mut store, "Alpha");
        add_psk(&mut store, "Beta");
        select(&mut selector(), &mut store, results, disconnected(), None, false, T0).unwrap()
    };
    let results = vec![
        scan("Alpha", "aa:00:00:00:00:01", -50, 2437, T0),
        scan("Beta", "bb:00:00:00:00:01", -55, 5180, T0),
    ];
    let mut reversed = results.clone();
    reversed.reverse();

    let a = run(&results);
    let b = run(&results);
    let c = run(&reversed);
    assert_eq!(a, b);
    assert_eq!(a.network.ssid, "Beta");
    assert_eq!(c.network.ssid, a.network.ssid);
    assert_eq!(c.candidate, a.candidate);
}

#[test]
fn score_never_drops_as_rssi_rises() {
    let mut store = store();
    let id = add_psk(&mut store, "Home");
    let network = store.network(id).unwrap().clone();
    let config = SelectorConfig::default();
    let ctx = ScoreContext {
        config: &config,
        current_network: None,
        current_bssid: None,
        last_selected_ms: None,
        now_ms: T0,
    };

    for frequency in [2412, 5180] {
        let mut previous = i32::MIN;
        for rssi in -100..=-20 {
            let result = scan("Home", "aa:00:00:00:00:01", rssi, frequency, T0);
            let total = calculate_bssid_score(&result, &network, &ctx).total;
            assert!(total >= previous, "{frequency} MHz at {rssi} dBm dropped");
            previous = total;
        }
    }
}

#[test]
fn band_award_requires_saturated_5ghz_signal() {
    let mut store = store();
    let id = add_psk(&mut store, "Home");
    let network = store.network(id).unwrap().clone();
    let config = SelectorConfig::default();
    let ctx = ScoreContext {
        config: &config,
        current_network: None,
        current_bssid: None,
        last_selected_ms: None,
        now_ms: T0,
    };
    let score = |rssi, frequency| {
        calculate_bssid_score(&scan("Home", "aa:00:00:00:00:01", rssi, frequency, T0), &network, &ctx)
    };

    let strong5 = score(-50, 5180);
    let strong24 = score(-50, 2412);
    assert_eq!(strong5.total - strong24.total, config.band_award_5ghz);

    assert_eq!(score(-57, 5180).band, config.band_award_5ghz);
    assert_eq!(score(-58, 5180).band, 0);
}

// ── Connect choice ──────────────────────────────────────────────────

fn choice(key: ConfigKey) -> ConnectChoice {
    ConnectChoice {
        key,
        timestamp_ms: T0,
        strength: PreferenceStrength::Strong,
    }
}

#[test]
fn connect_choice_overrides_higher_score() {
    let mut store = store();
    let a = add_psk(&mut store, "Alpha");
    let b = add_psk(&mut store, "Beta");
    let b_key = store.network(b).unwrap().config_key();
    store.set_connect_choice(a, choice(b_key)).unwrap();

    let results = [
        scan("Alpha", "aa:00:00:00:00:01", -50, 2437, T0),
        scan("Beta", "bb:00:00:00:00:01", -70, 2437, T0),
    ];
    let selection =
        select(&mut selector(), &mut store, &results, disconnected(), None, false, T0).unwrap();

    assert_eq!(selection.network.id, b);
    assert_eq!(selection.candidate.bssid.as_str(), "bb:00:00:00:00:01");
}

#[test]
fn connect_choice_chain_skips_disabled_links() {
    let mut store = store();
    let a = add_psk(&mut store, "Alpha");
    let b = add_psk(&mut store, "Beta");
    let c = add_psk(&mut store, "Gamma");
    let b_key = store.network(b).unwrap().config_key();
    let c_key = store.network(c).unwrap().config_key();
    store.set_connect_choice(a, choice(b_key)).unwrap();
    store.set_connect_choice(b, choice(c_key)).unwrap();
    store
        .update_network_selection_status(b, StatusUpdate::Disable(DisableReason::ByUser), T0)
        .unwrap();

    let results = [
        scan("Alpha", "aa:00:00:00:00:01", -45, 2437, T0),
        scan("Beta", "bb:00:00:00:00:01", -50, 2437, T0),
        scan("Gamma", "cc:00:00:00:00:01", -75, 2437, T0),
    ];
    let selection =
        select(&mut selector(), &mut store, &results, disconnected(), None, false, T0).unwrap();
    assert_eq!(selection.network.id, c);
}

#[test]
fn connect_choice_cycle_terminates() {
    let mut store = store();
    let a = add_psk(&mut store, "Alpha");
    let b = add_psk(&mut store, "Beta");
    let a_key = store.network(a).unwrap().config_key();
    let b_key = store.network(b).unwrap().config_key();
    store.set_connect_choice(a, choice(b_key)).unwrap();
    store.set_connect_choice(b, choice(a_key)).unwrap();

    let results = [
        scan("Alpha", "aa:00:00:00:00:01", -50, 2437, T0),
        scan("Beta", "bb:00:00:00:00:01", -70, 2437, T0),
    ];
    let selection =
        select(&mut selector(), &mut store, &results, disconnected(), None, false, T0).unwrap();
    assert_eq!(selection.network.id, b);
}

#[test]
fn dangling_connect_choice_is_dropped() {
    let mut store = store();
    let a = add_psk(&mut store, "Alpha");
    store
        .set_connect_choice(a, choice(ConfigKey::new("Ghost", SecurityType::Psk)))
        .unwrap();

    let results = [scan("Alpha", "aa:00:00:00:00:01", -50, 2437, T0)];
    let selection =
        select(&mut selector(), &mut store, &results, disconnected(), None, false, T0).unwrap();

    assert_eq!(selection.network.id, a);
    assert!(store.network(a).unwrap().status.connect_choice.is_none());
}

#[test]
fn user_selection_records_connect_choices_over_seen_networks() {
    let mut store = store();
    let a = add_psk(&mut store, "Alpha");
    let b = add_psk(&mut store, "Beta");
    let mut selector = selector();
    let results = [
        scan("Alpha", "aa:00:00:00:00:01", -50, 2437, T0),
        scan("Beta", "bb:00:00:00:00:01", -70, 2437, T0),
    ];
    select(&mut selector, &mut store, &results, disconnected(), None, false, T0).unwrap();

    let changed = selector
        .user_select_network(&mut store, b, true, T0, |_| Some(PreferenceStrength::Moderate))
        .unwrap();

    assert!(changed);
    let recorded = store.network(a).unwrap().status.connect_choice.clone().unwrap();
    assert_eq!(recorded.key, store.network(b).unwrap().config_key());
    assert_eq!(recorded.strength, PreferenceStrength::Moderate);
    assert!(store.network(b).unwrap().status.connect_choice.is_none());
}

// ── Blacklist / band / untrusted ────────────────────────────────────

#[test]
fn blacklisted_bssid_returns_after_expiry() {
    let mut store = store();
    add_psk(&mut store, "Home");
    let mut selector = selector();
    let bssid = MacAddress::new("aa:00:00:00:00:01");

    assert!(!selector.enable_bssid(&bssid, false, T0));
    assert!(!selector.enable_bssid(&bssid, false, T0));
    assert!(selector.enable_bssid(&bssid, false, T0));

    let at = |now| [scan("Home", "aa:00:00:00:00:01", -50, 2437, now)];
    let blocked = select(&mut selector, &mut store, &at(T0 + 1_000), disconnected(), None, false, T0 + 1_000);
    assert!(blocked.is_none());

    let expiry = T0 + 30 * 60 * 1_000;
    let back = select(&mut selector, &mut store, &at(expiry), disconnected(), None, false, expiry);
    assert_eq!(back.unwrap().candidate.bssid, bssid);
    assert!(!selector.is_bssid_disabled(&bssid));
}

#[test]
fn band_preference_disqualifies_current_band() {
    let mut store = store();
    let home = add_psk(&mut store, "Home");
    let mut selector = selector();
    selector.set_user_preferred_band(BandPreference::FiveGhz);
    let results = [
        scan("Home", "aa:00:00:00:00:01", -50, 2437, T0),
        scan("Home", "aa:00:00:00:00:02", -55, 5180, T0),
    ];
    let current = association(home, "aa:00:00:00:00:01", -50, 2437);

    let selection =
        select(&mut selector, &mut store, &results, connected(), Some(&current), false, T0).unwrap();
    assert_eq!(selection.candidate.bssid.as_str(), "aa:00:00:00:00:02");
    assert_eq!(selection.kind, ConnectKind::Roam);
}

#[test]
fn untrusted_network_is_materialised_when_allowed() {
    let mut store = store();
    add_psk(&mut store, "Home");
    let scorer: Arc<dyn NetworkScorer> = FixedScorer::new(&[("Cafe", 55)]);
    let mut selector = NetworkSelector::new(SelectorConfig::default(), Some(scorer));
    let results = [open_scan("Cafe", "bb:00:00:00:00:01", -45, 2412, T0)];
    let request = SelectionRequest {
        force: false,
        allow_untrusted: true,
        scan_results: &results,
        link: disconnected(),
        association: None,
    };

    let selection = selector
        .select_qualified_network(&mut store, &request, T0)
        .unwrap();

    assert_eq!(selection.score, CandidateScore::Untrusted { score: 55 });
    assert!(selection.network.ephemeral);
    assert_eq!(store.configured_networks().count(), 1);
    assert_eq!(store.all_networks().count(), 2);
}

#[test]
fn transient_disconnect_skips_selection() {
    let mut store = store();
    add_psk(&mut store, "Home");
    let results = [scan("Home", "aa:00:00:00:00:01", -50, 2437, T0)];
    let link = LinkStatus {
        disconnected: true,
        supplicant_transient: true,
        ..LinkStatus::default()
    };
    assert!(select(&mut selector(), &mut store, &results, link, None, false, T0).is_none());

    let later = T0 + 1_000;
    assert!(select(&mut selector(), &mut store, &results, disconnected(), None, false, later).is_some());
}
