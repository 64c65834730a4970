// ── Connectivity scan scheduler ──
//
// A pure state machine: `(SchedulerState, SchedulerEvent) -> (SchedulerState, [Effect])`.
// It never touches a driver or a clock. The engine executes the effects
// and feeds outcomes (scan started / failed, timer fired) back in as
// events.
//
// Scan mode follows screen and link state:
//
//   screen on                 → periodic single scans
//   screen off + connected    → connected PNO
//   screen off + disconnected → disconnected PNO, plus the watchdog
//   transitioning             → nothing
//
// Every mode change stops the old mode before starting the new one, and
// a timer is always cancelled before it is re-armed.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;
use strum::Display;

use crate::config::ScheduleConfig;
use crate::driver::{PnoMode, ScanBand};
use crate::model::BandPreference;

/// Link state as far as scanning is concerned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WifiState {
    Connected,
    #[default]
    Disconnected,
    /// Associating, authenticating, obtaining an address or debouncing.
    Transitioning,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanMode {
    #[default]
    Idle,
    Periodic,
    Pno(PnoMode),
}

/// Why a scan was started. Decides which retry budget a failure uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanKind {
    Periodic,
    Pno,
    /// One-off full scan, e.g. forced by the user or a retry.
    Single,
    Watchdog,
}

impl ScanKind {
    fn uses_single_scan_budget(self) -> bool {
        matches!(self, Self::Single | Self::Watchdog)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimerKind {
    PeriodicScan,
    RestartConnectivityScan,
    RestartSingleScan,
    Watchdog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    ScreenChanged { on: bool },
    ConnectionStateChanged(WifiState),
    WifiEnabledChanged(bool),
    ForceScan,
    UserSelectedNetwork,
    BandPreferenceChanged(BandPreference),
    UntrustedAllowedChanged(bool),
    /// A BSSID was newly blacklisted; look for an alternative.
    BssidBlacklisted,
    ScanStarted(ScanKind),
    ScanFailed(ScanKind),
    TimerFired(TimerKind),
    PnoResultsArrived,
    /// The engine consumed `force_select` for a selection pass.
    SelectionDone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    StartSingleScan { kind: ScanKind, band: ScanBand },
    StartPnoScan { mode: PnoMode, band: ScanBand },
    StopPnoScan,
    ArmTimer { kind: TimerKind, delay: Duration },
    CancelTimer { kind: TimerKind },
    /// The retry budget for `kind` is exhausted.
    GaveUp { kind: ScanKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct SchedulerState {
    pub wifi_enabled: bool,
    pub screen_on: bool,
    pub wifi_state: WifiState,
    pub mode: ScanMode,
    /// The next selection pass should ignore the "already qualified" guard.
    pub force_select: bool,
    pub untrusted_allowed: bool,
    pub band: BandPreference,
    pub scan_restart_count: u32,
    pub single_scan_restart_count: u32,
    pub armed: BTreeSet<TimerKind>,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            wifi_enabled: true,
            screen_on: false,
            wifi_state: WifiState::Disconnected,
            mode: ScanMode::Idle,
            force_select: false,
            untrusted_allowed: false,
            band: BandPreference::Auto,
            scan_restart_count: 0,
            single_scan_restart_count: 0,
            armed: BTreeSet::new(),
        }
    }
}

/// Channels to scan for a band preference.
pub fn scan_band(preference: BandPreference) -> ScanBand {
    match preference {
        BandPreference::Auto => ScanBand::BothWithDfs,
        BandPreference::TwoGhz => ScanBand::TwoPointFourGhz,
        BandPreference::FiveGhz => ScanBand::FiveGhzWithDfs,
    }
}

impl SchedulerState {
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains(&kind)
    }

    /// Apply one event.
    #[must_use]
    pub fn step(self, event: SchedulerEvent, config: &ScheduleConfig) -> (Self, Vec<Effect>) {
        let mut t = Transition {
            state: self,
            effects: Vec::new(),
            config,
        };
        t.apply(event);
        (t.state, t.effects)
    }
}

struct Transition<'a> {
    state: SchedulerState,
    effects: Vec<Effect>,
    config: &'a ScheduleConfig,
}

impl Transition<'_> {
    fn apply(&mut self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::WifiEnabledChanged(enabled) => {
                self.state.wifi_enabled = enabled;
                if enabled {
                    self.start_connectivity_scan(false, true);
                } else {
                    self.stop_connectivity_scan(true);
                    self.cancel(TimerKind::RestartSingleScan);
                    self.cancel(TimerKind::Watchdog);
                    self.state.single_scan_restart_count = 0;
                }
            }
            SchedulerEvent::ScreenChanged { on } => {
                self.state.screen_on = on;
                self.start_connectivity_scan(false, true);
            }
            SchedulerEvent::ConnectionStateChanged(wifi_state) => {
                self.state.wifi_state = wifi_state;
                if wifi_state == WifiState::Disconnected {
                    if self.state.wifi_enabled {
                        self.arm(TimerKind::Watchdog, self.config.watchdog_interval);
                    }
                } else {
                    self.cancel(TimerKind::Watchdog);
                }
                self.start_connectivity_scan(false, true);
            }
            SchedulerEvent::UntrustedAllowedChanged(allowed) => {
                if self.state.untrusted_allowed != allowed {
                    self.state.untrusted_allowed = allowed;
                    self.start_connectivity_scan(false, true);
                }
            }
            SchedulerEvent::BandPreferenceChanged(band) => {
                self.state.band = band;
                self.start_connectivity_scan(false, true);
            }
            SchedulerEvent::UserSelectedNetwork => self.start_connectivity_scan(true, true),
            SchedulerEvent::BssidBlacklisted => self.start_connectivity_scan(false, true),
            SchedulerEvent::ForceScan => {
                if self.state.wifi_enabled {
                    self.single_scan(ScanKind::Single);
                }
            }
            SchedulerEvent::ScanStarted(kind) => {
                if kind.uses_single_scan_budget() {
                    self.state.single_scan_restart_count = 0;
                } else {
                    self.state.scan_restart_count = 0;
                }
            }
            SchedulerEvent::ScanFailed(kind) => self.scan_failed(kind),
            SchedulerEvent::TimerFired(kind) => self.timer_fired(kind),
            SchedulerEvent::PnoResultsArrived => {
                if self.state.wifi_state == WifiState::Disconnected
                    && self.state.is_armed(TimerKind::Watchdog)
                {
                    self.arm(TimerKind::Watchdog, self.config.watchdog_interval);
                }
            }
            SchedulerEvent::SelectionDone => self.state.force_select = false,
        }
    }

    fn start_connectivity_scan(&mut self, force: bool, reset_restarts: bool) {
        if !self.state.wifi_enabled {
            return;
        }
        self.stop_connectivity_scan(reset_restarts);
        if !matches!(
            self.state.wifi_state,
            WifiState::Connected | WifiState::Disconnected
        ) {
            return;
        }
        self.state.force_select = force;

        let band = scan_band(self.state.band);
        if self.state.screen_on {
            self.single_scan(ScanKind::Periodic);
            self.arm(TimerKind::PeriodicScan, self.config.periodic_scan_interval);
            self.state.mode = ScanMode::Periodic;
        } else {
            let mode = if self.state.wifi_state == WifiState::Connected {
                PnoMode::Connected
            } else {
                PnoMode::Disconnected
            };
            self.effects.push(Effect::StartPnoScan { mode, band });
            self.state.mode = ScanMode::Pno(mode);
        }
    }

    fn stop_connectivity_scan(&mut self, reset_restarts: bool) {
        match self.state.mode {
            ScanMode::Periodic => self.cancel(TimerKind::PeriodicScan),
            ScanMode::Pno(_) => self.effects.push(Effect::StopPnoScan),
            ScanMode::Idle => {}
        }
        self.cancel(TimerKind::PeriodicScan);
        if reset_restarts {
            self.cancel(TimerKind::RestartConnectivityScan);
            self.state.scan_restart_count = 0;
        }
        self.state.mode = ScanMode::Idle;
    }

    fn single_scan(&mut self, kind: ScanKind) {
        self.effects.push(Effect::StartSingleScan {
            kind,
            band: scan_band(self.state.band),
        });
    }

    fn scan_failed(&mut self, kind: ScanKind) {
        let max = self.config.max_scan_restarts;
        let delay = self.config.restart_scan_delay;
        let (count, timer) = if kind.uses_single_scan_budget() {
            (&mut self.state.single_scan_restart_count, TimerKind::RestartSingleScan)
        } else {
            (&mut self.state.scan_restart_count, TimerKind::RestartConnectivityScan)
        };
        if *count < max {
            *count += 1;
            self.arm(timer, delay);
        } else {
            *count = 0;
            self.effects.push(Effect::GaveUp { kind });
        }
    }

    fn timer_fired(&mut self, kind: TimerKind) {
        if !self.state.armed.remove(&kind) || !self.state.wifi_enabled {
            return;
        }
        match kind {
            TimerKind::PeriodicScan => {
                if self.state.screen_on && self.state.mode == ScanMode::Periodic {
                    self.single_scan(ScanKind::Periodic);
                    self.arm(TimerKind::PeriodicScan, self.config.periodic_scan_interval);
                }
            }
            TimerKind::RestartConnectivityScan => {
                let force = self.state.force_select;
                self.start_connectivity_scan(force, false);
            }
            TimerKind::RestartSingleScan => self.single_scan(ScanKind::Single),
            TimerKind::Watchdog => {
                if self.state.wifi_state == WifiState::Disconnected {
                    self.arm(TimerKind::Watchdog, self.config.watchdog_interval);
                    self.single_scan(ScanKind::Watchdog);
                }
            }
        }
    }

    fn arm(&mut self, kind: TimerKind, delay: Duration) {
        self.cancel(kind);
        self.state.armed.insert(kind);
        self.effects.push(Effect::ArmTimer { kind, delay });
    }

    fn cancel(&mut self, kind: TimerKind) {
        if self.state.armed.remove(&kind) {
            self.effects.push(Effect::CancelTimer { kind });
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn cfg() -> ScheduleConfig {
        ScheduleConfig::default()
    }

    fn run(state: SchedulerState, events: &[SchedulerEvent]) -> (SchedulerState, Vec<Effect>) {
        let config = cfg();
        let mut all = Vec::new();
        let mut state = state;
        for event in events {
            let (next, effects) = state.step(event.clone(), &config);
            state = next;
            all.extend(effects);
        }
        (state, all)
    }

    fn connected_screen_off() -> SchedulerState {
        SchedulerState {
            wifi_state: WifiState::Connected,
            ..SchedulerState::default()
        }
    }

    #[test]
    fn screen_on_starts_periodic_scans() {
        let (state, effects) = run(
            connected_screen_off(),
            &[SchedulerEvent::ScreenChanged { on: true }],
        );
        assert_eq!(state.mode, ScanMode::Periodic);
        assert_eq!(
            effects,
            vec![
                Effect::StartSingleScan {
                    kind: ScanKind::Periodic,
                    band: ScanBand::BothWithDfs,
                },
                Effect::ArmTimer {
                    kind: TimerKind::PeriodicScan,
                    delay: Duration::from_secs(20),
                },
            ]
        );
    }

    #[test]
    fn screen_off_switches_to_pno_after_cancelling_periodic() {
        let (state, _) = run(
            connected_screen_off(),
            &[SchedulerEvent::ScreenChanged { on: true }],
        );
        let (state, effects) = run(state, &[SchedulerEvent::ScreenChanged { on: false }]);
        assert_eq!(state.mode, ScanMode::Pno(PnoMode::Connected));
        assert_eq!(
            effects,
            vec![
                Effect::CancelTimer {
                    kind: TimerKind::PeriodicScan,
                },
                Effect::StartPnoScan {
                    mode: PnoMode::Connected,
                    band: ScanBand::BothWithDfs,
                },
            ]
        );
        assert!(!state.is_armed(TimerKind::PeriodicScan));
    }

    #[test]
    fn pno_is_stopped_before_periodic_starts() {
        let (state, _) = run(
            connected_screen_off(),
            &[SchedulerEvent::ScreenChanged { on: false }],
        );
        let (_, effects) = run(state, &[SchedulerEvent::ScreenChanged { on: true }]);
        assert_eq!(effects.first(), Some(&Effect::StopPnoScan));
    }

    #[test]
    fn disconnect_arms_watchdog_and_starts_disconnected_pno() {
        let (state, effects) = run(
            connected_screen_off(),
            &[SchedulerEvent::ConnectionStateChanged(WifiState::Disconnected)],
        );
        assert!(state.is_armed(TimerKind::Watchdog));
        assert_eq!(state.mode, ScanMode::Pno(PnoMode::Disconnected));
        assert!(effects.contains(&Effect::ArmTimer {
            kind: TimerKind::Watchdog,
            delay: Duration::from_secs(20 * 60),
        }));
    }

    #[test]
    fn watchdog_fires_single_scan_while_disconnected() {
        let (state, _) = run(
            connected_screen_off(),
            &[SchedulerEvent::ConnectionStateChanged(WifiState::Disconnected)],
        );
        let (state, effects) = run(state, &[SchedulerEvent::TimerFired(TimerKind::Watchdog)]);
        assert!(state.is_armed(TimerKind::Watchdog));
        assert!(effects.contains(&Effect::StartSingleScan {
            kind: ScanKind::Watchdog,
            band: ScanBand::BothWithDfs,
        }));
    }

    #[test]
    fn connecting_cancels_watchdog() {
        let (state, _) = run(
            SchedulerState::default(),
            &[
                SchedulerEvent::ConnectionStateChanged(WifiState::Disconnected),
                SchedulerEvent::ConnectionStateChanged(WifiState::Transitioning),
            ],
        );
        assert!(!state.is_armed(TimerKind::Watchdog));
        assert_eq!(state.mode, ScanMode::Idle);
    }

    #[test]
    fn transitioning_suspends_scanning() {
        let (state, effects) = run(
            SchedulerState {
                wifi_state: WifiState::Transitioning,
                ..SchedulerState::default()
            },
            &[SchedulerEvent::ScreenChanged { on: true }],
        );
        assert_eq!(state.mode, ScanMode::Idle);
        assert!(effects.is_empty());
    }

    #[test]
    fn periodic_failures_retry_then_give_up() {
        let (mut state, _) = run(
            connected_screen_off(),
            &[SchedulerEvent::ScreenChanged { on: true }],
        );
        let config = cfg();
        for attempt in 1..=5 {
            let (next, effects) = state.step(SchedulerEvent::ScanFailed(ScanKind::Periodic), &config);
            assert_eq!(next.scan_restart_count, attempt);
            assert!(effects.contains(&Effect::ArmTimer {
                kind: TimerKind::RestartConnectivityScan,
                delay: Duration::from_secs(2),
            }));
            // The retry restarts the connectivity scan without resetting the budget.
            let (next, effects) = next.step(
                SchedulerEvent::TimerFired(TimerKind::RestartConnectivityScan),
                &config,
            );
            assert_eq!(next.scan_restart_count, attempt);
            assert!(matches!(effects.first(), Some(Effect::CancelTimer { .. })));
            state = next;
        }
        let (state, effects) = state.step(SchedulerEvent::ScanFailed(ScanKind::Periodic), &config);
        assert_eq!(effects, vec![Effect::GaveUp { kind: ScanKind::Periodic }]);
        assert_eq!(state.scan_restart_count, 0);
    }

    #[test]
    fn single_scan_failures_use_their_own_budget() {
        let (state, effects) = run(
            connected_screen_off(),
            &[
                SchedulerEvent::ForceScan,
                SchedulerEvent::ScanFailed(ScanKind::Single),
            ],
        );
        assert_eq!(state.single_scan_restart_count, 1);
        assert_eq!(state.scan_restart_count, 0);
        assert!(effects.contains(&Effect::ArmTimer {
            kind: TimerKind::RestartSingleScan,
            delay: Duration::from_secs(2),
        }));
        let (state, _) = run(state, &[SchedulerEvent::ScanStarted(ScanKind::Single)]);
        assert_eq!(state.single_scan_restart_count, 0);
    }

    #[test]
    fn stale_timer_is_ignored() {
        let (state, effects) = run(
            connected_screen_off(),
            &[SchedulerEvent::TimerFired(TimerKind::PeriodicScan)],
        );
        assert!(effects.is_empty());
        assert_eq!(state, connected_screen_off());
    }

    #[test]
    fn untrusted_toggle_only_rescans_on_change() {
        let (_, effects) = run(
            connected_screen_off(),
            &[SchedulerEvent::UntrustedAllowedChanged(false)],
        );
        assert!(effects.is_empty());
        let (state, effects) = run(
            connected_screen_off(),
            &[SchedulerEvent::UntrustedAllowedChanged(true)],
        );
        assert!(state.untrusted_allowed);
        assert!(!effects.is_empty());
    }

    #[test]
    fn user_selection_forces_next_pass() {
        let (state, _) = run(connected_screen_off(), &[SchedulerEvent::UserSelectedNetwork]);
        assert!(state.force_select);
        let (state, _) = run(state, &[SchedulerEvent::SelectionDone]);
        assert!(!state.force_select);
    }

    #[test]
    fn band_preference_selects_channels() {
        let (_, effects) = run(
            SchedulerState {
                screen_on: true,
                ..connected_screen_off()
            },
            &[SchedulerEvent::BandPreferenceChanged(BandPreference::FiveGhz)],
        );
        assert!(effects.contains(&Effect::StartSingleScan {
            kind: ScanKind::Periodic,
            band: ScanBand::FiveGhzWithDfs,
        }));
    }

    #[test]
    fn disabling_wifi_stops_everything() {
        let (state, _) = run(
            SchedulerState {
                screen_on: true,
                ..SchedulerState::default()
            },
            &[SchedulerEvent::ConnectionStateChanged(WifiState::Disconnected)],
        );
        assert!(state.is_armed(TimerKind::PeriodicScan));
        let (state, effects) = run(state, &[SchedulerEvent::WifiEnabledChanged(false)]);
        assert!(state.armed.is_empty());
        assert_eq!(state.mode, ScanMode::Idle);
        assert!(effects.contains(&Effect::CancelTimer {
            kind: TimerKind::Watchdog,
        }));

        let (state, effects) = run(state, &[SchedulerEvent::ScreenChanged { on: false }]);
        assert!(effects.is_empty());
        assert!(!state.screen_on);
    }

    #[test]
    fn modes_never_overlap() {
        let events = [
            SchedulerEvent::ScreenChanged { on: true },
            SchedulerEvent::ConnectionStateChanged(WifiState::Disconnected),
            SchedulerEvent::ScreenChanged { on: false },
            SchedulerEvent::ConnectionStateChanged(WifiState::Connected),
            SchedulerEvent::ScreenChanged { on: true },
            SchedulerEvent::ScanFailed(ScanKind::Periodic),
            SchedulerEvent::ScreenChanged { on: false },
        ];
        let config = cfg();
        let mut state = SchedulerState::default();
        let mut pno_running = false;
        for event in events {
            let (next, effects) = state.step(event, &config);
            for effect in &effects {
                match effect {
                    Effect::StartPnoScan { .. } => {
                        assert!(!pno_running, "pno started twice");
                        pno_running = true;
                    }
                    Effect::StopPnoScan => pno_running = false,
                    Effect::StartSingleScan { kind: ScanKind::Periodic, .. } => {
                        assert!(!pno_running, "periodic scan while pno active");
                    }
                    _ => {}
                }
            }
            let periodic = next.is_armed(TimerKind::PeriodicScan);
            assert!(!(periodic && matches!(next.mode, ScanMode::Pno(_))));
            state = next;
        }
    }
}
