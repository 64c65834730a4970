// ── Network selection status ──
//
// Enabled → TemporarilyDisabled → PermanentlyDisabled, driven by
// per-reason failure counters. A reason only disables the network once
// its counter reaches the reason's threshold.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::ids::ConfigKey;
use super::scan::ScanResult;
use crate::clock::millis;

/// Why a network was disabled.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DisableReason {
    BadLink,
    AssociationRejection,
    AuthenticationFailure,
    DhcpFailure,
    DnsFailure,
    TlsVersionMismatch,
    NoCredentials,
    NoInternet,
    ByWifiManager,
    ByUser,
}

impl DisableReason {
    /// Failures of this kind needed before the network is disabled.
    pub fn threshold(self) -> u32 {
        match self {
            Self::AssociationRejection
            | Self::AuthenticationFailure
            | Self::DhcpFailure
            | Self::DnsFailure => 5,
            Self::BadLink
            | Self::TlsVersionMismatch
            | Self::NoCredentials
            | Self::NoInternet
            | Self::ByWifiManager
            | Self::ByUser => 1,
        }
    }

    /// How long a temporary disable lasts. `None` for permanent reasons.
    pub fn timeout(self) -> Option<Duration> {
        match self {
            Self::BadLink => Some(Duration::from_secs(15 * 60)),
            Self::AssociationRejection | Self::DhcpFailure | Self::DnsFailure => {
                Some(Duration::from_secs(5 * 60))
            }
            Self::AuthenticationFailure
            | Self::TlsVersionMismatch
            | Self::NoCredentials
            | Self::NoInternet
            | Self::ByWifiManager
            | Self::ByUser => None,
        }
    }

    pub fn is_permanent(self) -> bool {
        self.timeout().is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SelectionState {
    #[default]
    Enabled,
    TemporarilyDisabled,
    PermanentlyDisabled,
}

/// A status transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Enable,
    Disable(DisableReason),
}

/// How strongly a recorded connect choice reflects a user override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PreferenceStrength {
    /// The chosen network was much stronger anyway.
    Weak,
    Moderate,
    /// The user picked a network that was weaker or about as strong.
    Strong,
}

/// "This network was passed over in favour of `key`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectChoice {
    pub key: ConfigKey,
    pub timestamp_ms: u64,
    pub strength: PreferenceStrength,
}

/// Enable/disable state plus the transient annotations of the most
/// recent selection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSelectionStatus {
    #[serde(default)]
    state: SelectionState,
    #[serde(default)]
    disable_reason: Option<DisableReason>,
    #[serde(default)]
    disable_time_ms: Option<u64>,
    #[serde(default)]
    counters: BTreeMap<DisableReason, u32>,
    #[serde(default)]
    pub connect_choice: Option<ConnectChoice>,

    #[serde(skip)]
    candidate: Option<ScanResult>,
    #[serde(skip)]
    candidate_score: Option<i32>,
    #[serde(skip)]
    seen_in_last_selection: bool,
}

impl NetworkSelectionStatus {
    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn disable_reason(&self) -> Option<DisableReason> {
        self.disable_reason
    }

    pub fn disable_time_ms(&self) -> Option<u64> {
        self.disable_time_ms
    }

    pub fn disable_counter(&self, reason: DisableReason) -> u32 {
        self.counters.get(&reason).copied().unwrap_or(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.state == SelectionState::Enabled
    }

    pub fn is_temporarily_disabled(&self) -> bool {
        self.state == SelectionState::TemporarilyDisabled
    }

    pub fn is_permanently_disabled(&self) -> bool {
        self.state == SelectionState::PermanentlyDisabled
    }

    /// Apply a transition. Returns true when anything changed.
    pub fn apply(&mut self, update: StatusUpdate, now_ms: u64) -> bool {
        match update {
            StatusUpdate::Enable => {
                let changed = !self.is_enabled() || !self.counters.is_empty();
                self.state = SelectionState::Enabled;
                self.disable_reason = None;
                self.disable_time_ms = None;
                self.counters.clear();
                changed
            }
            StatusUpdate::Disable(reason) => {
                if self.is_permanently_disabled() {
                    return false;
                }
                let counter = self.counters.entry(reason).or_insert(0);
                *counter = counter.saturating_add(1);
                if *counter < reason.threshold() {
                    return true;
                }
                self.state = if reason.is_permanent() {
                    SelectionState::PermanentlyDisabled
                } else {
                    SelectionState::TemporarilyDisabled
                };
                self.disable_reason = Some(reason);
                self.disable_time_ms = Some(now_ms);
                true
            }
        }
    }

    /// Re-enable a temporarily disabled network whose timeout elapsed.
    pub fn try_enable(&mut self, now_ms: u64) -> bool {
        if !self.is_temporarily_disabled() {
            return false;
        }
        let (Some(reason), Some(since)) = (self.disable_reason, self.disable_time_ms) else {
            return self.apply(StatusUpdate::Enable, now_ms);
        };
        match reason.timeout() {
            Some(timeout) if now_ms.saturating_sub(since) >= millis(timeout) => {
                self.apply(StatusUpdate::Enable, now_ms)
            }
            _ => false,
        }
    }

    // ── Per-pass annotations ─────────────────────────────────────────

    pub fn candidate(&self) -> Option<&ScanResult> {
        self.candidate.as_ref()
    }

    pub fn candidate_score(&self) -> Option<i32> {
        self.candidate_score
    }

    pub fn seen_in_last_selection(&self) -> bool {
        self.seen_in_last_selection
    }

    pub(crate) fn reset_candidate(&mut self) {
        self.candidate = None;
        self.candidate_score = None;
        self.seen_in_last_selection = false;
    }

    pub(crate) fn mark_seen(&mut self) {
        self.seen_in_last_selection = true;
    }

    /// Keep `result` as the cached candidate if it beats the current one.
    pub(crate) fn offer_candidate(&mut self, result: &ScanResult, score: i32) {
        if self.candidate_score.is_none_or(|best| score > best) {
            self.candidate = Some(result.clone());
            self.candidate_score = Some(score);
        }
    }

    pub(crate) fn set_candidate(&mut self, result: ScanResult) {
        self.candidate = Some(result);
    }
}
