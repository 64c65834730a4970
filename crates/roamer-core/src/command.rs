// ── Command and notification API ──
//
// Two inbound message kinds reach the worker. Commands come from users
// and are answered on a oneshot; notifications come from drivers and
// the platform and are fire-and-forget.

use serde::Serialize;

use crate::error::CoreError;
use crate::model::{
    BandPreference, Bssid, DisableReason, MacAddress, NetworkConfig, NetworkId, NetworkRequest,
    ScanResult, Uid,
};
use crate::scheduler::{ScanKind, TimerKind};
use crate::selector::{AssociationInfo, Selection};

/// A command envelope sent through the command channel.
pub(crate) struct CommandEnvelope {
    pub uid: Uid,
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// User-facing operations.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Saved networks ───────────────────────────────────────────────
    SaveNetwork(NetworkRequest),
    ForgetNetwork { id: NetworkId },
    EnableNetwork { id: NetworkId },
    DisableNetwork { id: NetworkId },

    // ── Selection ────────────────────────────────────────────────────
    /// Explicit user pick. `persistent` records connect choices over the
    /// networks visible in the last pass.
    SelectNetwork { id: NetworkId, persistent: bool },
    /// Run one selection pass over the given results right away.
    EvaluateScan { results: Vec<ScanResult>, force: bool },

    // ── Device preferences ───────────────────────────────────────────
    SetBandPreference(BandPreference),
    SetUntrustedAllowed(bool),
    SetWifiEnabled(bool),
    ForceScan,
}

/// Result of a command execution.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Ok,
    Saved(NetworkId),
    Forgotten(Box<NetworkConfig>),
    /// Whether the command changed anything.
    Changed(bool),
    Decision(Decision),
}

/// Connection state as reported by the supplicant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected {
        association: AssociationInfo,
        gateway: Option<MacAddress>,
        /// Who asked for this connection, when known.
        uid: Option<Uid>,
    },
    /// `transient` when the supplicant expects to reconnect by itself.
    Disconnected { transient: bool },
    /// Associating, authenticating or obtaining an address.
    Connecting,
    /// The link bounced and is settling.
    Debouncing,
}

/// Driver and platform events.
#[derive(Debug, Clone)]
pub enum Notification {
    ScanResults { kind: ScanKind, results: Vec<ScanResult> },
    /// A scan that had started never produced results.
    ScanFailed { kind: ScanKind },
    Connection(ConnectionEvent),
    RssiChanged { rssi: i32 },
    ScreenChanged { on: bool },
    AssociationRejected { network: NetworkId, bssid: Bssid },
    ConnectionFailure { network: NetworkId, reason: DisableReason },
    Validation { network: NetworkId, has_internet: bool },
    TimerFired { kind: TimerKind, generation: u64 },
    /// The shared engine configuration was replaced.
    ConfigUpdated,
}

/// What the engine did with a scan batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub source: ScanKind,
    pub selection: Option<Selection>,
    pub action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    None,
    AlreadyConnected,
    Roam,
    Connect,
    /// A candidate was found but the attempt budget is spent.
    RateLimited,
}

/// Broadcast to `Controller::events` subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Decision(Decision),
    ScanGaveUp { kind: ScanKind },
    BssidBlacklisted { bssid: Bssid },
    /// The supplicant reported a network the store does not know.
    Desync { network: NetworkId },
    NetworksChanged,
}
