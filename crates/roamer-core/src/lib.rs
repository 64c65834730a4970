//! Wi-Fi network selection engine: which saved network and access point
//! a station should be on, and when to scan for a better one.
//!
//! - **[`Controller`]**: cloneable facade over a single worker task that
//!   owns all mutable state. [`start()`](Controller::start) spawns it;
//!   user operations go through [`execute()`](Controller::execute), driver
//!   events through [`notify()`](Controller::notify).
//!
//! - **[`ConfigStore`]**: the saved networks, their scan detail caches,
//!   linkage and enable/disable status, written through to a
//!   [`ConfigPersistence`] backend.
//!
//! - **[`NetworkSelector`]**: scores a scan batch against the store and
//!   returns the best candidate, honouring user connect choices and a
//!   per-BSSID blacklist.
//!
//! - **[`scheduler`]**: the connectivity scan scheduler as a pure
//!   `(state, event) -> (state, effects)` transition function.
//!
//! - **[`Engine`]**: the glue that executes scheduler effects against the
//!   drivers and turns selector decisions into roams and connects.

pub mod alarm;
pub mod autojoin;
pub mod clock;
pub mod command;
pub mod config;
pub mod controller;
pub mod driver;
pub mod engine;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod selector;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use alarm::{AlarmService, ManualAlarms};
pub use autojoin::{
    AutoJoin, EngineMetrics, compare_networks, compare_networks_with_scorer, rank_networks,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{
    Action, Command, CommandResult, ConnectionEvent, Decision, EngineEvent, Notification,
};
pub use config::{AutoJoinConfig, EngineConfig, ScheduleConfig, SelectorConfig, StoreConfig};
pub use controller::Controller;
pub use driver::{
    NetworkScorer, NullDriver, PnoMode, PnoNetwork, PnoSettings, ScanBand, ScanDriver,
    ScanSettings, StationDriver,
};
pub use engine::{Drivers, Engine, EngineStatus};
pub use error::CoreError;
pub use scheduler::{
    Effect, ScanKind, ScanMode, SchedulerEvent, SchedulerState, TimerKind, WifiState,
};
pub use selector::{
    AssociationInfo, CandidateScore, ConnectKind, LinkStatus, NetworkSelector, ScoreBreakdown,
    Selection, SelectionRequest,
};
pub use store::{ConfigPersistence, ConfigStore, JsonFileStore, MemoryStore, PersistedState};
pub use stream::{NetworkSnapshot, NetworkStream};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Band, BandPreference, Bssid, ConfigKey, ConnectChoice, DisableReason, MacAddress,
    NetworkConfig, NetworkId, NetworkRequest, NetworkSelectionStatus, PreferenceStrength,
    SYSTEM_UID, ScanResult, SecurityType, SelectionState, UNKNOWN_UID, Uid,
};
