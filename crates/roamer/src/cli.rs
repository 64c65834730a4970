//! Clap derive structures for the `roamer` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// roamer -- saved Wi-Fi networks and network selection
#[derive(Debug, Parser)]
#[command(
    name = "roamer",
    version,
    about = "Manage saved Wi-Fi networks and run network selection",
    long_about = "Manage the saved Wi-Fi network store and replay recorded scan\n\
        results through the selection engine to see which network and access\n\
        point it would pick, and why.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Saved network state file (overrides the config file)
    #[arg(long, env = "ROAMER_STORE_PATH", global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "ROAMER_CONFIG", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Caller uid for permission checks
    #[arg(long, env = "ROAMER_UID", global = true, default_value_t = roamer_core::SYSTEM_UID)]
    pub uid: u32,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', env = "ROAMER_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

impl GlobalOpts {
    pub fn format(&self) -> OutputFormat {
        self.output.clone().unwrap_or(OutputFormat::Table)
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color.clone().unwrap_or(ColorMode::Auto)
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage saved networks
    #[command(alias = "net", alias = "n")]
    Networks(NetworksArgs),

    /// Pick a saved network as the user's choice
    Select(SelectArgs),

    /// Set the band preference used for scanning and selection
    Band(BandArgs),

    /// Allow or forbid connecting to untrusted open networks
    Untrusted(UntrustedArgs),

    /// Run one selection pass over recorded scan results
    Scan(ScanArgs),

    /// Manage the CLI configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Networks ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NetworksArgs {
    #[command(subcommand)]
    pub command: NetworksCommand,
}

#[derive(Debug, Subcommand)]
pub enum NetworksCommand {
    /// List saved networks
    #[command(alias = "ls")]
    List,

    /// Show one saved network
    #[command(alias = "get")]
    Show {
        /// Network id
        id: u32,
    },

    /// Save a network, or update the one with the same SSID and security
    Add(AddNetworkArgs),

    /// Remove a saved network
    #[command(alias = "rm")]
    Forget {
        /// Network id
        id: u32,
    },

    /// Re-enable a disabled network
    Enable {
        /// Network id
        id: u32,
    },

    /// Disable a network for automatic selection
    Disable {
        /// Network id
        id: u32,
    },
}

#[derive(Debug, Args)]
pub struct AddNetworkArgs {
    /// Network name
    #[arg(long)]
    pub ssid: String,

    /// Security type
    #[arg(long, value_enum)]
    pub security: SecurityArg,

    /// Pre-shared key (psk networks)
    #[arg(long)]
    pub psk: Option<String>,

    /// Hidden network: probed for explicitly when scanning
    #[arg(long)]
    pub hidden: bool,

    /// Higher priority wins ties between saved networks
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub priority: i32,

    /// Only ever use this access point
    #[arg(long, value_name = "BSSID")]
    pub bssid: Option<String>,

    /// Default gateway MAC, used to link networks behind the same router
    #[arg(long, value_name = "MAC")]
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SecurityArg {
    Open,
    Wep,
    Psk,
    Eap,
}

// ── Selection & preferences ──────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SelectArgs {
    /// Network id
    pub id: u32,

    /// Connect without recording a lasting preference
    #[arg(long)]
    pub transient: bool,
}

#[derive(Debug, Args)]
pub struct BandArgs {
    pub band: BandArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BandArg {
    Auto,
    #[value(name = "2g")]
    TwoGhz,
    #[value(name = "5g")]
    FiveGhz,
}

#[derive(Debug, Args)]
pub struct UntrustedArgs {
    pub state: Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

// ── Scan ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// JSON file holding an array of scan results
    #[arg(long, value_name = "FILE")]
    pub results: PathBuf,

    /// Saved network the station is currently associated with
    #[arg(long, value_name = "ID", requires_all = ["bssid", "rssi", "frequency"])]
    pub connected: Option<u32>,

    /// BSSID of the current association
    #[arg(long, requires = "connected")]
    pub bssid: Option<String>,

    /// RSSI of the current association, in dBm
    #[arg(long, requires = "connected", allow_negative_numbers = true)]
    pub rssi: Option<i32>,

    /// Frequency of the current association, in MHz
    #[arg(long, requires = "connected")]
    pub frequency: Option<u32>,

    /// Select even when the current connection is good enough
    #[arg(long)]
    pub force: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Write a configuration file holding the defaults
    Init,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
