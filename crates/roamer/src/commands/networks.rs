//! Saved network command handlers.

use serde::Serialize;
use tabled::Tabled;

use roamer_core::{
    Bssid, Command as CoreCommand, CommandResult, MacAddress, NetworkConfig, NetworkId,
    NetworkRequest, SecurityType, SelectionState,
};

use crate::cli::{
    AddNetworkArgs, GlobalOpts, NetworksArgs, NetworksCommand, OutputFormat, SecurityArg,
};
use crate::error::CliError;
use crate::output::{self, Tone};

use super::util::{self, Session};

// ── Views ───────────────────────────────────────────────────────────

/// Serializable view of a saved network. The passphrase never leaves
/// the store; only its presence is shown.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkView {
    pub id: u32,
    pub ssid: String,
    pub security: SecurityType,
    pub has_psk: bool,
    pub priority: i32,
    pub hidden: bool,
    pub bssid: Option<Bssid>,
    pub default_gateway: Option<MacAddress>,
    pub fqdn: Option<String>,
    pub state: SelectionState,
    pub disable_reason: Option<String>,
    pub disabled_at: Option<String>,
    pub connect_choice: Option<ConnectChoiceView>,
    pub linked: Vec<u32>,
    pub creator_uid: u32,
    pub last_connect_uid: Option<u32>,
    pub validated_internet: bool,
    pub no_internet_reports: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectChoiceView {
    pub key: String,
    pub strength: String,
    pub recorded_at: String,
}

impl From<&NetworkConfig> for NetworkView {
    fn from(n: &NetworkConfig) -> Self {
        Self {
            id: n.id.get(),
            ssid: n.ssid.clone(),
            security: n.security,
            has_psk: n.psk.is_some(),
            priority: n.priority,
            hidden: n.hidden,
            bssid: n.bssid.clone(),
            default_gateway: n.default_gateway.clone(),
            fqdn: n.fqdn.clone(),
            state: n.status.state(),
            disable_reason: n.status.disable_reason().as_ref().map(ToString::to_string),
            disabled_at: n.status.disable_time_ms().map(util::format_millis),
            connect_choice: n.status.connect_choice.as_ref().map(|c| ConnectChoiceView {
                key: c.key.to_string(),
                strength: c.strength.to_string(),
                recorded_at: util::format_millis(c.timestamp_ms),
            }),
            linked: n.linked.iter().map(|id| id.get()).collect(),
            creator_uid: n.creator_uid,
            last_connect_uid: n.last_connect_uid,
            validated_internet: n.validated_internet,
            no_internet_reports: n.num_no_internet_reports,
        }
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct NetworkRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "SSID")]
    ssid: String,
    #[tabled(rename = "Security")]
    security: String,
    #[tabled(rename = "Priority")]
    priority: i32,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Prefers")]
    prefers: String,
}

fn row(n: &NetworkView, color: bool) -> NetworkRow {
    NetworkRow {
        id: n.id,
        ssid: if n.hidden {
            format!("{} (hidden)", n.ssid)
        } else {
            n.ssid.clone()
        },
        security: n.security.to_string(),
        priority: n.priority,
        state: state_label(n, color),
        prefers: n
            .connect_choice
            .as_ref()
            .map(|c| format!("{} ({})", c.key, c.strength))
            .unwrap_or_default(),
    }
}

fn state_label(n: &NetworkView, color: bool) -> String {
    let (text, tone) = match n.state {
        SelectionState::Enabled => ("enabled".to_owned(), Tone::Good),
        SelectionState::TemporarilyDisabled => (
            format!("disabled ({})", n.disable_reason.as_deref().unwrap_or("-")),
            Tone::Warn,
        ),
        SelectionState::PermanentlyDisabled => (
            format!("off ({})", n.disable_reason.as_deref().unwrap_or("-")),
            Tone::Bad,
        ),
    };
    output::paint(&text, tone, color)
}

fn detail(n: &NetworkView) -> String {
    let dash = || "-".to_owned();
    let mut lines = vec![
        format!("ID:          {}", n.id),
        format!("SSID:        {}", n.ssid),
        format!("Security:    {}", n.security),
        format!("Passphrase:  {}", if n.has_psk { "set" } else { "-" }),
        format!("Priority:    {}", n.priority),
        format!("Hidden:      {}", n.hidden),
        format!("BSSID:       {}", n.bssid.as_ref().map_or_else(dash, ToString::to_string)),
        format!(
            "Gateway:     {}",
            n.default_gateway.as_ref().map_or_else(dash, ToString::to_string)
        ),
        format!("State:       {}", n.state),
    ];
    if let Some(reason) = &n.disable_reason {
        lines.push(format!("Reason:      {reason}"));
    }
    if let Some(at) = &n.disabled_at {
        lines.push(format!("Disabled at: {at}"));
    }
    if let Some(choice) = &n.connect_choice {
        lines.push(format!(
            "Prefers:     {} ({}, {})",
            choice.key, choice.strength, choice.recorded_at
        ));
    }
    if !n.linked.is_empty() {
        let linked: Vec<String> = n.linked.iter().map(ToString::to_string).collect();
        lines.push(format!("Linked:      {}", linked.join(", ")));
    }
    lines.push(format!("Creator uid: {}", n.creator_uid));
    lines.join("\n")
}

fn request(args: AddNetworkArgs) -> NetworkRequest {
    let security = match args.security {
        SecurityArg::Open => SecurityType::Open,
        SecurityArg::Wep => SecurityType::Wep,
        SecurityArg::Psk => SecurityType::Psk,
        SecurityArg::Eap => SecurityType::Eap,
    };
    let mut req = NetworkRequest::new(args.ssid, security).with_priority(args.priority);
    if let Some(psk) = args.psk {
        req = req.with_psk(psk);
    }
    if let Some(gateway) = args.gateway {
        req = req.with_gateway(MacAddress::new(gateway));
    }
    req.hidden = args.hidden;
    req.bssid = args.bssid.map(Bssid::new);
    req
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    session: &Session,
    args: NetworksArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let format = global.format();
    let color = output::should_color(&global.color_mode());

    match args.command {
        NetworksCommand::List => {
            let views: Vec<NetworkView> = session
                .controller
                .networks_snapshot()
                .iter()
                .map(|n| NetworkView::from(n.as_ref()))
                .collect();
            let out =
                output::render_list(&format, &views, |n| row(n, color), |n| n.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NetworksCommand::Show { id } => {
            let network = util::find_network(session, id)?;
            let view = NetworkView::from(network.as_ref());
            let out = output::render_single(&format, &view, detail, |n| n.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NetworksCommand::Add(args) => {
            let ssid = args.ssid.clone();
            let result = session.execute(CoreCommand::SaveNetwork(request(args))).await?;
            if let CommandResult::Saved(id) = result {
                output::print_status(&format!("Saved network {id} ({ssid})"), global.quiet);
                if format == OutputFormat::Plain {
                    output::print_output(&id.to_string(), global.quiet);
                }
            }
            Ok(())
        }

        NetworksCommand::Forget { id } => {
            let id = NetworkId::new(id);
            let prompt = format!("Forget network {id}?");
            if !util::confirm(&prompt, "networks forget", global.yes)? {
                return Err(CliError::Cancelled);
            }
            let result = session.execute(CoreCommand::ForgetNetwork { id }).await?;
            if let CommandResult::Forgotten(network) = result {
                output::print_status(
                    &format!("Forgot network {id} ({})", network.ssid),
                    global.quiet,
                );
            }
            Ok(())
        }

        NetworksCommand::Enable { id } => {
            let id = NetworkId::new(id);
            let result = session.execute(CoreCommand::EnableNetwork { id }).await?;
            report_change(&result, &format!("Enabled network {id}"), global.quiet);
            Ok(())
        }

        NetworksCommand::Disable { id } => {
            let id = NetworkId::new(id);
            let result = session.execute(CoreCommand::DisableNetwork { id }).await?;
            report_change(&result, &format!("Disabled network {id}"), global.quiet);
            Ok(())
        }
    }
}

pub(super) fn report_change(result: &CommandResult, message: &str, quiet: bool) {
    match result {
        CommandResult::Changed(false) => {
            output::print_status(&format!("{message} (unchanged)"), quiet);
        }
        _ => output::print_status(message, quiet),
    }
}
