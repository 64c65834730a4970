//! One selection pass over recorded scan results.

use std::path::Path;

use serde::Serialize;

use roamer_core::{
    Action, AssociationInfo, Band, Bssid, CandidateScore, Command as CoreCommand, CommandResult,
    ConnectKind, ConnectionEvent, Decision, Notification, ScanKind, ScanResult,
};

use crate::cli::{GlobalOpts, ScanArgs};
use crate::error::CliError;
use crate::output::{self, Tone};

use super::util::{self, Session};

// ── Views ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct DecisionView {
    action: Action,
    source: ScanKind,
    /// Network the station was on when the pass ran.
    current: Option<u32>,
    selection: Option<SelectionView>,
}

#[derive(Debug, Serialize)]
struct SelectionView {
    network: u32,
    ssid: String,
    kind: ConnectKind,
    candidate: CandidateView,
    score: CandidateScore,
}

#[derive(Debug, Serialize)]
struct CandidateView {
    bssid: Bssid,
    rssi: Option<i32>,
    frequency: u32,
    band: Option<Band>,
}

impl DecisionView {
    fn new(decision: Decision, current: Option<u32>) -> Self {
        Self {
            action: decision.action,
            source: decision.source,
            current,
            selection: decision.selection.map(|s| SelectionView {
                network: s.network.id.get(),
                ssid: s.network.ssid,
                kind: s.kind,
                candidate: CandidateView {
                    band: s.candidate.band(),
                    bssid: s.candidate.bssid,
                    rssi: s.candidate.rssi,
                    frequency: s.candidate.frequency,
                },
                score: s.score,
            }),
        }
    }
}

fn action_tone(action: Action) -> Tone {
    match action {
        Action::Roam | Action::Connect => Tone::Good,
        Action::RateLimited => Tone::Warn,
        Action::None | Action::AlreadyConnected => Tone::Dim,
    }
}

fn detail(view: &DecisionView, color: bool) -> String {
    let action = output::paint(&view.action.to_string(), action_tone(view.action), color);
    let mut lines = vec![format!("Decision:   {action}")];
    if let Some(current) = view.current {
        lines.push(format!("Current:    network {current}"));
    }
    let Some(sel) = &view.selection else {
        lines.push("Candidate:  none, staying on the current network".into());
        return lines.join("\n");
    };

    let band = sel.candidate.band.map_or_else(|| "?".to_owned(), |b| b.to_string());
    let rssi = sel
        .candidate
        .rssi
        .map_or_else(|| "-".to_owned(), |r| format!("{r} dBm"));
    lines.push(format!("Network:    {} ({})", sel.network, sel.ssid));
    lines.push(format!(
        "Candidate:  {} {} MHz ({band}) {rssi}",
        sel.candidate.bssid, sel.candidate.frequency
    ));
    match &sel.score {
        CandidateScore::Saved(b) => {
            lines.push(format!("Score:      {}", b.total));
            lines.push(format!("  rssi            {:>5}", b.rssi));
            lines.push(format!("  band            {:>5}", b.band));
            lines.push(format!("  last selection  {:>5}", b.last_selection));
            lines.push(format!("  same network    {:>5}", b.same_network));
            lines.push(format!("  same bssid      {:>5}", b.same_bssid));
            lines.push(format!("  security        {:>5}", b.security));
            lines.push(format!("  no internet     {:>5}", b.no_internet_penalty));
        }
        CandidateScore::Untrusted { score } => {
            lines.push(format!("Score:      {score} (reputation service)"));
        }
    }
    lines.join("\n")
}

// ── Input ───────────────────────────────────────────────────────────

/// Read a JSON array of scan results. Results without an observation
/// time are taken as seen now, so they count as fresh.
fn read_results(path: &Path) -> Result<Vec<ScanResult>, CliError> {
    let raw = std::fs::read_to_string(path)?;
    let mut results: Vec<ScanResult> = serde_json::from_str(&raw)?;
    let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
    for result in results.iter_mut().filter(|r| r.seen_ms == 0) {
        result.seen_ms = now;
    }
    tracing::debug!(path = %path.display(), count = results.len(), "loaded scan results");
    Ok(results)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    session: &Session,
    args: ScanArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let results = read_results(&args.results)?;

    let current = match (args.connected, args.bssid, args.rssi, args.frequency) {
        (Some(id), Some(bssid), Some(rssi), Some(frequency)) => {
            let network = util::find_network(session, id)?;
            session
                .controller
                .notify(Notification::Connection(ConnectionEvent::Connected {
                    association: AssociationInfo {
                        network: network.id,
                        bssid: Bssid::new(bssid),
                        rssi,
                        frequency,
                    },
                    gateway: network.default_gateway.clone(),
                    uid: None,
                }))
                .await?;
            Some(id)
        }
        _ => None,
    };

    let result = session
        .execute(CoreCommand::EvaluateScan {
            results,
            force: args.force,
        })
        .await?;
    let CommandResult::Decision(decision) = result else {
        return Err(CliError::Engine {
            message: "selection pass returned no decision".into(),
        });
    };

    // Associated with nothing better in sight is a valid outcome; with no
    // association it means nothing to join.
    if decision.selection.is_none() && current.is_none() {
        return Err(CliError::NoCandidate);
    }

    let view = DecisionView::new(decision, current);
    let color = output::should_color(&global.color_mode());
    let out = output::render_single(
        &global.format(),
        &view,
        |v| detail(v, color),
        |v| v.action.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
