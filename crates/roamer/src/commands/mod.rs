//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod config_cmd;
pub mod networks;
pub mod preferences;
pub mod scan;
pub mod select;
pub mod util;

use roamer_config::Config;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a store-bound command. Opens the controller, runs the
/// handler, and shuts the worker down again whatever the outcome.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let session = util::Session::open(cfg, global).await?;
    let result = match cmd {
        Command::Networks(args) => networks::handle(&session, args, global).await,
        Command::Select(args) => select::handle(&session, args, global).await,
        Command::Band(args) => preferences::handle_band(&session, args, global).await,
        Command::Untrusted(args) => preferences::handle_untrusted(&session, args, global).await,
        Command::Scan(args) => scan::handle(&session, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    };
    session.close().await;
    result.map_err(|e| e.with_store_path(&session.store_path))
}
