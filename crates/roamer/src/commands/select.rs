//! User network selection.

use roamer_core::{Command as CoreCommand, NetworkId};

use crate::cli::{GlobalOpts, SelectArgs};
use crate::error::CliError;

use super::networks::report_change;
use super::util::Session;

pub async fn handle(
    session: &Session,
    args: SelectArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = NetworkId::new(args.id);
    let result = session
        .execute(CoreCommand::SelectNetwork {
            id,
            persistent: !args.transient,
        })
        .await?;

    let message = if args.transient {
        format!("Selected network {id} for this connection")
    } else {
        format!("Selected network {id}")
    };
    report_change(&result, &message, global.quiet);
    Ok(())
}
