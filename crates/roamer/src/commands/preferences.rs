//! Device-wide preferences: band and untrusted networks.

use roamer_core::{BandPreference, Command as CoreCommand};

use crate::cli::{BandArg, BandArgs, GlobalOpts, Toggle, UntrustedArgs};
use crate::error::CliError;

use super::networks::report_change;
use super::util::Session;

pub async fn handle_band(
    session: &Session,
    args: BandArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let band = match args.band {
        BandArg::Auto => BandPreference::Auto,
        BandArg::TwoGhz => BandPreference::TwoGhz,
        BandArg::FiveGhz => BandPreference::FiveGhz,
    };
    let result = session.execute(CoreCommand::SetBandPreference(band)).await?;
    report_change(&result, &format!("Band preference set to {band}"), global.quiet);
    Ok(())
}

pub async fn handle_untrusted(
    session: &Session,
    args: UntrustedArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let allowed = args.state == Toggle::On;
    let result = session.execute(CoreCommand::SetUntrustedAllowed(allowed)).await?;
    let message = if allowed {
        "Untrusted networks allowed"
    } else {
        "Untrusted networks not allowed"
    };
    report_change(&result, message, global.quiet);
    Ok(())
}
