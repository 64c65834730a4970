//! Config subcommand handlers.

use roamer_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = util::config_file(global);

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = util::load_config(global)?;
            // Validate too, so `show` surfaces what a real run would reject.
            cfg.to_engine_config()?;
            let as_toml =
                toml::to_string_pretty(&cfg).map_err(|e| CliError::Render(e.to_string()))?;
            let out = output::render_single(
                &global.format(),
                &cfg,
                |_| as_toml.trim_end().to_owned(),
                |_| as_toml.trim_end().to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init => {
            if path.exists() {
                let prompt = format!("Overwrite {}?", path.display());
                if !util::confirm(&prompt, "config init", global.yes)? {
                    return Err(CliError::Cancelled);
                }
            }
            roamer_config::save_config_to(&Config::default(), &path)?;
            output::print_status(&format!("Wrote defaults to {}", path.display()), global.quiet);
            Ok(())
        }
    }
}
