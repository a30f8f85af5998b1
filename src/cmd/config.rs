//! Configuration view and validation commands (`coder config`).

use anyhow::Result;
use std::path::PathBuf;

use coder::config::{CODER_DIR, CONFIG_FILE, CoderToml};

use super::super::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, project_dir: PathBuf, command: Option<ConfigCommands>) -> Result<()> {
    let coder_dir = project_dir.join(CODER_DIR);
    let config_path = coder_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Coder Configuration");
            println!("===================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();
                CoderToml::load(&config_path)?
            } else {
                println!("No coder.toml found at {}", config_path.display());
                println!();
                println!("Using default configuration:");
                CoderToml::default()
            };
            print_sections(&toml);

            println!("Effective values (with env/CLI overrides):");
            let config = super::load_config(cli, project_dir)?;
            println!("  base_url = \"{}\"", config.base_url());
            println!("  timeout_secs = {}", config.timeout().as_secs());
            println!("  scratch_file = \"{}\"", config.scratch_file().display());
            println!();

            if !config_path.exists() {
                println!("Run 'coder config init' to create a coder.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No coder.toml found. Checking defaults with env/CLI overrides.");
                println!();
            }

            let config = super::load_config(cli, project_dir)?;
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("coder.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !coder_dir.exists() {
                std::fs::create_dir_all(&coder_dir)?;
            }

            let toml = CoderToml::default();
            toml.save(&config_path)?;

            println!("Created coder.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [service] base_url, timeout_secs");
            println!("  - [history] threshold, batch_size, context_window");
            println!("  - [editor] language, scratch_file");
            println!();
        }
    }

    Ok(())
}

fn print_sections(toml: &CoderToml) {
    println!("[service]");
    println!("  base_url = \"{}\"", toml.service.base_url);
    println!("  timeout_secs = {}", toml.service.timeout_secs);
    println!();

    println!("[history]");
    println!("  threshold = {}", toml.history.threshold);
    println!("  batch_size = {}", toml.history.batch_size);
    println!("  context_window = {}", toml.history.context_window);
    println!();

    println!("[editor]");
    println!("  language = \"{}\"", toml.editor.language);
    println!("  scratch_file = \"{}\"", toml.editor.scratch_file);
    println!();
}
