//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `chat`   | `Chat`           |
//! | `run`    | `Run`            |
//! | `config` | `Config`         |

pub mod chat;
pub mod config;
pub mod run;

pub use chat::cmd_chat;
pub use config::cmd_config;
pub use run::cmd_run;

use anyhow::{Context, Result};
use std::path::PathBuf;

use coder::client::HttpServices;
use coder::config::CoderConfig;

use super::Cli;

/// Resolve configuration with the global CLI overrides applied.
pub fn load_config(cli: &Cli, project_dir: PathBuf) -> Result<CoderConfig> {
    CoderConfig::with_cli_args(project_dir, cli.verbose, cli.base_url.clone())
}

/// HTTP client for the configured backend.
pub fn http_services(config: &CoderConfig) -> Result<HttpServices> {
    HttpServices::new(config.base_url(), config.timeout())
        .context("Failed to build HTTP client")
}
