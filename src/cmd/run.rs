//! One-shot execution (`coder run <file>`).

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use coder::execution::ExecutionCoordinator;

use super::super::Cli;

pub async fn cmd_run(cli: &Cli, project_dir: PathBuf, file: &Path) -> Result<()> {
    let path = if file.is_absolute() {
        file.to_path_buf()
    } else {
        project_dir.join(file)
    };
    let code = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = super::load_config(cli, project_dir)?;
    let services = super::http_services(&config)?;
    let coordinator = ExecutionCoordinator::new(Arc::new(services));

    let Some(report) = coordinator.run(&code).await else {
        println!("Nothing to run: {} is empty.", path.display());
        return Ok(());
    };

    if report.succeeded() {
        println!("{}", report.output);
        Ok(())
    } else {
        println!("{}", console::style(&report.output).red());
        anyhow::bail!("Run {} failed", report.run_id)
    }
}
