//! File-backed logging.
//!
//! The terminal belongs to the TUI, so log lines never go to stdout/stderr.

use crate::model::PipelineConfig;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// `<cache_dir>/ptrap/ptrap.log`
fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("ptrap").join("ptrap.log"))
}

/// Initialize logging.
///
/// Logs go to `--log-file` if given, otherwise to the default path when `RUST_LOG`
/// is set. With neither, logging stays off. `RUST_LOG` overrides `--log-level`.
pub fn init(cfg: &PipelineConfig) -> Result<()> {
    let path = match (&cfg.log_file, std::env::var_os("RUST_LOG")) {
        (Some(path), _) => path.clone(),
        (None, Some(_)) => default_log_path().context("resolve cache directory for logs")?,
        (None, None) => return Ok(()),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("initialize logging: {e}"))?;
    Ok(())
}
