//! `batchup config` – where the config lives and what is in effect.

use anyhow::{Context, Result};
use batchup_core::config::BatchupConfig;
use std::path::Path;

pub fn run_config(path: &Path, cfg: &BatchupConfig) -> Result<()> {
    let text = toml::to_string_pretty(cfg).context("serialize config")?;
    println!("# {}", path.display());
    print!("{}", text);
    Ok(())
}
