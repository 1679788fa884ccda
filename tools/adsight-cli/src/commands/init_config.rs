//! Write the default configuration to disk.

use std::path::PathBuf;

use adsight_common::config::AppConfig;

pub fn run(output: Option<PathBuf>) -> anyhow::Result<()> {
    let path = AppConfig::default()
        .save(output.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to write config: {e}"))?;
    println!("Default configuration written to: {}", path.display());
    Ok(())
}
