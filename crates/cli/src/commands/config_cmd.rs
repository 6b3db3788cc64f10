//! `relayclaw config`: print the effective configuration.

use std::path::Path;

pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    if !config.has_api_key() {
        eprintln!("warning: no API key configured (set RELAYCLAW_API_KEY or OPENAI_API_KEY)");
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
