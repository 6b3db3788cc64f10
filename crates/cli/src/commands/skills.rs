//! `relayclaw skills`: list installed skills.

use std::path::Path;

pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let skills = super::load_skills(&config)?;

    if skills.is_empty() {
        println!("No skills found in {}", config.skills.dir.display());
        return Ok(());
    }

    for skill in skills.skills() {
        println!("{}", skill.name);
        if !skill.description.is_empty() {
            println!("   {}", skill.description);
        }
        println!("   Path: {}", skill.path.display());
        if !skill.env.is_empty() {
            let keys: Vec<&str> = skill.env.iter().map(|(k, _)| k.as_str()).collect();
            println!("   Env:  {}", keys.join(", "));
        }
        if !skill.missing_bins.is_empty() {
            println!("   Missing binaries: {}", skill.missing_bins.join(", "));
        }
    }
    Ok(())
}
