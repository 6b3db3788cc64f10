pub mod config_cmd;
pub mod run;
pub mod skills;
pub mod tools;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use relayclaw_config::AppConfig;
use relayclaw_core::tool::ToolRegistry;
use relayclaw_skills::SkillLibrary;
use relayclaw_workflow::Scheduler;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    AppConfig::load(path).context("Failed to load config")
}

pub fn load_skills(config: &AppConfig) -> anyhow::Result<SkillLibrary> {
    if !config.skills.enabled {
        return Ok(SkillLibrary::default());
    }
    SkillLibrary::load(&config.skills.dir)
        .with_context(|| format!("Failed to load skills from {}", config.skills.dir.display()))
}

/// Built-in tools plus the cron tools when a scheduler is running.
pub fn build_tools(
    config: &AppConfig,
    skills: &SkillLibrary,
    scheduler: Option<&Arc<Scheduler>>,
) -> anyhow::Result<ToolRegistry> {
    let mut registry = relayclaw_tools::builtin_registry(&config.tools, skills.env())?;
    if let Some(scheduler) = scheduler {
        for tool in relayclaw_workflow::cron_tools(scheduler) {
            registry.register(tool)?;
        }
    }
    Ok(registry)
}

/// The base prompt followed by the skill catalogue, if any.
pub fn system_prompt(config: &AppConfig, skills: &SkillLibrary) -> String {
    let context = skills.context();
    if context.is_empty() {
        config.agent.system_prompt.clone()
    } else {
        format!("{} {}", config.agent.system_prompt, context)
    }
}
