//! `relayclaw tools`: print the function catalogue sent to the model.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use relayclaw_channels::ChannelMultiplexer;
use relayclaw_workflow::Scheduler;

pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let skills = super::load_skills(&config)?;

    // The cron tools need a scheduler to bind to; nothing is ever fired here.
    let mux = ChannelMultiplexer::new(1, Duration::from_secs(1));
    let scheduler = config
        .scheduler
        .enabled
        .then(|| Arc::new(Scheduler::new(mux.injector(), config.scheduler.default_channel.as_str())));

    let registry = super::build_tools(&config, &skills, scheduler.as_ref())?;
    println!("{}", serde_json::to_string_pretty(&registry.schemas())?);
    Ok(())
}
