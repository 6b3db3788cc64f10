//! `relayclaw run`: the full runtime.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use relayclaw_agent::{Orchestrator, OrchestratorSettings};
use relayclaw_channels::{ChannelMultiplexer, ConsoleChannel, TelegramChannel};
use relayclaw_core::event::{DomainEvent, EventBus};
use relayclaw_workflow::Scheduler;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let skills = super::load_skills(&config)?;
    let provider = relayclaw_providers::build_from_config(&config.provider)
        .context("Failed to build provider")?;

    let mut mux = ChannelMultiplexer::new(
        config.channels.inbound_capacity,
        config.channels.delivery_timeout(),
    );
    if config.channels.console.enabled {
        mux.register(Arc::new(ConsoleChannel::new()));
    }
    if config.channels.telegram.enabled {
        let telegram = TelegramChannel::from_config(&config.channels.telegram)
            .context("Failed to set up Telegram channel")?;
        mux.register(Arc::new(telegram));
    }

    let scheduler = config.scheduler.enabled.then(|| {
        Arc::new(Scheduler::new(
            mux.injector(),
            config.scheduler.default_channel.as_str(),
        ))
    });
    if let Some(scheduler) = &scheduler {
        let errors = scheduler.load_jobs(&config.scheduler.jobs).await;
        info!(
            loaded = config.scheduler.jobs.len() - errors.len(),
            total = config.scheduler.jobs.len(),
            "Scheduled jobs loaded from config"
        );
    }

    let tools = super::build_tools(&config, &skills, scheduler.as_ref())?;
    info!(tools = ?tools.names(), skills = skills.len(), "Tools ready");

    let channels = Arc::new(mux);
    let event_bus = Arc::new(EventBus::default());
    let shutdown = CancellationToken::new();
    let orchestrator = Arc::new(
        Orchestrator::new(
            provider,
            Arc::new(tools),
            channels.clone(),
            event_bus.clone(),
            OrchestratorSettings::from_config(&config.provider, &config.agent),
        )
        .with_shutdown(shutdown.clone()),
    );
    orchestrator
        .set_system_prompt(super::system_prompt(&config, &skills))
        .await?;

    let inbound = channels
        .messages()
        .context("Inbound queue already taken")?;
    channels.start().await.context("Failed to start channels")?;
    if !channels.is_empty() {
        // The runtime ends once every endpoint has closed and its last
        // messages have been answered.
        channels.close_inbound();
    }

    let events = spawn_event_logger(&event_bus, shutdown.clone());
    let ticker = scheduler.map(|s| s.start(shutdown.clone()));
    let mut runner = tokio::spawn(orchestrator.clone().run(inbound));

    info!(
        provider = %config.provider.name,
        model = %config.provider.model,
        channels = ?channels.names(),
        "RelayClaw running; press Ctrl+C to stop"
    );

    let drained = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for Ctrl+C");
            }
            false
        }
        joined = &mut runner => {
            if let Err(e) = joined {
                warn!(error = %e, "Orchestrator task failed");
            }
            info!("All channels closed");
            true
        }
    };

    info!("Shutting down");
    orchestrator.shutdown();
    channels.stop().await;
    if !drained {
        if let Err(e) = runner.await {
            warn!(error = %e, "Orchestrator task failed");
        }
    }
    if let Some(ticker) = ticker {
        let _ = ticker.await;
    }
    let _ = events.await;
    Ok(())
}

/// Log domain events at debug level until shutdown.
fn spawn_event_logger(
    event_bus: &EventBus,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => event,
            };
            match event {
                Ok(event) => match event.as_ref() {
                    DomainEvent::ExchangeTruncated { channel, max_turns, .. } => {
                        warn!(channel = %channel, max_turns, "Exchange truncated");
                    }
                    DomainEvent::ErrorOccurred { context, error_message, .. } => {
                        warn!(context = %context, error = %error_message, "Runtime error");
                    }
                    other => debug!(event = ?other, "Domain event"),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
