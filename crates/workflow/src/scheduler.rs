//! Job table and tick loop.
//!
//! Every second the loop checks each job's expression against the wall
//! clock and injects a synthetic message for every match. Seconds skipped
//! by a late tick are replayed, up to one minute back.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use relayclaw_channels::MessageInjector;
use relayclaw_config::JobConfig;
use relayclaw_core::channel::ChannelMessage;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ScheduleError;
use crate::cron::CronExpr;

/// Sender identity carried by every injected message.
pub const SCHEDULER_SENDER: &str = "system_scheduler";

/// Longest stretch of missed seconds replayed after a stalled tick.
const MAX_CATCH_UP_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct Job {
    schedule: String,
    task: String,
    expr: CronExpr,
}

/// A snapshot of one scheduled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: u64,
    pub schedule: String,
    pub task: String,
}

/// Recurring jobs that turn into inbound messages.
pub struct Scheduler {
    jobs: RwLock<BTreeMap<u64, Job>>,
    next_id: AtomicU64,
    injector: MessageInjector,
    default_channel: String,
}

impl Scheduler {
    /// Replies to fired jobs are addressed to `default_channel`.
    pub fn new(injector: MessageInjector, default_channel: impl Into<String>) -> Self {
        Self {
            jobs: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            injector,
            default_channel: default_channel.into(),
        }
    }

    pub fn default_channel(&self) -> &str {
        &self.default_channel
    }

    /// Register a job and return its id.
    pub async fn add_job(&self, schedule: &str, task: &str) -> Result<u64, ScheduleError> {
        let expr = CronExpr::parse(schedule)?;
        let task = task.trim();
        if task.is_empty() {
            return Err(ScheduleError::EmptyTask);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.jobs.write().await.insert(
            id,
            Job {
                schedule: schedule.trim().to_string(),
                task: task.to_string(),
                expr,
            },
        );
        info!(job_id = id, schedule = %schedule, task = %task, "Scheduled job");
        Ok(id)
    }

    /// Load jobs from configuration. Returns the errors of rejected entries.
    pub async fn load_jobs(&self, jobs: &[JobConfig]) -> Vec<ScheduleError> {
        let mut errors = Vec::new();
        for job in jobs {
            if let Err(e) = self.add_job(&job.schedule, &job.task).await {
                warn!(schedule = %job.schedule, error = %e, "Skipping configured job");
                errors.push(e);
            }
        }
        errors
    }

    /// All jobs, ordered by id.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        self.jobs
            .read()
            .await
            .iter()
            .map(|(id, job)| JobInfo {
                id: *id,
                schedule: job.schedule.clone(),
                task: job.task.clone(),
            })
            .collect()
    }

    /// Remove a job. Returns whether it existed.
    pub async fn remove_job(&self, id: u64) -> bool {
        let removed = self.jobs.write().await.remove(&id).is_some();
        if removed {
            info!(job_id = id, "Removed job");
        }
        removed
    }

    /// Messages for every job whose expression matches `now`.
    pub async fn due_messages<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<ChannelMessage> {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| job.expr.matches(now))
            .map(|job| self.job_message(&job.task))
            .collect()
    }

    fn job_message(&self, task: &str) -> ChannelMessage {
        ChannelMessage::new(
            self.default_channel.clone(),
            SCHEDULER_SENDER,
            format!("It is time to: {task}"),
        )
        .with_id(format!("cron-{task}"))
    }

    /// Inject the messages due at `now`. Returns how many were injected.
    pub async fn fire_due<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> usize {
        let mut fired = 0;
        for message in self.due_messages(now).await {
            debug!(id = %message.id, channel = %message.channel, "Firing scheduled job");
            match self.injector.inject(message).await {
                Ok(()) => fired += 1,
                Err(e) => warn!(error = %e, "Failed to inject scheduled message"),
            }
        }
        fired
    }

    /// Spawn the tick loop. It stops when `shutdown` is cancelled.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(channel = %self.default_channel, "Scheduler started");
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last = Local::now().timestamp();

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let now = Local::now().timestamp();
                let first = (last + 1).max(now - MAX_CATCH_UP_SECS + 1);
                for second in first..=now {
                    if let Some(at) = Local.timestamp_opt(second, 0).single() {
                        tokio::select! {
                            _ = shutdown.cancelled() => return,
                            _ = self.fire_due(&at) => {}
                        }
                    }
                }
                last = last.max(now);
            }
            info!("Scheduler stopped");
        })
    }
}
