//! Scheduler injector for RelayClaw.
//!
//! Jobs are cron expressions with a seconds field. When one fires, a
//! message from `system_scheduler` is injected into the channel multiplexer
//! and handled like any message a person typed.

pub mod cron;
pub mod scheduler;
pub mod tools;

pub use cron::CronExpr;
pub use scheduler::{JobInfo, SCHEDULER_SENDER, Scheduler};
pub use tools::{CronAddTool, CronListTool, CronRemoveTool, cron_tools};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },

    #[error("Scheduled task must not be empty")]
    EmptyTask,
}
