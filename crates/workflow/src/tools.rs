//! Tools that let the model manage scheduled jobs.

use std::sync::Arc;

use async_trait::async_trait;
use relayclaw_core::error::ToolError;
use relayclaw_core::schema::{ObjectSchema, SchemaType};
use relayclaw_core::tool::Tool;

use crate::scheduler::Scheduler;

/// `cron_add`, `cron_list` and `cron_remove` bound to `scheduler`.
pub fn cron_tools(scheduler: &Arc<Scheduler>) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(CronAddTool {
            scheduler: Arc::clone(scheduler),
        }),
        Box::new(CronListTool {
            scheduler: Arc::clone(scheduler),
        }),
        Box::new(CronRemoveTool {
            scheduler: Arc::clone(scheduler),
        }),
    ]
}

fn failed(tool_name: &str, reason: impl Into<String>) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool_name.into(),
        reason: reason.into(),
    }
}

pub struct CronAddTool {
    scheduler: Arc<Scheduler>,
}

#[async_trait]
impl Tool for CronAddTool {
    fn name(&self) -> &str {
        "cron_add"
    }

    fn description(&self) -> &str {
        "Schedule a recurring task. The spec argument has six fields: second minute hour day-of-month month day-of-week."
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new()
            .required_property(
                "spec",
                SchemaType::string("Cron expression with seconds, e.g. '0 30 8 * * *'"),
            )
            .required_property("task", SchemaType::string("What to do when the job fires"))
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let spec = arguments["spec"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'spec' argument".into()))?;
        let task = arguments["task"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'task' argument".into()))?;

        let id = self
            .scheduler
            .add_job(spec, task)
            .await
            .map_err(|e| failed(self.name(), e.to_string()))?;
        Ok(format!("Job added with ID {id}"))
    }
}

pub struct CronListTool {
    scheduler: Arc<Scheduler>,
}

#[async_trait]
impl Tool for CronListTool {
    fn name(&self) -> &str {
        "cron_list"
    }

    fn description(&self) -> &str {
        "List scheduled tasks."
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new()
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        let jobs = self.scheduler.list_jobs().await;
        if jobs.is_empty() {
            return Ok("No active jobs.".into());
        }
        Ok(jobs
            .iter()
            .map(|job| format!("ID {}: {} ({})\n", job.id, job.task, job.schedule))
            .collect())
    }
}

pub struct CronRemoveTool {
    scheduler: Arc<Scheduler>,
}

#[async_trait]
impl Tool for CronRemoveTool {
    fn name(&self) -> &str {
        "cron_remove"
    }

    fn description(&self) -> &str {
        "Remove a scheduled task by ID."
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new().required_property("id", SchemaType::integer("The job ID to remove"))
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let id = arguments["id"]
            .as_u64()
            .or_else(|| arguments["id"].as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| ToolError::InvalidArguments("'id' must be a job ID".into()))?;

        if self.scheduler.remove_job(id).await {
            Ok(format!("Job {id} removed"))
        } else {
            Err(failed(self.name(), format!("no job with ID {id}")))
        }
    }
}
