//! Cron tool — lets the agent manage its own scheduled jobs.
//!
//! The agent loop calls `set_context` before each interaction so that
//! `add` without an explicit `to`/`channel` delivers back to the
//! conversation that asked for the job.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use clawai_cron::{CronJob, CronPayload, CronSchedule, CronService, PayloadKind, ScheduleKind};

use super::base::{optional_bool, optional_i64, optional_string, require_string, Tool};

// ─────────────────────────────────────────────
// CronTool
// ─────────────────────────────────────────────

/// Allows the agent to add, list, and remove its own scheduled jobs.
pub struct CronTool {
    service: Arc<CronService>,
    /// Default delivery channel / chat_id for jobs added without explicit targets.
    context: Mutex<(String, String)>,
}

impl CronTool {
    /// Create a new cron tool backed by a shared `CronService`.
    pub fn new(service: Arc<CronService>) -> Self {
        Self {
            service,
            context: Mutex::new(("cli".into(), "direct".into())),
        }
    }

    /// Set the current context (called by the agent loop per-message).
    pub async fn set_context(&self, channel: &str, chat_id: &str) {
        let mut ctx = self.context.lock().await;
        *ctx = (channel.to_string(), chat_id.to_string());
    }

    async fn do_add(&self, params: &HashMap<String, Value>) -> anyhow::Result<String> {
        let name = require_string(params, "name")?;
        let message = require_string(params, "message")?;

        let every_seconds = optional_i64(params, "every_seconds");
        let cron_expr = optional_string(params, "cron_expr");
        let at_ms = optional_i64(params, "at_ms");

        let schedule = if let Some(secs) = every_seconds {
            if secs <= 0 {
                anyhow::bail!("every_seconds must be > 0");
            }
            CronSchedule::every(secs * 1000)
        } else if let Some(expr) = cron_expr {
            expr.parse::<cron::Schedule>()
                .map_err(|e| anyhow::anyhow!("invalid cron expression '{expr}': {e}"))?;
            CronSchedule::cron(expr)
        } else if let Some(ms) = at_ms {
            CronSchedule::at(ms)
        } else {
            anyhow::bail!("one of every_seconds, cron_expr, or at_ms is required");
        };

        let deliver = optional_bool(params, "deliver");
        let (ctx_channel, ctx_chat_id) = {
            let ctx = self.context.lock().await;
            (ctx.0.clone(), ctx.1.clone())
        };
        let channel = optional_string(params, "channel").or(Some(ctx_channel));
        let to = optional_string(params, "to").or(Some(ctx_chat_id));

        let payload = CronPayload {
            kind: PayloadKind::AgentTurn,
            message,
            deliver,
            channel,
            to,
        };

        let job = CronJob::new(name, schedule, payload);
        let id = self.service.add_job(job).await?;
        Ok(format!("Scheduled job '{id}' added."))
    }

    async fn do_list(&self) -> anyhow::Result<String> {
        let jobs = self.service.list_jobs().await;
        if jobs.is_empty() {
            return Ok("No scheduled jobs.".to_string());
        }
        let mut lines = Vec::with_capacity(jobs.len());
        for job in &jobs {
            let schedule = match job.schedule.kind {
                ScheduleKind::Every => format!(
                    "every {}ms",
                    job.schedule.every_ms.unwrap_or_default()
                ),
                ScheduleKind::Cron => job
                    .schedule
                    .expr
                    .clone()
                    .unwrap_or_else(|| "?".to_string()),
                ScheduleKind::At => format!("at {}", job.schedule.at_ms.unwrap_or_default()),
            };
            let status = if job.enabled { "enabled" } else { "disabled" };
            lines.push(format!(
                "{} — {} ({}, {})",
                job.id, job.name, schedule, status
            ));
        }
        Ok(lines.join("\n"))
    }

    async fn do_remove(&self, params: &HashMap<String, Value>) -> anyhow::Result<String> {
        let id = require_string(params, "job_id")?;
        if self.service.remove_job(&id).await? {
            Ok(format!("Removed job '{id}'."))
        } else {
            anyhow::bail!("no such job: {id}")
        }
    }
}

#[async_trait]
impl Tool for CronTool {
    fn name(&self) -> &str {
        "cron"
    }

    fn description(&self) -> &str {
        "Manage scheduled jobs that send a message to the agent on a timer. \
         Use op='add' to create a job, 'list' to see existing jobs, or \
         'remove' to delete one."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "op": {
                    "type": "string",
                    "enum": ["add", "list", "remove"],
                    "description": "Operation to perform"
                },
                "name": {
                    "type": "string",
                    "description": "Job name (required for 'add')"
                },
                "message": {
                    "type": "string",
                    "description": "Prompt sent to the agent when the job fires (required for 'add')"
                },
                "every_seconds": {
                    "type": "integer",
                    "description": "Run every N seconds (interval schedule)"
                },
                "cron_expr": {
                    "type": "string",
                    "description": "Standard 5-field cron expression (cron schedule)"
                },
                "at_ms": {
                    "type": "integer",
                    "description": "Unix epoch milliseconds for a one-shot schedule"
                },
                "deliver": {
                    "type": "boolean",
                    "description": "Whether to deliver the job's response to a channel"
                },
                "channel": {
                    "type": "string",
                    "description": "Delivery channel (defaults to the current conversation)"
                },
                "to": {
                    "type": "string",
                    "description": "Delivery chat_id (defaults to the current conversation)"
                },
                "job_id": {
                    "type": "string",
                    "description": "Job ID (required for 'remove')"
                }
            },
            "required": ["op"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let op = require_string(&params, "op")?;
        match op.as_str() {
            "add" => self.do_add(&params).await,
            "list" => self.do_list().await,
            "remove" => self.do_remove(&params).await,
            other => anyhow::bail!("unknown op '{other}'; expected add, list, or remove"),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
