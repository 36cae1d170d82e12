//! Scheduled task service for ClawAI.
//!
//! Scheduled task service: job types, persistent store, and
//! the custom async scheduler loop built on `tokio::time::sleep`.

pub mod service;
pub mod types;

pub use service::{CronService, OnJobFn};
pub use types::{compute_next_run_from, CronJob, CronJobState, CronPayload, CronSchedule, CronStore, JobStatus, PayloadKind, ScheduleKind};
