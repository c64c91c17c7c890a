//! Request handlers, grouped by resource

pub mod common;
pub mod health;
pub mod jobs;
pub mod queues;
pub mod scheduler;

pub use health::{health, ready};
pub use jobs::{bulk_cancel, cancel_job, get_job, list_jobs, retry_job, submit_job};
pub use queues::{
	clean_queue, health_summary, list_queues, metrics, pause_queue, queue_detail, resume_queue,
	update_queue_config,
};
pub use scheduler::{cancel_cron, list_cron, register_cron, schedule_delayed, trigger_cron};
