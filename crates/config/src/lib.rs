//! Configuration for the job orchestrator
//!
//! Settings structures with serde defaults plus file and environment
//! loading. Every field is optional in the file; the defaults describe a
//! complete single-process deployment.

pub mod loader;
pub mod settings;

pub use loader::load_config;
pub use settings::{
	JobTypeSettings, LoggingSettings, QueueSettings, RetentionSettings, SchedulerSettings,
	SecuritySettings, ServerSettings, Settings,
};
