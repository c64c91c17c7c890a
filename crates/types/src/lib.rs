//! Shared types for the job orchestrator
//!
//! Domain models and traits for the orchestration core, organized by entity.
//! This crate is dependency-light so every other crate can build on it.

pub mod auth;
pub mod constants;
pub mod jobs;
pub mod metrics;
pub mod queues;
pub mod registry;
pub mod storage;

// Re-export chrono and serde_json for convenience
pub use chrono;
pub use serde_json;

// Re-export commonly used types for convenience
pub use auth::AuthContext;
pub use jobs::{
	BulkCancelReport, CancelOutcome, HandlerError, Job, JobError, JobFilter, JobPatch, JobResult,
	JobSort, JobStatus, JobView, Page, Placement, SubmitOptions, SubmitRequest,
};
pub use metrics::{HealthSummary, HourlyBucket, MetricsReport, OverallMetrics};
pub use queues::{QueueConfiguration, QueueDescriptor, QueueHealth, QueueSizes};
pub use registry::{HandlerMethod, JobTypeSpec};
pub use storage::{
	AggregateDimension, AggregateRow, JobStore, QueueWindowStats, StorageError, StorageResult,
};
