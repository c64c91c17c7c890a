//! Orchestration core
//!
//! The runtime components of the job orchestrator: the queue broker, the
//! per-queue worker pools, the scheduler, and the control plane the HTTP
//! surface calls into. Components are constructed explicitly and passed by
//! reference; nothing here owns global state.

pub mod backoff;
pub mod broker;
pub mod control;
pub mod metrics;
pub mod queues;
pub mod scheduler;
pub mod worker;

pub use backoff::backoff_for;
pub use broker::{BrokerError, QueueBroker, ReservedJob};
pub use control::{ControlPlane, ControlPlaneApi, JobSubmitter, QueueDetail, QueueListEntry};
pub use metrics::{compute_metrics, evaluate_health};
pub use queues::QueueRegistry;
pub use scheduler::{CronEntryView, Scheduler, SchedulerConfig};
pub use worker::{WorkerPool, WorkerPoolConfig};
