//! Job handlers
//!
//! The handler capability for the orchestrator: a registry keyed by
//! `(queue, type)` resolving to a `JobHandler`. The default implementation
//! posts the payload to the registered downstream worker over HTTP; tests
//! inject in-process handlers through the same seam.

pub mod http_handler;

pub use http_handler::HttpJobHandler;
pub use jobq_types::jobs::HandlerError;

use async_trait::async_trait;
use jobq_types::registry::JobTypeSpec;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a handler learns about the attempt it is executing.
#[derive(Debug, Clone)]
pub struct HandlerInvocation {
	pub job_id: String,
	pub queue: String,
	pub job_type: String,
	pub payload: Value,
	pub owner: Option<String>,
	pub attempt: u32,
	/// Deadline the worker enforces; handlers may use it to bound their own
	/// downstream calls.
	pub timeout_ms: u64,
}

/// The code that executes a job's payload
///
/// Handlers must be idempotent: delivery is at-least-once, and a stalled
/// attempt may be re-dispatched after its lease expires.
#[async_trait]
pub trait JobHandler: Send + Sync {
	async fn call(&self, invocation: HandlerInvocation) -> Result<Value, HandlerError>;
}

struct Registration {
	spec: JobTypeSpec,
	handler: Arc<dyn JobHandler>,
}

/// Handler registry keyed by `(queue, type)`
///
/// Built once at startup from configuration; submitting an unknown pair is
/// rejected before a job record is created.
#[derive(Default)]
pub struct HandlerRegistry {
	entries: HashMap<(String, String), Registration>,
}

impl HandlerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register an explicit handler for a `(queue, type)` pair.
	pub fn register(
		&mut self,
		queue: impl Into<String>,
		job_type: impl Into<String>,
		spec: JobTypeSpec,
		handler: Arc<dyn JobHandler>,
	) {
		self.entries.insert(
			(queue.into(), job_type.into()),
			Registration { spec, handler },
		);
	}

	/// Register the default outbound-HTTP handler for a `(queue, type)` pair.
	pub fn register_http(
		&mut self,
		queue: impl Into<String>,
		job_type: impl Into<String>,
		spec: JobTypeSpec,
		client: reqwest::Client,
	) {
		let handler = Arc::new(HttpJobHandler::new(spec.clone(), client));
		self.register(queue, job_type, spec, handler);
	}

	pub fn contains(&self, queue: &str, job_type: &str) -> bool {
		self.entries
			.contains_key(&(queue.to_string(), job_type.to_string()))
	}

	pub fn handler(&self, queue: &str, job_type: &str) -> Option<Arc<dyn JobHandler>> {
		self.entries
			.get(&(queue.to_string(), job_type.to_string()))
			.map(|r| Arc::clone(&r.handler))
	}

	pub fn spec(&self, queue: &str, job_type: &str) -> Option<&JobTypeSpec> {
		self.entries
			.get(&(queue.to_string(), job_type.to_string()))
			.map(|r| &r.spec)
	}

	/// All registered types for one queue, for queue detail views.
	pub fn types_for_queue(&self, queue: &str) -> Vec<String> {
		let mut types: Vec<String> = self
			.entries
			.keys()
			.filter(|(q, _)| q == queue)
			.map(|(_, t)| t.clone())
			.collect();
		types.sort();
		types
	}
}
