//! In-process job handlers standing in for downstream worker services

use async_trait::async_trait;
use jobq_handlers::{HandlerInvocation, JobHandler};
use jobq_types::jobs::HandlerError;
use jobq_types::registry::JobTypeSpec;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};

/// Registration spec for an in-process handler; the URL is never dialed.
pub fn spec(required_fields: &[&str]) -> JobTypeSpec {
	JobTypeSpec {
		url: "http://in-process.test/run".to_string(),
		method: Default::default(),
		headers: Default::default(),
		timeout_ms: None,
		required_fields: required_fields.iter().map(|s| s.to_string()).collect(),
	}
}

/// Succeeds immediately, echoing the payload.
pub struct EchoHandler;

#[async_trait]
impl JobHandler for EchoHandler {
	async fn call(&self, invocation: HandlerInvocation) -> Result<Value, HandlerError> {
		Ok(json!({"echo": invocation.payload, "attempt": invocation.attempt}))
	}
}

/// Fails with a retriable error for the first `fail_times` calls, then
/// succeeds. Calls are counted per handler instance.
pub struct FlakyHandler {
	fail_times: u32,
	calls: AtomicU32,
}

impl FlakyHandler {
	pub fn new(fail_times: u32) -> Self {
		Self {
			fail_times,
			calls: AtomicU32::new(0),
		}
	}
}

#[async_trait]
impl JobHandler for FlakyHandler {
	async fn call(&self, _invocation: HandlerInvocation) -> Result<Value, HandlerError> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
		if call <= self.fail_times {
			Err(HandlerError::Retriable(format!("worker returned 503 (call {})", call)))
		} else {
			Ok(json!({"recovered_after": call - 1}))
		}
	}
}

/// Always fails with a retriable error.
pub struct FailingHandler;

#[async_trait]
impl JobHandler for FailingHandler {
	async fn call(&self, _invocation: HandlerInvocation) -> Result<Value, HandlerError> {
		Err(HandlerError::Retriable("worker returned 500".to_string()))
	}
}
