//! Default outbound-HTTP job handler

use async_trait::async_trait;
use jobq_types::jobs::HandlerError;
use jobq_types::registry::{HandlerMethod, JobTypeSpec};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{HandlerInvocation, JobHandler};

/// Header carrying the job id so downstream workers can deduplicate.
pub const JOB_ID_HEADER: &str = "x-job-id";
/// Header forwarding the producer identity.
pub const OWNER_HEADER: &str = "x-owner-id";

/// Invokes the registered downstream worker endpoint
///
/// POST (or PUT) JSON body = payload. 2xx with a parseable body is success;
/// 4xx is fatal (no retry); 5xx and transport errors are retriable.
#[derive(Debug)]
pub struct HttpJobHandler {
	spec: JobTypeSpec,
	client: reqwest::Client,
}

impl HttpJobHandler {
	pub fn new(spec: JobTypeSpec, client: reqwest::Client) -> Self {
		Self { spec, client }
	}
}

#[async_trait]
impl JobHandler for HttpJobHandler {
	async fn call(&self, invocation: HandlerInvocation) -> Result<Value, HandlerError> {
		let timeout_ms = self.spec.timeout_ms.unwrap_or(invocation.timeout_ms);

		let mut request = match self.spec.method {
			HandlerMethod::Post => self.client.post(&self.spec.url),
			HandlerMethod::Put => self.client.put(&self.spec.url),
		};
		request = request
			.timeout(Duration::from_millis(timeout_ms))
			.header(JOB_ID_HEADER, &invocation.job_id)
			.json(&invocation.payload);
		for (name, value) in &self.spec.headers {
			request = request.header(name, value);
		}
		if let Some(ref owner) = invocation.owner {
			request = request.header(OWNER_HEADER, owner);
		}

		debug!(
			"invoking handler for job {} ({}/{}) at {}",
			invocation.job_id, invocation.queue, invocation.job_type, self.spec.url
		);

		let response = match request.send().await {
			Ok(response) => response,
			Err(err) => {
				warn!("handler request for job {} failed: {}", invocation.job_id, err);
				return Err(HandlerError::Retriable(format!("request failed: {}", err)));
			}
		};

		let status = response.status();
		if status.is_success() {
			match response.json::<Value>().await {
				Ok(body) => Ok(body),
				Err(err) => Err(HandlerError::Retriable(format!(
					"worker returned {} with an unparseable body: {}",
					status, err
				))),
			}
		} else if status.is_client_error() {
			let body = response.text().await.unwrap_or_default();
			Err(HandlerError::Fatal(format!(
				"worker rejected the job with {}: {}",
				status, body
			)))
		} else {
			let body = response.text().await.unwrap_or_default();
			Err(HandlerError::Retriable(format!(
				"worker returned {}: {}",
				status, body
			)))
		}
	}
}
