//! Job-type registry records
//!
//! Each queue declares the set of `type` values it accepts and, for each,
//! how the handler is invoked. The registrations drive submit-time
//! validation and the default outbound-HTTP handler.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP method used for handler invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HandlerMethod {
	#[default]
	Post,
	Put,
}

/// Registration of one `(queue, type)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTypeSpec {
	/// Downstream worker endpoint the payload is posted to.
	pub url: String,
	#[serde(default)]
	pub method: HandlerMethod,
	/// Static headers forwarded on every invocation.
	#[serde(default)]
	pub headers: HashMap<String, String>,
	/// Per-attempt deadline; falls back to the queue's `job_timeout_ms`.
	#[serde(default)]
	pub timeout_ms: Option<u64>,
	/// Top-level payload fields that must be present at submit time.
	#[serde(default)]
	pub required_fields: Vec<String>,
}

impl JobTypeSpec {
	/// Check the payload against the registered schema.
	///
	/// The stored payload is the raw value unchanged; validation only
	/// guards the required top-level fields.
	pub fn validate_payload(&self, payload: &serde_json::Value) -> Result<(), String> {
		if self.required_fields.is_empty() {
			return Ok(());
		}
		let object = payload
			.as_object()
			.ok_or_else(|| "payload must be a JSON object".to_string())?;
		for field in &self.required_fields {
			if !object.contains_key(field) {
				return Err(format!("payload is missing required field '{}'", field));
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn spec(required: &[&str]) -> JobTypeSpec {
		JobTypeSpec {
			url: "http://worker.internal/run".to_string(),
			method: HandlerMethod::Post,
			headers: HashMap::new(),
			timeout_ms: None,
			required_fields: required.iter().map(|s| s.to_string()).collect(),
		}
	}

	#[test]
	fn payload_with_required_fields_passes() {
		let spec = spec(&["user", "msg"]);
		let payload = serde_json::json!({"user": "u1", "msg": "hi", "extra": 1});
		assert!(spec.validate_payload(&payload).is_ok());
	}

	#[test]
	fn missing_field_is_named_in_the_error() {
		let spec = spec(&["user", "msg"]);
		let payload = serde_json::json!({"user": "u1"});
		let err = spec.validate_payload(&payload).unwrap_err();
		assert!(err.contains("msg"));
	}

	#[test]
	fn non_object_payload_rejected_when_fields_required() {
		let strict = spec(&["user"]);
		assert!(strict.validate_payload(&serde_json::json!([1, 2])).is_err());
		// No required fields: any shape goes through untouched
		let lax = spec(&[]);
		assert!(lax.validate_payload(&serde_json::json!([1, 2])).is_ok());
	}
}
