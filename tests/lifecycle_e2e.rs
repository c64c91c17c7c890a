//! Job lifecycle E2E tests: submit, dispatch, retry, cancel, pause

mod mocks;

use crate::mocks::{TestServer, ADMIN_KEY};
use jobq_types::jobs::JobStatus;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn submitted_job_runs_to_completion() {
	let server = TestServer::spawn().await.expect("failed to start test server");

	let response = server
		.client
		.post(format!("{}/api/v1/jobs", server.base_url))
		.header("x-owner-id", "u1")
		.json(&json!({
			"queue": "notifications",
			"type": "send-notification",
			"payload": {"user": "u1", "msg": "hi"},
			"options": {"max_attempts": 3}
		}))
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 201);
	let body: serde_json::Value = response.json().await.unwrap();
	let id = body["id"].as_str().unwrap().to_string();

	let view = server
		.wait_for_status(&id, "u1", JobStatus::Completed, Duration::from_secs(5))
		.await;
	assert_eq!(view["attempts"], 1);
	assert_eq!(view["result"]["echo"]["user"], "u1");
	assert_eq!(view["placement"], "terminal");
	assert!(view["processing_time_ms"].is_u64());
	assert!(view.get("error").is_none());
}

#[tokio::test]
async fn retriable_failure_is_retried_after_backoff() {
	let server = TestServer::spawn().await.expect("failed to start test server");

	let response = server
		.client
		.post(format!("{}/api/v1/jobs", server.base_url))
		.header("x-owner-id", "u1")
		.json(&json!({
			"queue": "file-processing",
			"type": "process-file",
			"payload": {"file_id": "f-1"}
		}))
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 201);
	let body: serde_json::Value = response.json().await.unwrap();
	let id = body["id"].as_str().unwrap().to_string();

	let view = server
		.wait_for_status(&id, "u1", JobStatus::Completed, Duration::from_secs(5))
		.await;
	assert_eq!(view["attempts"], 2);
	assert_eq!(view["result"]["recovered_after"], 1);

	// The retry waited at least the 100ms base backoff
	let created = chrono::DateTime::parse_from_rfc3339(view["created_at"].as_str().unwrap()).unwrap();
	let completed =
		chrono::DateTime::parse_from_rfc3339(view["completed_at"].as_str().unwrap()).unwrap();
	assert!(completed - created >= chrono::Duration::milliseconds(100));
}

#[tokio::test]
async fn exhausted_job_fails_with_the_last_error() {
	let server = TestServer::spawn().await.expect("failed to start test server");

	let response = server
		.client
		.post(format!("{}/api/v1/jobs", server.base_url))
		.header("x-owner-id", "u1")
		.json(&json!({
			"queue": "report-generation",
			"type": "generate-report",
			"payload": {"business_id": "b-1"},
			"options": {"max_attempts": 1}
		}))
		.send()
		.await
		.unwrap();
	let body: serde_json::Value = response.json().await.unwrap();
	let id = body["id"].as_str().unwrap().to_string();

	let view = server
		.wait_for_status(&id, "u1", JobStatus::Failed, Duration::from_secs(5))
		.await;
	assert_eq!(view["attempts"], 1);
	assert!(view["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn delayed_job_can_be_cancelled_before_it_runs() {
	let server = TestServer::spawn().await.expect("failed to start test server");

	let response = server
		.client
		.post(format!("{}/api/v1/scheduler/delayed", server.base_url))
		.header("x-owner-id", "u1")
		.json(&json!({
			"queue": "notifications",
			"type": "send-notification",
			"payload": {"user": "u1"},
			"delay_ms": 60000
		}))
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 201);
	let body: serde_json::Value = response.json().await.unwrap();
	let id = body["id"].as_str().unwrap().to_string();

	let response = server
		.client
		.delete(format!("{}/api/v1/jobs/{}", server.base_url, id))
		.header("x-owner-id", "u1")
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 200);
	let body: serde_json::Value = response.json().await.unwrap();
	assert_eq!(body["outcome"], "cancelled");

	let view = server
		.wait_for_status(&id, "u1", JobStatus::Failed, Duration::from_secs(2))
		.await;
	assert_eq!(view["error"], "cancelled");
}

#[tokio::test]
async fn excessive_delay_is_rejected() {
	let server = TestServer::spawn().await.expect("failed to start test server");

	let response = server
		.client
		.post(format!("{}/api/v1/scheduler/delayed", server.base_url))
		.header("x-owner-id", "u1")
		.json(&json!({
			"queue": "notifications",
			"type": "send-notification",
			"payload": {"user": "u1"},
			"delay_ms": 8 * 24 * 60 * 60 * 1000u64
		}))
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 400);
	let body: serde_json::Value = response.json().await.unwrap();
	assert_eq!(body["error"], "INVALID_DELAY");
}

#[tokio::test]
async fn failed_job_can_be_retried_under_a_fresh_id() {
	let server = TestServer::spawn().await.expect("failed to start test server");

	let response = server
		.client
		.post(format!("{}/api/v1/jobs", server.base_url))
		.header("x-owner-id", "u1")
		.json(&json!({
			"queue": "report-generation",
			"type": "generate-report",
			"payload": {"business_id": "b-2"},
			"options": {"max_attempts": 1}
		}))
		.send()
		.await
		.unwrap();
	let body: serde_json::Value = response.json().await.unwrap();
	let id = body["id"].as_str().unwrap().to_string();
	server
		.wait_for_status(&id, "u1", JobStatus::Failed, Duration::from_secs(5))
		.await;

	let response = server
		.client
		.post(format!("{}/api/v1/jobs/{}/retry", server.base_url, id))
		.header("x-owner-id", "u1")
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 200);
	let body: serde_json::Value = response.json().await.unwrap();
	let new_id = body["id"].as_str().unwrap().to_string();
	assert_ne!(new_id, id);
	assert_eq!(body["retried_from"], id.as_str());

	// Original carries the linkage
	let original = server
		.wait_for_status(&id, "u1", JobStatus::Failed, Duration::from_secs(2))
		.await;
	assert_eq!(original["retried_as"], new_id.as_str());
}

#[tokio::test]
async fn paused_queue_holds_jobs_until_resumed() {
	let server = TestServer::spawn().await.expect("failed to start test server");

	let response = server
		.client
		.post(format!("{}/api/v1/queues/notifications/pause", server.base_url))
		.header("x-admin-key", ADMIN_KEY)
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 200);

	let response = server
		.client
		.post(format!("{}/api/v1/jobs", server.base_url))
		.header("x-owner-id", "u1")
		.json(&json!({
			"queue": "notifications",
			"type": "send-notification",
			"payload": {"user": "u1"}
		}))
		.send()
		.await
		.unwrap();
	let body: serde_json::Value = response.json().await.unwrap();
	let id = body["id"].as_str().unwrap().to_string();

	// Give the workers ample opportunity to (wrongly) pick it up
	tokio::time::sleep(Duration::from_millis(400)).await;
	let view = server
		.wait_for_status(&id, "u1", JobStatus::Waiting, Duration::from_secs(1))
		.await;
	assert_eq!(view["status"], "waiting");

	let response = server
		.client
		.post(format!("{}/api/v1/queues/notifications/resume", server.base_url))
		.header("x-admin-key", ADMIN_KEY)
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 200);

	server
		.wait_for_status(&id, "u1", JobStatus::Completed, Duration::from_secs(5))
		.await;
	server.abort();
}

#[tokio::test]
async fn bulk_cancel_reports_per_id_outcomes() {
	let server = TestServer::spawn().await.expect("failed to start test server");

	let mut delayed_ids = Vec::new();
	for _ in 0..2 {
		let response = server
			.client
			.post(format!("{}/api/v1/scheduler/delayed", server.base_url))
			.header("x-owner-id", "u1")
			.json(&json!({
				"queue": "notifications",
				"type": "send-notification",
				"payload": {"user": "u1"},
				"delay_ms": 60000
			}))
			.send()
			.await
			.unwrap();
		let body: serde_json::Value = response.json().await.unwrap();
		delayed_ids.push(body["id"].as_str().unwrap().to_string());
	}

	let mut ids = delayed_ids.clone();
	ids.push("missing-job".to_string());
	let response = server
		.client
		.post(format!("{}/api/v1/jobs/bulk-cancel", server.base_url))
		.header("x-owner-id", "u1")
		.json(&json!({ "ids": ids }))
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 200);
	let body: serde_json::Value = response.json().await.unwrap();
	assert_eq!(body["cancelled"], 2);

	let outcomes = body["outcomes"].as_array().unwrap();
	let outcome_of = |id: &str| {
		outcomes
			.iter()
			.find(|o| o["id"] == id)
			.map(|o| o["outcome"].clone())
			.unwrap()
	};
	assert_eq!(outcome_of(&delayed_ids[0]), "cancelled");
	assert_eq!(outcome_of(&delayed_ids[1]), "cancelled");
	assert_eq!(outcome_of("missing-job"), "not_found");
}
