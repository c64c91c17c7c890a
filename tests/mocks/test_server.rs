//! Test server for integration tests
//!
//! Boots the full orchestrator with in-process handlers (no network calls
//! to downstream workers) and serves it on an ephemeral port.

use jobq_orchestrator::{OrchestratorBuilder, OrchestratorHandle};
use jobq_types::jobs::JobStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::handlers::{spec, EchoHandler, FailingHandler, FlakyHandler};
use super::ADMIN_KEY;

pub struct TestServer {
	pub base_url: String,
	pub client: reqwest::Client,
	server_task: JoinHandle<()>,
	// Keeps the scheduler and worker pools alive for the test's duration
	#[allow(dead_code)]
	orchestrator: OrchestratorHandle,
}

impl TestServer {
	/// Spawn the orchestrator with fast scheduler ticks and the standard
	/// set of in-process handlers.
	pub async fn spawn() -> Result<Self, Box<dyn std::error::Error>> {
		let mut settings = jobq_config::Settings::default();
		settings.security.admin_key = Some(ADMIN_KEY.to_string());
		settings.scheduler.promotion_interval_ms = 50;
		settings.scheduler.stall_sweep_interval_ms = 200;
		if let Some(queue) = settings.queues.get_mut("notifications") {
			queue.retry_delay_ms = 100;
		}
		if let Some(queue) = settings.queues.get_mut("file-processing") {
			queue.retry_delay_ms = 100;
		}
		if let Some(queue) = settings.queues.get_mut("cleanup") {
			queue.retry_delay_ms = 100;
		}

		let (app, orchestrator) = OrchestratorBuilder::from_config(settings)
			.with_handler("notifications", "send-notification", spec(&["user"]), Arc::new(EchoHandler))
			.with_handler(
				"file-processing",
				"process-file",
				spec(&["file_id"]),
				Arc::new(FlakyHandler::new(1)),
			)
			.with_handler(
				"report-generation",
				"generate-report",
				spec(&["business_id"]),
				Arc::new(FailingHandler),
			)
			.with_handler("cleanup", "cleanup-expired-jobs", spec(&[]), Arc::new(EchoHandler))
			.start()
			.await?;

		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
		let addr = listener.local_addr()?;
		let server_task = tokio::spawn(async move {
			let _ = axum::serve(listener, app).await;
		});

		Ok(Self {
			base_url: format!("http://{}", addr),
			client: reqwest::Client::new(),
			server_task,
			orchestrator,
		})
	}

	pub fn abort(&self) {
		self.server_task.abort();
	}

	/// Poll a job until it reaches the wanted status or the deadline hits.
	pub async fn wait_for_status(
		&self,
		id: &str,
		owner: &str,
		wanted: JobStatus,
		deadline: Duration,
	) -> serde_json::Value {
		let started = std::time::Instant::now();
		loop {
			let response = self
				.client
				.get(format!("{}/api/v1/jobs/{}", self.base_url, id))
				.header("x-owner-id", owner)
				.send()
				.await
				.expect("inspect request failed");
			let body: serde_json::Value = response.json().await.expect("inspect body unparseable");
			if body["status"] == wanted.as_str() {
				return body;
			}
			if started.elapsed() > deadline {
				panic!(
					"job {} never reached '{}'; last view: {}",
					id,
					wanted.as_str(),
					body
				);
			}
			tokio::time::sleep(Duration::from_millis(25)).await;
		}
	}
}
