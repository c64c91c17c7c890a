use std::sync::Arc;

use jobq_service::{ControlPlaneApi, QueueBroker, QueueRegistry, Scheduler};
use jobq_types::storage::JobStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
	pub control: Arc<dyn ControlPlaneApi>,
	pub scheduler: Arc<Scheduler>,
	pub store: Arc<dyn JobStore>,
	pub broker: Arc<QueueBroker>,
	pub queues: Arc<QueueRegistry>,
	/// Shared secret that grants admin identity; `None` disables admin
	/// access over HTTP entirely.
	pub admin_key: Option<String>,
}
