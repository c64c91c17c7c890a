//! Queue descriptor registry

use dashmap::DashMap;
use jobq_types::chrono::{DateTime, Utc};
use jobq_types::queues::{QueueConfiguration, QueueDescriptor, QueueHealth};

/// Holds the descriptor of every configured queue
///
/// Descriptors are created from configuration at startup; the scheduler's
/// metrics task refreshes the aggregate fields, and the control plane flips
/// the pause flag and rewrites configuration.
#[derive(Default)]
pub struct QueueRegistry {
	descriptors: DashMap<String, QueueDescriptor>,
}

impl QueueRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, descriptor: QueueDescriptor) {
		self.descriptors.insert(descriptor.name.clone(), descriptor);
	}

	pub fn contains(&self, name: &str) -> bool {
		self.descriptors.contains_key(name)
	}

	pub fn get(&self, name: &str) -> Option<QueueDescriptor> {
		self.descriptors.get(name).map(|d| d.clone())
	}

	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.descriptors.iter().map(|e| e.key().clone()).collect();
		names.sort();
		names
	}

	pub fn list(&self) -> Vec<QueueDescriptor> {
		let mut descriptors: Vec<QueueDescriptor> =
			self.descriptors.iter().map(|e| e.value().clone()).collect();
		descriptors.sort_by(|a, b| a.name.cmp(&b.name));
		descriptors
	}

	/// Flip the pause flag; returns the updated descriptor.
	pub fn set_active(&self, name: &str, is_active: bool) -> Option<QueueDescriptor> {
		self.descriptors.get_mut(name).map(|mut d| {
			d.is_active = is_active;
			d.clone()
		})
	}

	pub fn update_configuration(
		&self,
		name: &str,
		configuration: QueueConfiguration,
	) -> Option<QueueDescriptor> {
		self.descriptors.get_mut(name).map(|mut d| {
			d.configuration = configuration;
			d.clone()
		})
	}

	/// Write the aggregates the metrics refresh computed.
	pub fn update_aggregates(
		&self,
		name: &str,
		processing_rate_per_min: f64,
		avg_processing_time_ms: f64,
		last_processed_at: Option<DateTime<Utc>>,
		health_status: QueueHealth,
		checked_at: DateTime<Utc>,
	) {
		if let Some(mut d) = self.descriptors.get_mut(name) {
			d.processing_rate_per_min = processing_rate_per_min;
			d.avg_processing_time_ms = avg_processing_time_ms;
			if last_processed_at.is_some() {
				d.last_processed_at = last_processed_at;
			}
			d.health_status = health_status;
			d.last_health_check = Some(checked_at);
		}
	}
}
