//! Configuration settings structures

use jobq_types::constants;
use jobq_types::queues::QueueConfiguration;
use jobq_types::registry::{HandlerMethod, JobTypeSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main application settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
	#[serde(default = "default_server_settings")]
	pub server: ServerSettings,
	/// The fixed queue registry. Adding a queue is a configuration change,
	/// not a runtime operation.
	#[serde(default = "default_queue_settings")]
	pub queues: HashMap<String, QueueSettings>,
	/// Job-type registrations per queue: handler endpoint, timeout, and
	/// payload schema.
	#[serde(default = "default_job_type_settings")]
	pub job_types: HashMap<String, HashMap<String, JobTypeSettings>>,
	#[serde(default)]
	pub scheduler: SchedulerSettings,
	#[serde(default)]
	pub retention: RetentionSettings,
	#[serde(default)]
	pub security: SecuritySettings,
	#[serde(default = "default_logging_settings")]
	pub logging: LoggingSettings,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			server: default_server_settings(),
			queues: default_queue_settings(),
			job_types: default_job_type_settings(),
			scheduler: SchedulerSettings::default(),
			retention: RetentionSettings::default(),
			security: SecuritySettings::default(),
			logging: default_logging_settings(),
		}
	}
}

impl Settings {
	pub fn bind_address(&self) -> String {
		format!("{}:{}", self.server.host, self.server.port)
	}
}

/// Server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerSettings {
	/// Server host/interface to bind to.
	/// Can be overridden by the HOST environment variable.
	pub host: String,
	/// Server port to bind to.
	/// Can be overridden by the PORT environment variable.
	pub port: u16,
}

fn default_server_settings() -> ServerSettings {
	ServerSettings {
		host: "0.0.0.0".to_string(),
		port: 4000,
	}
}

/// Per-queue dispatch and retention settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueueSettings {
	#[serde(default)]
	pub description: String,
	#[serde(default = "default_concurrency")]
	pub concurrency: usize,
	#[serde(default = "default_retry_attempts")]
	pub retry_attempts: u32,
	#[serde(default = "default_retry_delay_ms")]
	pub retry_delay_ms: u64,
	#[serde(default = "default_retain_completed")]
	pub retain_completed: usize,
	#[serde(default = "default_retain_failed")]
	pub retain_failed: usize,
	#[serde(default = "default_job_timeout_ms")]
	pub job_timeout_ms: u64,
}

fn default_concurrency() -> usize {
	constants::DEFAULT_QUEUE_CONCURRENCY
}
fn default_retry_attempts() -> u32 {
	constants::DEFAULT_MAX_ATTEMPTS
}
fn default_retry_delay_ms() -> u64 {
	constants::DEFAULT_RETRY_DELAY_MS
}
fn default_retain_completed() -> usize {
	constants::DEFAULT_RETAIN_COMPLETED
}
fn default_retain_failed() -> usize {
	constants::DEFAULT_RETAIN_FAILED
}
fn default_job_timeout_ms() -> u64 {
	constants::DEFAULT_JOB_TIMEOUT_MS
}

impl Default for QueueSettings {
	fn default() -> Self {
		Self {
			description: String::new(),
			concurrency: default_concurrency(),
			retry_attempts: default_retry_attempts(),
			retry_delay_ms: default_retry_delay_ms(),
			retain_completed: default_retain_completed(),
			retain_failed: default_retain_failed(),
			job_timeout_ms: default_job_timeout_ms(),
		}
	}
}

impl From<&QueueSettings> for QueueConfiguration {
	fn from(settings: &QueueSettings) -> Self {
		Self {
			concurrency: settings.concurrency,
			retry_attempts: settings.retry_attempts,
			retry_delay_ms: settings.retry_delay_ms,
			retain_completed: settings.retain_completed,
			retain_failed: settings.retain_failed,
			job_timeout_ms: settings.job_timeout_ms,
		}
	}
}

/// Registration of one job type: where its handler lives and what the
/// payload must carry.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobTypeSettings {
	pub url: String,
	#[serde(default)]
	pub method: HandlerMethod,
	#[serde(default)]
	pub headers: HashMap<String, String>,
	#[serde(default)]
	pub timeout_ms: Option<u64>,
	#[serde(default)]
	pub required_fields: Vec<String>,
}

impl From<&JobTypeSettings> for JobTypeSpec {
	fn from(settings: &JobTypeSettings) -> Self {
		Self {
			url: settings.url.clone(),
			method: settings.method,
			headers: settings.headers.clone(),
			timeout_ms: settings.timeout_ms,
			required_fields: settings.required_fields.clone(),
		}
	}
}

/// Scheduler tick intervals and timezone
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerSettings {
	#[serde(default = "default_promotion_interval_ms")]
	pub promotion_interval_ms: u64,
	#[serde(default = "default_stall_sweep_interval_ms")]
	pub stall_sweep_interval_ms: u64,
	#[serde(default = "default_metrics_refresh_interval_ms")]
	pub metrics_refresh_interval_ms: u64,
	#[serde(default = "default_retention_trim_interval_ms")]
	pub retention_trim_interval_ms: u64,
	/// IANA timezone name cron expressions are evaluated in.
	#[serde(default = "default_timezone")]
	pub timezone: String,
	#[serde(default = "default_backoff_ceiling_ms")]
	pub backoff_ceiling_ms: u64,
	#[serde(default = "default_lease_grace_ms")]
	pub lease_grace_ms: u64,
}

fn default_promotion_interval_ms() -> u64 {
	constants::DEFAULT_PROMOTION_INTERVAL_MS
}
fn default_stall_sweep_interval_ms() -> u64 {
	constants::DEFAULT_STALL_SWEEP_INTERVAL_MS
}
fn default_metrics_refresh_interval_ms() -> u64 {
	constants::DEFAULT_METRICS_REFRESH_INTERVAL_MS
}
fn default_retention_trim_interval_ms() -> u64 {
	constants::DEFAULT_RETENTION_TRIM_INTERVAL_MS
}
fn default_timezone() -> String {
	"UTC".to_string()
}
fn default_backoff_ceiling_ms() -> u64 {
	constants::DEFAULT_BACKOFF_CEILING_MS
}
fn default_lease_grace_ms() -> u64 {
	constants::DEFAULT_LEASE_GRACE_MS
}

impl Default for SchedulerSettings {
	fn default() -> Self {
		Self {
			promotion_interval_ms: default_promotion_interval_ms(),
			stall_sweep_interval_ms: default_stall_sweep_interval_ms(),
			metrics_refresh_interval_ms: default_metrics_refresh_interval_ms(),
			retention_trim_interval_ms: default_retention_trim_interval_ms(),
			timezone: default_timezone(),
			backoff_ceiling_ms: default_backoff_ceiling_ms(),
			lease_grace_ms: default_lease_grace_ms(),
		}
	}
}

/// Retention policy for terminal records
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetentionSettings {
	#[serde(default = "default_terminal_days")]
	pub terminal_days: i64,
}

fn default_terminal_days() -> i64 {
	constants::DEFAULT_TERMINAL_RETENTION_DAYS
}

impl Default for RetentionSettings {
	fn default() -> Self {
		Self {
			terminal_days: default_terminal_days(),
		}
	}
}

/// Security settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SecuritySettings {
	/// Shared secret granting admin identity over HTTP.
	/// Can be overridden by the ADMIN_KEY environment variable.
	pub admin_key: Option<String>,
}

/// Logging settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingSettings {
	pub level: String,
	/// Emit JSON log lines instead of the compact human format.
	pub structured: bool,
}

fn default_logging_settings() -> LoggingSettings {
	LoggingSettings {
		level: "info".to_string(),
		structured: false,
	}
}

fn queue(description: &str) -> QueueSettings {
	QueueSettings {
		description: description.to_string(),
		..Default::default()
	}
}

fn default_queue_settings() -> HashMap<String, QueueSettings> {
	let mut queues = HashMap::new();
	queues.insert(
		"business-discovery".to_string(),
		queue("Find candidate businesses for analysis"),
	);
	queues.insert(
		"instagram-detection".to_string(),
		queue("Detect Instagram profiles for discovered businesses"),
	);
	queues.insert(
		"video-scraping".to_string(),
		QueueSettings {
			description: "Scrape profile videos and media".to_string(),
			concurrency: 1,
			..Default::default()
		},
	);
	queues.insert(
		"video-analysis".to_string(),
		QueueSettings {
			description: "Analyze scraped videos".to_string(),
			job_timeout_ms: 10 * 60 * 1_000,
			..Default::default()
		},
	);
	queues.insert(
		"report-generation".to_string(),
		queue("Assemble analysis reports"),
	);
	queues.insert("file-processing".to_string(), queue("Process uploaded files"));
	queues.insert(
		"cleanup".to_string(),
		QueueSettings {
			description: "Housekeeping and record expiry".to_string(),
			concurrency: 1,
			..Default::default()
		},
	);
	queues.insert("notifications".to_string(), queue("Deliver user notifications"));
	queues
}

fn job_type(url: &str, required_fields: &[&str]) -> JobTypeSettings {
	JobTypeSettings {
		url: url.to_string(),
		method: HandlerMethod::Post,
		headers: HashMap::new(),
		timeout_ms: None,
		required_fields: required_fields.iter().map(|s| s.to_string()).collect(),
	}
}

fn default_job_type_settings() -> HashMap<String, HashMap<String, JobTypeSettings>> {
	let mut types: HashMap<String, HashMap<String, JobTypeSettings>> = HashMap::new();
	types.entry("business-discovery".to_string()).or_default().insert(
		"discover-businesses".to_string(),
		job_type("http://business-discovery:8001/api/jobs/discover", &["region"]),
	);
	types.entry("instagram-detection".to_string()).or_default().insert(
		"detect-instagram".to_string(),
		job_type("http://instagram-detection:8002/api/jobs/detect", &["business_id"]),
	);
	types.entry("video-scraping".to_string()).or_default().insert(
		"scrape-videos".to_string(),
		job_type("http://video-scraping:8003/api/jobs/scrape", &["profile_url"]),
	);
	types.entry("video-analysis".to_string()).or_default().insert(
		"analyze-video".to_string(),
		job_type("http://video-analysis:8004/api/jobs/analyze", &["video_id"]),
	);
	types.entry("report-generation".to_string()).or_default().insert(
		"generate-report".to_string(),
		job_type("http://report-generation:8005/api/jobs/report", &["business_id"]),
	);
	types.entry("file-processing".to_string()).or_default().insert(
		"process-file".to_string(),
		job_type("http://file-processing:8006/api/jobs/process", &["file_id"]),
	);
	types.entry("cleanup".to_string()).or_default().insert(
		"cleanup-expired-jobs".to_string(),
		job_type("http://cleanup:8007/api/jobs/cleanup", &[]),
	);
	types.entry("notifications".to_string()).or_default().insert(
		"send-notification".to_string(),
		job_type("http://notifications:8008/api/jobs/send", &["user"]),
	);
	types
}
