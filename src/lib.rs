//! jobq-orchestrator
//!
//! A background-job orchestration service: producers submit work over HTTP,
//! the orchestrator persists it, dispatches it across named queues with
//! bounded concurrency, retries under failure, runs cron-driven recurring
//! work, and exposes administrative operations. Each job's unit of work is
//! an outbound HTTP call to a downstream worker service.

pub use jobq_api::{create_router, AppState};
pub use jobq_config::{load_config, Settings};
pub use jobq_handlers::{HandlerRegistry, JobHandler};
pub use jobq_service::{
	ControlPlane, ControlPlaneApi, QueueBroker, QueueRegistry, Scheduler, SchedulerConfig,
	WorkerPool, WorkerPoolConfig,
};
pub use jobq_storage::MemoryJobStore;
pub use jobq_types::jobs::{Job, JobStatus};

use jobq_service::JobSubmitter;
use jobq_types::constants;
use jobq_types::queues::{QueueConfiguration, QueueDescriptor};
use jobq_types::registry::JobTypeSpec;
use jobq_types::storage::JobStore;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Builder pattern for configuring the orchestrator
pub struct OrchestratorBuilder {
	settings: Option<Settings>,
	store: Option<Arc<dyn JobStore>>,
	handler_overrides: Vec<(String, String, JobTypeSpec, Arc<dyn JobHandler>)>,
}

impl Default for OrchestratorBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Handle to the running background components
///
/// Dropping it leaves the tasks running; call [`OrchestratorHandle::shutdown`]
/// for an orderly stop (scheduler first, then the worker pools).
pub struct OrchestratorHandle {
	shutdown: watch::Sender<bool>,
	scheduler_tasks: Vec<JoinHandle<()>>,
	worker_tasks: Vec<JoinHandle<()>>,
	pub state: AppState,
}

impl OrchestratorHandle {
	/// Stop the scheduler, then the worker pools, and wait for them.
	pub async fn shutdown(self) {
		info!("shutting down orchestrator");
		let _ = self.shutdown.send(true);
		for handle in self.scheduler_tasks {
			handle.abort();
			let _ = handle.await;
		}
		for handle in self.worker_tasks {
			let _ = handle.await;
		}
		info!("orchestrator shutdown complete");
	}
}

impl OrchestratorBuilder {
	pub fn new() -> Self {
		Self {
			settings: None,
			store: None,
			handler_overrides: Vec::new(),
		}
	}

	pub fn from_config(settings: Settings) -> Self {
		Self {
			settings: Some(settings),
			store: None,
			handler_overrides: Vec::new(),
		}
	}

	pub fn with_settings(mut self, settings: Settings) -> Self {
		self.settings = Some(settings);
		self
	}

	/// Use a specific store implementation instead of the in-memory default.
	pub fn with_store(mut self, store: Arc<dyn JobStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Register an in-process handler for a `(queue, type)` pair, replacing
	/// the outbound-HTTP default. Tests use this to avoid the network.
	pub fn with_handler(
		mut self,
		queue: impl Into<String>,
		job_type: impl Into<String>,
		spec: JobTypeSpec,
		handler: Arc<dyn JobHandler>,
	) -> Self {
		self.handler_overrides
			.push((queue.into(), job_type.into(), spec, handler));
		self
	}

	/// Wire every component and start the background tasks.
	///
	/// Returns the router for serving plus the handle owning the running
	/// scheduler and worker pools.
	pub async fn start(
		self,
	) -> Result<(axum::Router, OrchestratorHandle), Box<dyn std::error::Error>> {
		let settings = self.settings.unwrap_or_default();

		let timezone = chrono_tz::Tz::from_str(&settings.scheduler.timezone)
			.map_err(|_| format!("invalid scheduler timezone '{}'", settings.scheduler.timezone))?;

		let store: Arc<dyn JobStore> = self
			.store
			.unwrap_or_else(|| Arc::new(MemoryJobStore::new()));

		// Queue registry and broker from the fixed queue set
		let broker = Arc::new(QueueBroker::new());
		let queues = Arc::new(QueueRegistry::new());
		for (name, queue_settings) in &settings.queues {
			broker.register_queue(name.clone());
			queues.insert(QueueDescriptor::new(
				name.clone(),
				queue_settings.description.clone(),
				QueueConfiguration::from(queue_settings),
			));
		}

		// Conservative restart semantics: everything the store considers
		// in-flight is treated as expired and re-driven by the stall sweep.
		let recovered = broker.recover_from_store(store.as_ref(), chrono::Utc::now()).await?;
		if recovered > 0 {
			info!("recovered {} jobs from the store", recovered);
		}

		// Handler registry: HTTP handlers from configuration, then overrides
		let client = reqwest::Client::new();
		let mut registry = HandlerRegistry::new();
		for (queue, types) in &settings.job_types {
			if !queues.contains(queue) {
				warn!("ignoring job types for unknown queue '{}'", queue);
				continue;
			}
			for (job_type, type_settings) in types {
				registry.register_http(
					queue.clone(),
					job_type.clone(),
					JobTypeSpec::from(type_settings),
					client.clone(),
				);
			}
		}
		for (queue, job_type, spec, handler) in self.handler_overrides {
			registry.register(queue, job_type, spec, handler);
		}
		let registry = Arc::new(registry);

		let control = Arc::new(ControlPlane::new(
			Arc::clone(&store),
			Arc::clone(&broker),
			Arc::clone(&registry),
			Arc::clone(&queues),
		));

		let scheduler_config = SchedulerConfig {
			promotion_interval: Duration::from_millis(settings.scheduler.promotion_interval_ms),
			stall_sweep_interval: Duration::from_millis(settings.scheduler.stall_sweep_interval_ms),
			metrics_refresh_interval: Duration::from_millis(
				settings.scheduler.metrics_refresh_interval_ms,
			),
			retention_trim_interval: Duration::from_millis(
				settings.scheduler.retention_trim_interval_ms,
			),
			timezone,
			backoff_ceiling_ms: settings.scheduler.backoff_ceiling_ms,
			terminal_retention_days: settings.retention.terminal_days,
		};
		let scheduler = Arc::new(Scheduler::new(
			Arc::clone(&store),
			Arc::clone(&broker),
			Arc::clone(&queues),
			Arc::clone(&control) as Arc<dyn JobSubmitter>,
			scheduler_config,
		));

		let (shutdown_tx, shutdown_rx) = watch::channel(false);

		let mut worker_tasks = Vec::new();
		for (name, queue_settings) in &settings.queues {
			let pool = WorkerPool::new(
				WorkerPoolConfig {
					queue: name.clone(),
					concurrency: queue_settings.concurrency,
					retry_delay_ms: queue_settings.retry_delay_ms,
					backoff_ceiling_ms: settings.scheduler.backoff_ceiling_ms,
					job_timeout_ms: queue_settings.job_timeout_ms,
					lease_grace_ms: settings.scheduler.lease_grace_ms,
					poll_interval: Duration::from_millis(constants::DEFAULT_POLL_INTERVAL_MS),
					poll_jitter: Duration::from_millis(constants::DEFAULT_POLL_JITTER_MS),
				},
				Arc::clone(&store),
				Arc::clone(&broker),
				Arc::clone(&registry),
			);
			worker_tasks.extend(pool.start(shutdown_rx.clone()));
		}

		let scheduler_tasks = Arc::clone(&scheduler).start(shutdown_rx);

		let state = AppState {
			control: control as Arc<dyn ControlPlaneApi>,
			scheduler,
			store,
			broker,
			queues,
			admin_key: settings.security.admin_key.clone(),
		};
		let router = create_router(state.clone());

		Ok((
			router,
			OrchestratorHandle {
				shutdown: shutdown_tx,
				scheduler_tasks,
				worker_tasks,
				state,
			},
		))
	}

	/// Start the complete server with all defaults and setup handled:
	/// .env loading, configuration, tracing, and graceful shutdown.
	pub async fn start_server(mut self) -> Result<(), Box<dyn std::error::Error>> {
		dotenvy::dotenv().ok();

		let settings = if self.settings.is_some() {
			info!("using provided configuration");
			self.settings.take().ok_or("settings vanished")?
		} else {
			match load_config() {
				Ok(settings) => settings,
				Err(e) => {
					error!("failed to load configuration: {}", e);
					warn!("using default configuration");
					Settings::default()
				}
			}
		};

		Self::init_tracing(&settings);

		info!("starting jobq orchestrator");
		let mut queue_names: Vec<&String> = settings.queues.keys().collect();
		queue_names.sort();
		info!("configured queues: {}", queue_names.len());
		for name in queue_names {
			let queue = &settings.queues[name];
			info!(
				"  - {}: concurrency {}, {} attempts, {}ms base backoff",
				name, queue.concurrency, queue.retry_attempts, queue.retry_delay_ms
			);
		}

		let bind_addr = settings.bind_address();
		let addr: SocketAddr = bind_addr
			.parse()
			.map_err(|e| format!("invalid bind address '{}': {}", bind_addr, e))?;

		self.settings = Some(settings);
		let (app, handle) = self.start().await?;

		let listener = tokio::net::TcpListener::bind(addr).await?;
		info!("server listening on {}", addr);

		axum::serve(listener, app)
			.with_graceful_shutdown(async {
				let _ = tokio::signal::ctrl_c().await;
				info!("received shutdown signal");
			})
			.await?;

		handle.shutdown().await;
		Ok(())
	}

	fn init_tracing(settings: &Settings) {
		use tracing_subscriber::EnvFilter;

		let filter = EnvFilter::try_from_default_env()
			.unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone()));
		let builder = tracing_subscriber::fmt().with_env_filter(filter);
		let result = if settings.logging.structured {
			builder.json().try_init()
		} else {
			builder.compact().try_init()
		};
		if result.is_err() {
			// A subscriber is already installed (tests); keep it.
		}
	}
}
