//! Shared defaults and limits

/// Maximum accepted payload size in bytes.
pub const DEFAULT_PAYLOAD_LIMIT_BYTES: usize = 1024 * 1024;

/// Default dispatch attempts before a job is terminally failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base delay for the exponential retry backoff.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;

/// Ceiling on any single retry backoff.
pub const DEFAULT_BACKOFF_CEILING_MS: u64 = 5 * 60 * 1_000;

/// Default per-attempt handler deadline.
pub const DEFAULT_JOB_TIMEOUT_MS: u64 = 2 * 60 * 1_000;

/// Grace added to the handler deadline when computing the lease.
pub const DEFAULT_LEASE_GRACE_MS: u64 = 10_000;

/// Default worker slots per queue.
pub const DEFAULT_QUEUE_CONCURRENCY: usize = 2;

/// Retention caps per queue.
pub const DEFAULT_RETAIN_COMPLETED: usize = 1_000;
pub const DEFAULT_RETAIN_FAILED: usize = 500;

/// Hard cutoff for terminal records, in days.
pub const DEFAULT_TERMINAL_RETENTION_DAYS: i64 = 30;

/// Upper bound on `delay_ms` at submission: seven days.
pub const MAX_DELAY_MS: u64 = 7 * 24 * 60 * 60 * 1_000;

/// Pagination bounds.
pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Scheduler tick intervals.
pub const DEFAULT_PROMOTION_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_STALL_SWEEP_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_METRICS_REFRESH_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_RETENTION_TRIM_INTERVAL_MS: u64 = 24 * 60 * 60 * 1_000;

/// Worker poll interval when a reserve comes back empty, plus jitter bound.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_POLL_JITTER_MS: u64 = 100;

/// Observation window for queue health and rates.
pub const METRICS_WINDOW_MINUTES: i64 = 60;

/// The fixed queue registry; adding a queue is a configuration change.
pub const QUEUE_NAMES: [&str; 8] = [
	"business-discovery",
	"instagram-detection",
	"video-scraping",
	"video-analysis",
	"report-generation",
	"file-processing",
	"cleanup",
	"notifications",
];
