//! Retry backoff computation

use std::time::Duration;

/// Exponential backoff for the next retry after `attempts` failed attempts.
///
/// Doubles per attempt starting from the queue's base delay and never
/// exceeds the ceiling: attempt 1 waits `base`, attempt 2 waits `2 * base`,
/// and so on.
pub fn backoff_for(attempts: u32, base_ms: u64, ceiling_ms: u64) -> Duration {
	let exponent = attempts.saturating_sub(1).min(20);
	let delay_ms = base_ms.saturating_mul(1u64 << exponent).min(ceiling_ms);
	Duration::from_millis(delay_ms)
}
