//! Storage traits for pluggable store implementations

// Re-export the storage traits from the types crate
pub use jobq_types::storage::{
	AggregateDimension, AggregateRow, JobStore, QueueWindowStats, StorageError, StorageResult,
};
