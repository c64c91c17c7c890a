//! Job store implementations
//!
//! The `JobStore` trait lives in `jobq-types`; this crate provides the
//! backends. The in-memory store is the default and the reference for the
//! trait's semantics; a persistent backend implements the same trait.

pub mod memory_store;
pub mod traits;

pub use memory_store::MemoryJobStore;
pub use traits::{JobStore, StorageError, StorageResult};
