//! HTTP surface for the job orchestrator
//!
//! A thin axum adapter over the control plane: identity extraction, request
//! shapes, pagination, and error mapping live here; every decision about
//! jobs and queues is made by the core.

pub mod auth;
pub mod handlers;
pub mod pagination;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
