//! Shared fixtures for the end-to-end tests

// Each test binary compiles this module; not every binary uses every helper.
#![allow(dead_code)]

pub mod handlers;
pub mod test_server;

pub use test_server::TestServer;

/// Admin key the test server is configured with.
pub const ADMIN_KEY: &str = "test-admin-key";
