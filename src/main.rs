//! jobq orchestrator server
//!
//! Main entry point for the orchestration service

use jobq_orchestrator::OrchestratorBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	// Start the complete server with all defaults and setup handled automatically
	OrchestratorBuilder::new().start_server().await
}
