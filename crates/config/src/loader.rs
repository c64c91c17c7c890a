//! Configuration loading utilities

use crate::Settings;
use config::{Config, ConfigError, File};
use tracing::warn;

/// Load configuration from the optional config file, then apply
/// environment overrides (`HOST`, `PORT`, `ADMIN_KEY`).
pub fn load_config() -> Result<Settings, ConfigError> {
	let s = Config::builder()
		.add_source(File::with_name("config/config").required(false))
		.build()?;

	let mut settings: Settings = s.try_deserialize()?;

	if let Ok(host) = std::env::var("HOST") {
		settings.server.host = host;
	}
	if let Ok(port) = std::env::var("PORT") {
		match port.parse() {
			Ok(port) => settings.server.port = port,
			Err(_) => warn!("ignoring unparseable PORT value '{}'", port),
		}
	}
	if let Ok(admin_key) = std::env::var("ADMIN_KEY") {
		settings.security.admin_key = Some(admin_key);
	}

	Ok(settings)
}
