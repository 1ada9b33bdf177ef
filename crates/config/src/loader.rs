//! Configuration loading utilities

use crate::Settings;
use config::{Config, ConfigError, Environment, File};

/// Load configuration from `config/config.*` overlaid by `BROKER__*` variables
///
/// `CONFIG_PATH` replaces the default file location when set.
pub fn load_config() -> Result<Settings, ConfigError> {
	let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config".to_string());
	load_config_from(&path)
}

/// Load configuration from the given file (extension optional)
///
/// Missing files are allowed; every section falls back to its defaults.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
	let s = Config::builder()
		.add_source(File::with_name(path).required(false))
		.add_source(
			Environment::with_prefix("BROKER")
				.prefix_separator("__")
				.separator("__")
				.try_parsing(true),
		)
		.build()?;

	s.try_deserialize()
}
