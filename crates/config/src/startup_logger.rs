//! Service startup logging for the provider broker

use std::env;
use tracing::info;

use crate::Settings;

/// Logs service information at startup
pub fn log_service_info() {
	// Use the root package name, not the current crate
	let service_name = "provider-broker";
	let service_version = env!("CARGO_PKG_VERSION");

	info!("=== Provider Broker Starting ===");
	info!("🚀 Service: {} v{}", service_name, service_version);
	info!("💻 Platform: {}", env::consts::OS);
	info!("🏗️ Architecture: {}", env::consts::ARCH);

	if let Ok(cwd) = env::current_dir() {
		info!("📁 Working Directory: {}", cwd.display());
	}

	if let Ok(rust_log) = env::var("RUST_LOG") {
		info!("🔧 Log Level: {}", rust_log);
	}

	if let Ok(config_path) = env::var("CONFIG_PATH") {
		info!("📋 Config Path: {}", config_path);
	}

	info!(
		"🕒 Started at: {}",
		chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
	);
}

/// Logs service shutdown information
pub fn log_service_shutdown() {
	info!("🛑 Provider Broker Shutting Down");
	info!(
		"🕒 Shutdown at: {}",
		chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
	);
}

/// Logs the effective runtime shape once everything is wired
pub fn log_startup_complete(settings: &Settings) {
	info!("✅ Provider Broker Started Successfully");
	info!(
		"👷 Workers: {} | queue capacity: {}",
		settings.scheduler.worker_count, settings.scheduler.queue_capacity
	);
	info!(
		"🩺 Health checks every {}ms (timeout {}ms)",
		settings.monitor.check_interval_ms, settings.monitor.check_timeout_ms
	);
	info!(
		"📡 Monitoring {} configured provider(s)",
		settings.enabled_providers().len()
	);
}
