//! Provider Broker
//!
//! Main entry point for the broker service

use provider_broker::BrokerBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	BrokerBuilder::new().start_service().await
}
