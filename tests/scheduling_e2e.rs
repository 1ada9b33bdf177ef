//! End-to-end payment scheduling through a wired broker

mod mocks;

use mocks::{MockConfigs, MockEntities, ScriptedExecutor, ScriptedProbe};
use provider_broker::config::Settings;
use provider_broker::models::ScheduleOptions;
use provider_broker::{
	Broker, BrokerBuilder, BrokerError, JobState, PaymentJob, ProbeRegistry, ProviderCatalog,
	RequestStatus, RequestStore, SchedulerError, ServiceType,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

async fn broker_with(settings: Settings, executor: Arc<ScriptedExecutor>) -> Broker {
	let (a, b) = MockEntities::weather_pair();
	BrokerBuilder::from_config(settings)
		.with_probes(ProbeRegistry::new(Arc::new(ScriptedProbe::new(
			ServiceType::Generic,
		))))
		.with_executor(executor)
		.with_provider(a)
		.with_provider(b)
		.build()
		.await
		.unwrap()
}

async fn wait_for_terminal(broker: &Broker, job_id: &str) -> PaymentJob {
	timeout(Duration::from_secs(5), async {
		loop {
			if let Some(job) = broker.scheduler().get_job(job_id).await {
				if job.state.is_terminal() {
					return job;
				}
			}
			sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.expect("job did not finish in time")
}

#[tokio::test]
async fn test_request_paid_with_recommended_provider() {
	let executor = Arc::new(ScriptedExecutor::new());
	let broker = broker_with(MockConfigs::test_settings(), executor.clone()).await;

	let request = MockEntities::weather_request("req-1");
	let job_id = broker.submit_request(&request).await.unwrap();
	let job = wait_for_terminal(&broker, &job_id).await;

	assert_eq!(job.state, JobState::Completed);
	assert_eq!(job.provider_id, "provider-a");
	assert_eq!(job.attempts, 1);

	let stored = broker.store().get_request("req-1").await.unwrap().unwrap();
	assert_eq!(stored.status, RequestStatus::Completed);
	assert!(stored.response_data.is_some());

	let settled = executor.settled();
	assert_eq!(settled.len(), 1);
	assert_eq!(settled[0].1, "provider-a");
	assert!((settled[0].2 - 0.0015).abs() < 1e-12);

	let provider = broker
		.store()
		.find_by_id("provider-a")
		.await
		.unwrap()
		.unwrap();
	assert_eq!(provider.usage.requests_this_period, 1);
	assert!((broker.budget().spent_today(MockEntities::USER) - 0.0015).abs() < 1e-12);

	broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_budget_exceeded_is_rejected_before_queueing() {
	let settings = MockConfigs::with_user_budget(MockEntities::USER, 0.001, false);
	let broker = broker_with(settings, Arc::new(ScriptedExecutor::new())).await;

	let result = broker
		.submit_request(&MockEntities::weather_request("req-1"))
		.await;
	assert!(matches!(
		result,
		Err(BrokerError::Scheduler(SchedulerError::BudgetExceeded { .. }))
	));

	let stats = broker.scheduler().get_queue_stats().await;
	assert_eq!(stats.waiting, 0);
	assert!(broker.store().get_request("req-1").await.unwrap().is_none());

	broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_emergency_stop_blocks_payments() {
	let settings = MockConfigs::with_user_budget(MockEntities::USER, 10.0, true);
	let broker = broker_with(settings, Arc::new(ScriptedExecutor::new())).await;

	let result = broker
		.submit_request(&MockEntities::weather_request("req-1"))
		.await;
	assert!(matches!(
		result,
		Err(BrokerError::Scheduler(SchedulerError::BudgetExceeded { .. }))
	));

	broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failover_to_backup_provider() {
	let executor = Arc::new(ScriptedExecutor::new());
	let broker = broker_with(MockConfigs::test_settings(), executor.clone()).await;

	let (mut primary, backup) = MockEntities::weather_pair();
	primary.deactivate();

	let request = MockEntities::weather_request("req-1").with_estimated_cost(0.004);
	let job_id = broker
		.scheduler()
		.schedule_with_failover(&request, &primary, &[backup])
		.await
		.unwrap();

	let job = wait_for_terminal(&broker, &job_id).await;
	assert_eq!(job.state, JobState::Completed);
	assert_eq!(job.provider_id, "provider-b");
	assert_eq!(executor.settled()[0].1, "provider-b");

	broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_executions_reach_the_monitor() {
	let executor = Arc::new(ScriptedExecutor::new());
	executor.fail_provider("provider-a");
	let broker = broker_with(MockConfigs::test_settings(), executor.clone()).await;

	let (provider_a, _) = MockEntities::weather_pair();
	let request = MockEntities::weather_request("req-1");
	let job_id = broker
		.scheduler()
		.schedule_payment(&request, &provider_a, ScheduleOptions::with_amount(0.0015))
		.await
		.unwrap();

	let job = wait_for_terminal(&broker, &job_id).await;
	assert!(matches!(job.state, JobState::Failed { .. }));
	assert_eq!(job.attempts, 3);
	assert_eq!(job.attempt_errors.len(), 3);
	assert!(executor.settled().is_empty());

	let stored = broker.store().get_request("req-1").await.unwrap().unwrap();
	assert_eq!(stored.status, RequestStatus::Failed);
	assert!(stored.error.is_some());

	// every attempt is a failed execution sample
	let stats = broker.monitor().get_provider_stats("provider-a").unwrap();
	assert_eq!(stats.performance_samples, 3);
	let metrics = broker.monitor().get_quality_metrics("provider-a").unwrap();
	assert_eq!(metrics.uptime, 0.0);
	assert_eq!(broker.budget().spent_today(MockEntities::USER), 0.0);

	broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_history_feeds_prediction() {
	let broker = broker_with(
		MockConfigs::test_settings(),
		Arc::new(ScriptedExecutor::new()),
	)
	.await;

	for i in 0..3 {
		let request = MockEntities::weather_request(&format!("req-{}", i));
		let job_id = broker.submit_request(&request).await.unwrap();
		wait_for_terminal(&broker, &job_id).await;
	}

	let history = broker.scheduler().execution_history().await;
	assert_eq!(history.len(), 3);
	assert_eq!(
		broker.scheduler().predict_optimal_provider().await.as_deref(),
		Some("provider-a")
	);

	let stats = broker.scheduler().get_queue_stats().await;
	assert_eq!(stats.completed, 3);
	assert_eq!(stats.waiting, 0);

	broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_rejects_new_requests() {
	let broker = broker_with(
		MockConfigs::test_settings(),
		Arc::new(ScriptedExecutor::new()),
	)
	.await;
	broker.shutdown().await.unwrap();

	let result = broker
		.submit_request(&MockEntities::weather_request("req-1"))
		.await;
	assert!(matches!(
		result,
		Err(BrokerError::Scheduler(SchedulerError::ShuttingDown))
	));
}
