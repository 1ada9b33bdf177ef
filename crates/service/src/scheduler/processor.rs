//! Budget-aware payment job processor

use broker_config::SchedulerSettings;
use broker_types::{
	AdapterError, AdapterResult, HistoricalRecord, JobState, PaymentJob, PaymentReceipt, Provider,
	QueueStats, RequestStatus, RetryPolicy, ScheduleOptions, SchedulerHealth, ServiceRequest,
	ServiceResponse, UsageMetrics,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::FutureExt;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::queue::JobQueue;
use super::types::{SchedulerDeps, SchedulerError, SchedulerResult};

/// Upper bound on how long an idle worker sleeps before polling again
const IDLE_WAIT: Duration = Duration::from_millis(250);

/// Reservations below this are treated as zero
const RESERVATION_EPSILON: f64 = 1e-12;

/// A job together with the data its worker needs
#[derive(Debug, Clone)]
struct JobRecord {
	job: PaymentJob,
	request: ServiceRequest,
	provider: Provider,
}

#[derive(Debug, Default)]
struct JobTable {
	jobs: HashMap<String, JobRecord>,
	queue: JobQueue,
}

impl JobTable {
	/// Jobs counted against the queue capacity
	fn pending(&self) -> usize {
		self.jobs
			.values()
			.filter(|record| {
				matches!(
					record.job.state,
					JobState::Waiting | JobState::Delayed { .. }
				)
			})
			.count()
	}

	fn stats(&self, paused: bool) -> QueueStats {
		let mut stats = QueueStats {
			paused,
			..Default::default()
		};
		for record in self.jobs.values() {
			match record.job.state {
				JobState::Waiting => stats.waiting += 1,
				JobState::Delayed { .. } => stats.delayed += 1,
				JobState::Active => stats.active += 1,
				JobState::Completed => stats.completed += 1,
				JobState::Failed { .. } => stats.failed += 1,
				JobState::Cancelled => stats.cancelled += 1,
			}
		}
		stats
	}

	/// Pop the highest-priority waiting job and mark it active
	fn next_runnable(&mut self) -> Option<JobRecord> {
		while let Some(job_id) = self.queue.pop() {
			let Some(record) = self.jobs.get_mut(&job_id) else {
				continue;
			};
			if record.job.state != JobState::Waiting {
				continue;
			}
			record.job.state = JobState::Active;
			record.job.attempts += 1;
			if record.job.started_at.is_none() {
				record.job.started_at = Some(Utc::now());
			}
			return Some(record.clone());
		}
		None
	}

	/// Drop the oldest terminal jobs once more than `max_entries` are kept
	///
	/// Live jobs are never evicted, so the table may stay above the limit
	/// while many jobs are in flight.
	fn evict_terminal_jobs(&mut self, max_entries: usize) -> usize {
		if self.jobs.len() <= max_entries {
			return 0;
		}
		let remove_count = self.jobs.len() - max_entries;

		let mut finished: Vec<(&String, DateTime<Utc>)> = self
			.jobs
			.iter()
			.filter(|(_, record)| record.job.state.is_terminal())
			.map(|(id, record)| (id, record.job.finished_at.unwrap_or(record.job.created_at)))
			.collect();

		// Partial sort: only the oldest `remove_count` entries matter
		if remove_count < finished.len() {
			finished.select_nth_unstable_by_key(remove_count, |(_, finished_at)| *finished_at);
			finished.truncate(remove_count);
		}

		let to_remove: Vec<String> = finished.into_iter().map(|(id, _)| id.clone()).collect();
		for id in &to_remove {
			self.jobs.remove(id);
		}
		to_remove.len()
	}
}

/// Result of one execution attempt
enum AttemptOutcome {
	Succeeded {
		call: ServiceResponse,
		receipt: PaymentReceipt,
		response_time_ms: u64,
	},
	Failed {
		error: String,
		response_time_ms: u64,
	},
	/// Refused by the execution-time budget check; never retried
	BudgetDenied { reason: String },
}

fn deadline_after(delay: Duration) -> DateTime<Utc> {
	let millis = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
	Utc::now()
		.checked_add_signed(chrono::Duration::milliseconds(millis))
		.unwrap_or(DateTime::<Utc>::MAX_UTC)
}

struct SchedulerInner {
	settings: SchedulerSettings,
	retry_policy: RetryPolicy,
	deps: SchedulerDeps,
	table: RwLock<JobTable>,
	history: RwLock<VecDeque<HistoricalRecord>>,
	user_locks: DashMap<String, Arc<Mutex<()>>>,
	/// Amounts of in-flight executions per user, guarded by the user's lock
	reservations: DashMap<String, f64>,
	timers: DashMap<String, JoinHandle<()>>,
	notify: Notify,
	paused: AtomicBool,
	shutting_down: AtomicBool,
	next_job_id: AtomicU64,
}

impl SchedulerInner {
	async fn worker_loop(self: Arc<Self>, worker_id: usize) {
		debug!("Payment worker {} started", worker_id);

		loop {
			if self.shutting_down.load(Ordering::SeqCst) {
				break;
			}

			let next = if self.paused.load(Ordering::SeqCst) {
				None
			} else {
				self.table.write().await.next_runnable()
			};

			match next {
				Some(record) => self.process(worker_id, record).await,
				None => {
					let _ = timeout(IDLE_WAIT, self.notify.notified()).await;
				},
			}
		}

		debug!("Payment worker {} stopped", worker_id);
	}

	async fn process(self: &Arc<Self>, worker_id: usize, record: JobRecord) {
		let JobRecord {
			job,
			request,
			provider,
		} = record;
		debug!(
			"Worker {} processing job {} for request {} via {} (attempt {}/{})",
			worker_id, job.id, job.request_id, job.provider_id, job.attempts, job.max_attempts
		);

		match self.run_attempt(&job, &request, &provider).await {
			AttemptOutcome::Succeeded {
				call,
				receipt,
				response_time_ms,
			} => self.complete(&job, call, receipt, response_time_ms).await,
			AttemptOutcome::Failed {
				error,
				response_time_ms,
			} => self.fail_attempt(&job, error, response_time_ms).await,
			AttemptOutcome::BudgetDenied { reason } => self.abort(&job, reason).await,
		}
	}

	/// Budget critical section, then the provider call outside of it
	async fn run_attempt(
		&self,
		job: &PaymentJob,
		request: &ServiceRequest,
		provider: &Provider,
	) -> AttemptOutcome {
		let user_lock = self.user_lock(&job.user_id);

		{
			let _guard = user_lock.lock().await;
			let in_flight = self.reserved(&job.user_id);
			match self
				.deps
				.budget
				.check_limits(&job.user_id, job.amount + in_flight)
				.await
			{
				Ok(check) if check.can_proceed => self.adjust_reservation(&job.user_id, job.amount),
				Ok(check) => {
					return AttemptOutcome::BudgetDenied {
						reason: check.denial_reason(),
					}
				},
				Err(e) => {
					return AttemptOutcome::Failed {
						error: format!("budget check failed: {}", e),
						response_time_ms: 0,
					}
				},
			}
		}

		let started = Instant::now();
		let fut = self.call_and_settle(request, provider, job.amount);
		let result = match AssertUnwindSafe(fut).catch_unwind().await {
			Ok(result) => result.map_err(|e| {
				if e.is_timeout() {
					warn!("Provider {} timed out on job {}", provider.id, job.id);
				}
				e.to_string()
			}),
			Err(_) => {
				error!("Executor panicked while processing job {}", job.id);
				Err("executor panicked".to_string())
			},
		};
		let response_time_ms = started.elapsed().as_millis() as u64;

		{
			let _guard = user_lock.lock().await;
			if result.is_ok() {
				if let Err(e) = self.deps.budget.record_spend(&job.user_id, job.amount).await {
					error!(
						"Failed to record spend of {:.6} for user {} (job {}): {}",
						job.amount, job.user_id, job.id, e
					);
				}
			}
			self.adjust_reservation(&job.user_id, -job.amount);
		}

		match result {
			Ok((call, receipt)) => AttemptOutcome::Succeeded {
				call,
				receipt,
				response_time_ms,
			},
			Err(error) => AttemptOutcome::Failed {
				error,
				response_time_ms,
			},
		}
	}

	async fn call_and_settle(
		&self,
		request: &ServiceRequest,
		provider: &Provider,
		amount: f64,
	) -> AdapterResult<(ServiceResponse, PaymentReceipt)> {
		let timeout_ms = self.settings.provider_call_timeout_ms;
		let limit = Duration::from_millis(timeout_ms);
		let executor = &self.deps.executor;

		let call = timeout(limit, executor.call_service(request, provider))
			.await
			.map_err(|_| AdapterError::Timeout { timeout_ms })??;
		let receipt = timeout(limit, executor.settle_payment(request, provider, amount, &call))
			.await
			.map_err(|_| AdapterError::Timeout { timeout_ms })??;

		Ok((call, receipt))
	}

	async fn complete(
		&self,
		job: &PaymentJob,
		call: ServiceResponse,
		receipt: PaymentReceipt,
		response_time_ms: u64,
	) {
		self.observe(&job.provider_id, response_time_ms, true);

		let response_data = json!({
			"provider_id": job.provider_id,
			"data": call.data,
			"transaction_id": receipt.transaction_id,
			"amount": receipt.amount,
			"settled_at": receipt.settled_at,
		});
		if let Err(e) = self
			.deps
			.requests
			.update_status(&job.request_id, RequestStatus::Completed, Some(response_data), None)
			.await
		{
			error!("Failed to mark request {} completed: {}", job.request_id, e);
		}

		if let Some(catalog) = &self.deps.catalog {
			if let Err(e) = catalog.record_usage(&job.provider_id).await {
				warn!("Failed to record usage for provider {}: {}", job.provider_id, e);
			}
		}

		self.finish_job(&job.id, JobState::Completed, None).await;
		self.record_history(job, RequestStatus::Completed, response_time_ms)
			.await;

		info!(
			"Job {} completed: paid {:.6} to {} for request {} in {}ms",
			job.id, job.amount, job.provider_id, job.request_id, response_time_ms
		);
	}

	async fn fail_attempt(self: &Arc<Self>, job: &PaymentJob, error: String, response_time_ms: u64) {
		self.observe(&job.provider_id, response_time_ms, false);

		if let Err(e) = self
			.deps
			.requests
			.update_status(&job.request_id, RequestStatus::Failed, None, Some(error.clone()))
			.await
		{
			error!("Failed to mark request {} failed: {}", job.request_id, e);
		}

		if job.attempts < job.max_attempts {
			let delay = job.backoff.delay_after(job.attempts);
			warn!(
				"Job {} attempt {}/{} failed: {}; retrying in {:?}",
				job.id, job.attempts, job.max_attempts, error, delay
			);

			if let Err(e) = self
				.deps
				.requests
				.update_status(&job.request_id, RequestStatus::Processing, None, None)
				.await
			{
				error!("Failed to mark request {} processing: {}", job.request_id, e);
			}

			{
				let mut table = self.table.write().await;
				if let Some(record) = table.jobs.get_mut(&job.id) {
					record.job.attempt_errors.push(error);
					record.job.state = JobState::Delayed {
						until: deadline_after(delay),
					};
				}
			}

			if !self.shutting_down.load(Ordering::SeqCst) {
				self.schedule_promotion(job.id.clone(), delay);
			}
		} else {
			error!(
				"Job {} failed after {} attempts: {}",
				job.id, job.attempts, error
			);
			self.finish_job(
				&job.id,
				JobState::Failed {
					error: error.clone(),
				},
				Some(error),
			)
			.await;
			self.record_history(job, RequestStatus::Failed, response_time_ms)
				.await;
		}
	}

	async fn abort(&self, job: &PaymentJob, reason: String) {
		let error = format!("budget exceeded: {}", reason);
		warn!(
			"Job {} aborted for user {}: {}",
			job.id, job.user_id, error
		);

		if let Err(e) = self
			.deps
			.requests
			.update_status(&job.request_id, RequestStatus::Failed, None, Some(error.clone()))
			.await
		{
			error!("Failed to mark request {} failed: {}", job.request_id, e);
		}

		self.finish_job(
			&job.id,
			JobState::Failed {
				error: error.clone(),
			},
			Some(error),
		)
		.await;
		self.record_history(job, RequestStatus::Failed, 0).await;
	}

	async fn finish_job(&self, job_id: &str, state: JobState, error: Option<String>) {
		let mut table = self.table.write().await;
		if let Some(record) = table.jobs.get_mut(job_id) {
			record.job.state = state;
			record.job.finished_at = Some(Utc::now());
			if let Some(error) = error {
				record.job.attempt_errors.push(error);
			}
		} else {
			warn!("Job '{}' not found when recording its outcome", job_id);
		}
	}

	async fn record_history(&self, job: &PaymentJob, status: RequestStatus, response_time_ms: u64) {
		let mut history = self.history.write().await;
		history.push_back(HistoricalRecord {
			request_id: job.request_id.clone(),
			provider_id: job.provider_id.clone(),
			status,
			response_time_ms,
			cost: job.amount,
			timestamp: Utc::now(),
		});
		while history.len() > self.settings.history_limit {
			history.pop_front();
		}
	}

	fn observe(&self, provider_id: &str, response_time_ms: u64, success: bool) {
		if let Some(observer) = &self.deps.observer {
			observer.record_execution(provider_id, response_time_ms, success);
		}
	}

	/// Make a delayed job runnable once `delay` has elapsed
	fn schedule_promotion(self: &Arc<Self>, job_id: String, delay: Duration) {
		let inner = Arc::clone(self);
		let timer_job_id = job_id.clone();
		let handle = tokio::spawn(async move {
			sleep(delay).await;
			inner.promote(&timer_job_id).await;
		});
		self.timers.insert(job_id, handle);
	}

	async fn promote(&self, job_id: &str) {
		self.timers.remove(job_id);

		let promoted = {
			let mut guard = self.table.write().await;
			let table = &mut *guard;
			match table.jobs.get_mut(job_id) {
				Some(record) if matches!(record.job.state, JobState::Delayed { .. }) => {
					record.job.state = JobState::Waiting;
					table.queue.push(job_id, record.job.priority_score);
					true
				},
				_ => false,
			}
		};

		if promoted {
			debug!("Job {} is runnable", job_id);
			self.notify.notify_one();
		}
	}

	fn cancel_timers(&self) {
		let ids: Vec<String> = self.timers.iter().map(|entry| entry.key().clone()).collect();
		for id in ids {
			if let Some((_, handle)) = self.timers.remove(&id) {
				handle.abort();
			}
		}
	}

	/// Cancel every job still waiting for a worker or a retry timer
	async fn cancel_pending(&self, reason: &str) -> usize {
		let request_ids: Vec<String> = {
			let mut table = self.table.write().await;
			table
				.jobs
				.values_mut()
				.filter(|record| {
					matches!(
						record.job.state,
						JobState::Waiting | JobState::Delayed { .. }
					)
				})
				.map(|record| {
					record.job.state = JobState::Cancelled;
					record.job.finished_at = Some(Utc::now());
					record.job.attempt_errors.push(reason.to_string());
					record.job.request_id.clone()
				})
				.collect()
		};

		for request_id in &request_ids {
			if let Err(e) = self
				.deps
				.requests
				.update_status(
					request_id,
					RequestStatus::Cancelled,
					None,
					Some(reason.to_string()),
				)
				.await
			{
				error!("Failed to mark request {} cancelled: {}", request_id, e);
			}
		}
		request_ids.len()
	}

	fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
		self.user_locks
			.entry(user_id.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}

	fn reserved(&self, user_id: &str) -> f64 {
		self.reservations.get(user_id).map(|amount| *amount).unwrap_or(0.0)
	}

	fn adjust_reservation(&self, user_id: &str, delta: f64) {
		let mut entry = self.reservations.entry(user_id.to_string()).or_insert(0.0);
		let updated = *entry + delta;
		*entry = if updated < RESERVATION_EPSILON { 0.0 } else { updated };
	}
}

/// Priority queue of payment jobs executed by a bounded worker pool
///
/// Admission checks the user's budget; execution re-checks it inside a
/// per-user critical section that also accounts for in-flight payments, so
/// concurrent completions can never push a user past a limit.
pub struct PaymentScheduler {
	inner: Arc<SchedulerInner>,
	workers: Mutex<Vec<JoinHandle<()>>>,
	worker_total: usize,
}

impl PaymentScheduler {
	/// Create a scheduler and spawn its workers
	pub fn new(deps: SchedulerDeps, settings: SchedulerSettings) -> Self {
		let worker_total = settings.worker_count.max(1);
		let retry_policy = RetryPolicy::from(&settings.retry);

		let inner = Arc::new(SchedulerInner {
			settings,
			retry_policy,
			deps,
			table: RwLock::new(JobTable::default()),
			history: RwLock::new(VecDeque::new()),
			user_locks: DashMap::new(),
			reservations: DashMap::new(),
			timers: DashMap::new(),
			notify: Notify::new(),
			paused: AtomicBool::new(false),
			shutting_down: AtomicBool::new(false),
			next_job_id: AtomicU64::new(1),
		});

		let workers = (0..worker_total)
			.map(|worker_id| tokio::spawn(Arc::clone(&inner).worker_loop(worker_id)))
			.collect();

		info!(
			"Started payment scheduler with {} workers (queue capacity {}, max attempts {})",
			worker_total, inner.settings.queue_capacity, inner.retry_policy.max_attempts
		);

		Self {
			inner,
			workers: Mutex::new(workers),
			worker_total,
		}
	}

	/// Admit a payment job for `request` against `provider`
	pub async fn schedule_payment(
		&self,
		request: &ServiceRequest,
		provider: &Provider,
		options: ScheduleOptions,
	) -> SchedulerResult<String> {
		let inner = &self.inner;
		if inner.shutting_down.load(Ordering::SeqCst) {
			return Err(SchedulerError::ShuttingDown);
		}
		if !provider.is_active {
			return Err(SchedulerError::ProviderUnavailable {
				provider_id: provider.id.clone(),
				reason: "provider is inactive".to_string(),
			});
		}
		if provider.service_type != request.service_type {
			return Err(SchedulerError::ProviderUnavailable {
				provider_id: provider.id.clone(),
				reason: format!(
					"provider serves {}, request needs {}",
					provider.service_type, request.service_type
				),
			});
		}

		let amount = options.amount.unwrap_or(request.estimated_cost);
		let check = inner
			.deps
			.budget
			.check_limits(&request.user_id, amount)
			.await?;
		if !check.can_proceed {
			let reason = check.denial_reason();
			warn!(
				"Refusing payment of {:.6} for request {} (user {}): {}",
				amount, request.id, request.user_id, reason
			);
			return Err(SchedulerError::BudgetExceeded {
				user_id: request.user_id.clone(),
				reason,
			});
		}

		let policy = options
			.retry_policy
			.unwrap_or_else(|| inner.retry_policy.clone());
		let job_id = format!("job-{}", inner.next_job_id.fetch_add(1, Ordering::SeqCst));
		let mut job = PaymentJob::new(
			job_id.clone(),
			request.id.clone(),
			request.user_id.clone(),
			provider.id.clone(),
			amount,
			request.priority,
			policy,
		);
		let delay = options
			.delay_ms
			.filter(|delay_ms| *delay_ms > 0)
			.map(Duration::from_millis);

		{
			let mut guard = inner.table.write().await;
			let table = &mut *guard;
			if table.pending() >= inner.settings.queue_capacity {
				warn!("Payment queue full, rejecting request {}", request.id);
				return Err(SchedulerError::QueueFull);
			}

			if inner.deps.requests.get_request(&request.id).await?.is_none() {
				inner.deps.requests.create_request(request.clone()).await?;
			}

			// The request must be processing before any worker can see the job
			inner
				.deps
				.requests
				.update_status(&request.id, RequestStatus::Processing, None, None)
				.await?;

			match delay {
				Some(delay) => {
					job.state = JobState::Delayed {
						until: deadline_after(delay),
					}
				},
				None => table.queue.push(job_id.clone(), job.priority_score),
			}

			let mut stored_request = request.clone();
			stored_request.apply_status(RequestStatus::Processing, None, None);
			table.jobs.insert(
				job_id.clone(),
				JobRecord {
					job,
					request: stored_request,
					provider: provider.clone(),
				},
			);

			let evicted = table.evict_terminal_jobs(inner.settings.max_retained_jobs);
			if evicted > 0 {
				debug!("Evicted {} finished jobs from the job table", evicted);
			}
		}

		match delay {
			Some(delay) => inner.schedule_promotion(job_id.clone(), delay),
			None => inner.notify.notify_one(),
		}

		info!(
			"Scheduled job {} for request {}: {:.6} to {} (priority {:?})",
			job_id, request.id, amount, provider.id, request.priority
		);
		Ok(job_id)
	}

	/// Rank `providers` and schedule the payment with the recommended one
	pub async fn schedule_optimized_payment(
		&self,
		request: &ServiceRequest,
		providers: &[Provider],
	) -> SchedulerResult<String> {
		let analysis = self
			.inner
			.deps
			.optimizer
			.analyze(request.service_type, providers, request)?;

		let primary_id = &analysis.recommendation.primary_provider_id;
		let provider = providers
			.iter()
			.find(|provider| &provider.id == primary_id)
			.ok_or_else(|| SchedulerError::NoSuitableProvider {
				reason: format!(
					"recommended provider '{}' is not among the candidates",
					primary_id
				),
			})?;

		let cost = analysis
			.primary()
			.map_or(request.estimated_cost, |primary| primary.estimated_cost);
		let request = request.clone().with_estimated_cost(cost);

		self.schedule_payment(&request, provider, ScheduleOptions::with_amount(cost))
			.await
	}

	/// Try `primary`, then each backup in order
	pub async fn schedule_with_failover(
		&self,
		request: &ServiceRequest,
		primary: &Provider,
		backups: &[Provider],
	) -> SchedulerResult<String> {
		let mut tried = Vec::new();
		let mut last_error = String::new();

		for provider in std::iter::once(primary).chain(backups.iter()) {
			match self
				.schedule_payment(request, provider, ScheduleOptions::default())
				.await
			{
				Ok(job_id) => {
					if !tried.is_empty() {
						info!(
							"Request {} failed over to {} after {:?}",
							request.id, provider.id, tried
						);
					}
					return Ok(job_id);
				},
				Err(e) => {
					warn!(
						"Scheduling request {} with {} failed: {}",
						request.id, provider.id, e
					);
					tried.push(provider.id.clone());
					last_error = e.to_string();
				},
			}
		}

		Err(SchedulerError::AllProvidersFailed { tried, last_error })
	}

	/// Schedule each request through the optimizer; failures are logged and skipped
	pub async fn schedule_batch(
		&self,
		requests: &[ServiceRequest],
		providers: &[Provider],
	) -> Vec<String> {
		let mut job_ids = Vec::with_capacity(requests.len());
		for request in requests {
			match self.schedule_optimized_payment(request, providers).await {
				Ok(job_id) => job_ids.push(job_id),
				Err(e) => warn!("Batch scheduling of request {} failed: {}", request.id, e),
			}
		}
		info!(
			"Batch scheduled {}/{} requests",
			job_ids.len(),
			requests.len()
		);
		job_ids
	}

	pub async fn get_queue_stats(&self) -> QueueStats {
		self.inner
			.table
			.read()
			.await
			.stats(self.inner.paused.load(Ordering::SeqCst))
	}

	pub async fn get_job(&self, job_id: &str) -> Option<PaymentJob> {
		self.inner
			.table
			.read()
			.await
			.jobs
			.get(job_id)
			.map(|record| record.job.clone())
	}

	/// Jobs created for a request, oldest first
	pub async fn jobs_for_request(&self, request_id: &str) -> Vec<PaymentJob> {
		let mut jobs: Vec<PaymentJob> = self
			.inner
			.table
			.read()
			.await
			.jobs
			.values()
			.filter(|record| record.job.request_id == request_id)
			.map(|record| record.job.clone())
			.collect();
		jobs.sort_by_key(|job| job.created_at);
		jobs
	}

	/// Cancel a job that no worker has picked up yet
	pub async fn cancel_job(&self, job_id: &str) -> SchedulerResult {
		let request_id = {
			let mut table = self.inner.table.write().await;
			let record =
				table
					.jobs
					.get_mut(job_id)
					.ok_or_else(|| SchedulerError::JobNotFound {
						job_id: job_id.to_string(),
					})?;

			let queued = matches!(
				record.job.state,
				JobState::Waiting | JobState::Delayed { .. }
			);
			if !queued || record.job.has_started() {
				return Err(SchedulerError::InvalidJobState {
					job_id: job_id.to_string(),
					state: record.job.state.as_str().to_string(),
					operation: "cancel".to_string(),
				});
			}

			record.job.state = JobState::Cancelled;
			record.job.finished_at = Some(Utc::now());
			record.job.request_id.clone()
		};

		if let Some((_, timer)) = self.inner.timers.remove(job_id) {
			timer.abort();
		}

		self.inner
			.deps
			.requests
			.update_status(&request_id, RequestStatus::Cancelled, None, None)
			.await?;

		info!("Cancelled job {} (request {})", job_id, request_id);
		Ok(())
	}

	/// Re-queue a failed job with a fresh attempt budget
	pub async fn retry_job(&self, job_id: &str) -> SchedulerResult {
		if self.inner.shutting_down.load(Ordering::SeqCst) {
			return Err(SchedulerError::ShuttingDown);
		}

		{
			let mut guard = self.inner.table.write().await;
			let table = &mut *guard;
			let record =
				table
					.jobs
					.get_mut(job_id)
					.ok_or_else(|| SchedulerError::JobNotFound {
						job_id: job_id.to_string(),
					})?;

			if !matches!(record.job.state, JobState::Failed { .. }) {
				return Err(SchedulerError::InvalidJobState {
					job_id: job_id.to_string(),
					state: record.job.state.as_str().to_string(),
					operation: "retry".to_string(),
				});
			}

			self.inner
				.deps
				.requests
				.update_status(&record.job.request_id, RequestStatus::Processing, None, None)
				.await?;

			record.job.attempts = 0;
			record.job.state = JobState::Waiting;
			record.job.finished_at = None;
			let priority_score = record.job.priority_score;
			table.queue.push(job_id, priority_score);
		}

		self.inner.notify.notify_one();
		info!("Job {} re-queued for retry", job_id);
		Ok(())
	}

	/// Stop dequeueing; queued jobs stay queued and in-flight jobs finish
	pub fn pause(&self) {
		self.inner.paused.store(true, Ordering::SeqCst);
		info!("Payment scheduler paused");
	}

	pub fn resume(&self) {
		self.inner.paused.store(false, Ordering::SeqCst);
		self.inner.notify.notify_waiters();
		info!("Payment scheduler resumed");
	}

	pub fn is_paused(&self) -> bool {
		self.inner.paused.load(Ordering::SeqCst)
	}

	pub async fn health_check(&self) -> SchedulerHealth {
		let workers_alive = self
			.workers
			.lock()
			.await
			.iter()
			.filter(|worker| !worker.is_finished())
			.count();
		let accepting_jobs = !self.inner.shutting_down.load(Ordering::SeqCst);
		let queue_depth = self.inner.table.read().await.pending();

		SchedulerHealth {
			healthy: accepting_jobs && workers_alive == self.worker_total,
			accepting_jobs,
			paused: self.is_paused(),
			workers_alive,
			workers_total: self.worker_total,
			queue_depth,
		}
	}

	/// Executed and aborted jobs, oldest first
	pub async fn execution_history(&self) -> Vec<HistoricalRecord> {
		self.inner.history.read().await.iter().cloned().collect()
	}

	/// Usage totals over the execution history since `since`
	pub async fn usage_metrics(&self, since: DateTime<Utc>) -> UsageMetrics {
		UsageMetrics::from_records(self.inner.history.read().await.iter(), since)
	}

	/// Provider the execution history suggests for the next request
	pub async fn predict_optimal_provider(&self) -> Option<String> {
		let history = self.execution_history().await;
		self.inner.deps.optimizer.predict_optimal_choice(&history)
	}

	/// Stop accepting jobs, abort retry timers and wait for the workers
	///
	/// In-flight jobs run to completion. Jobs still queued or waiting on a
	/// retry afterwards are cancelled together with their requests.
	pub async fn shutdown(&self) -> SchedulerResult {
		info!("Shutting down payment scheduler...");
		self.inner.shutting_down.store(true, Ordering::SeqCst);
		self.inner.cancel_timers();
		self.inner.notify.notify_waiters();

		let workers: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
		for (i, worker) in workers.into_iter().enumerate() {
			if let Err(e) = worker.await {
				error!("Payment worker {} failed to shutdown cleanly: {}", i, e);
			} else {
				debug!("Payment worker {} shutdown cleanly", i);
			}
		}

		let cancelled = self.inner.cancel_pending("scheduler shut down").await;
		if cancelled > 0 {
			warn!("Cancelled {} pending payment job(s) on shutdown", cancelled);
		}

		info!("Payment scheduler shutdown complete");
		Ok(())
	}
}

impl Drop for PaymentScheduler {
	fn drop(&mut self) {
		self.inner.shutting_down.store(true, Ordering::SeqCst);
		self.inner.cancel_timers();
		self.inner.notify.notify_waiters();
	}
}
