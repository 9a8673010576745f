use crate::error::ConfigError;
use crate::metrics::MetricsSource;
use crate::queries::build_query_pool;
use crate::sampler::{SnapshotCallback, SnapshotSampler};
use crate::service::{QueryError, QueryRequest, QueryService};
use crate::signal::StopSignal;
use crate::stats::SharedCounters;
use crate::summary::compute_summary;
use crate::types::{QueryOutcome, TestConfiguration, TestResult, TestStatus};
use anyhow::{anyhow, Result};
use chrono::Utc;
use futures_lite::FutureExt;
use log::{error, info};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use uuid::Uuid;

/// Receives timestamped progress lines. Must return quickly.
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

const USER_ID_PREFIX: &str = "stress-test-user";

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "query task panicked".to_string())
}

/// Progress reporting for one run: every line goes to the `log` facade and,
/// stamped `[HH:MM:SS]`, to the caller's callback.
#[derive(Clone, Default)]
pub struct RunLogger {
    callback: Option<LogCallback>,
}

impl RunLogger {
    pub fn new(callback: Option<LogCallback>) -> Self {
        Self { callback }
    }

    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{}", message);
        if let Some(callback) = &self.callback {
            let line = format!("[{}] {}", Utc::now().format("%H:%M:%S"), message);
            callback(&line);
        }
    }
}

/// Everything a query task needs, cloned into each task.
#[derive(Clone)]
struct QueryContext {
    service: Arc<dyn QueryService>,
    counters: SharedCounters,
    stop: StopSignal,
    logger: RunLogger,
    started: Instant,
    deadline: Option<Duration>,
    query_timeout: Duration,
    test_id: Arc<str>,
    model: Arc<str>,
    use_rag: bool,
    total_queries: usize,
    /// First orchestration failure of the run; set once, ends the run.
    fault: Arc<OnceCell<String>>,
}

impl QueryContext {
    /// New queries start only while the stop flag is clear and the max
    /// duration, if any, has not passed.
    fn may_start(&self) -> bool {
        if self.stop.is_stopped() {
            return false;
        }
        !matches!(self.deadline, Some(deadline) if self.started.elapsed() >= deadline)
    }

    /// Records an orchestration failure and raises the stop flag.
    fn fail(&self, reason: String) {
        if self.fault.set(reason.clone()).is_ok() {
            error!("❌ Stress test {} aborted: {}", self.test_id, reason);
        }
        self.stop.stop();
    }

    async fn execute(&self, user_index: usize, query_index: usize, query: String) {
        self.counters.begin_query().await;
        self.logger.log(format!(
            "[Query {}] Starting: {}...",
            query_index + 1,
            excerpt(&query, 60)
        ));

        let request = QueryRequest {
            text: query,
            user_id: format!("{}-{}", USER_ID_PREFIX, user_index + 1),
            session_id: format!("stress-{}-{}", self.test_id, user_index + 1),
            model: self.model.to_string(),
            use_rag: self.use_rag,
        };

        let started_at = Utc::now();
        let start = Instant::now();
        let call = AssertUnwindSafe(self.service.submit(&request)).catch_unwind();
        let result = match timeout(self.query_timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => {
                let reason = panic_message(payload.as_ref());
                self.fail(format!("query service panicked: {}", reason));
                Err(QueryError::Internal(reason))
            }
            Err(_) => Err(QueryError::Timeout(self.query_timeout.as_secs())),
        };
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let error = result.err().map(|e| e.to_string());
        match &error {
            None => self
                .logger
                .log(format!("[Query {}] OK - {:.0}ms", query_index + 1, latency_ms)),
            Some(e) => self
                .logger
                .log(format!("[Query {}] FAILED - {}", query_index + 1, e)),
        }

        let progress = self
            .counters
            .finish_query(QueryOutcome {
                user_index,
                query: request.text,
                started_at,
                latency_ms,
                success: error.is_none(),
                error,
            })
            .await;

        self.logger.log(format!(
            "Progress: {}/{} (OK: {}, FAIL: {})",
            progress.finished(),
            self.total_queries,
            progress.completed,
            progress.failed
        ));
    }
}

/// Joins every handle in order. A failed task stops the run; the first
/// failure is returned once all handles finished.
async fn join_all_tasks(handles: Vec<JoinHandle<()>>, stop: &StopSignal) -> Result<()> {
    let mut first_error = None;
    for handle in handles {
        if let Err(e) = handle.await {
            error!("❌ Query task failed: {}", e);
            stop.stop();
            first_error.get_or_insert_with(|| anyhow!("query task failed: {}", e));
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Burst mode: every query is dispatched at once and a semaphore bounds the
/// number in flight to `concurrent_users`.
async fn run_concurrent(
    queries: &[String],
    concurrent_users: usize,
    queries_per_user: usize,
    ctx: &QueryContext,
) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(concurrent_users));
    let mut handles = Vec::with_capacity(queries.len());
    let mut dispatch_error = None;

    for (index, query) in queries.iter().enumerate() {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                dispatch_error = Some(anyhow!(e));
                break;
            }
        };

        if !ctx.may_start() {
            ctx.logger
                .log(format!("Dispatch halted after {} queries", index));
            break;
        }

        let ctx = ctx.clone();
        let query = query.clone();
        handles.push(tokio::spawn(async move {
            ctx.execute(index / queries_per_user, index, query).await;
            drop(permit);
        }));
    }

    let joined = join_all_tasks(handles, &ctx.stop).await;
    match dispatch_error {
        Some(e) => Err(e),
        None => joined,
    }
}

/// Ramp-up mode: one sequential lane per user, lane `i` starting
/// `i * ramp_up / users` after the test start.
async fn run_with_ramp_up(
    queries: &[String],
    concurrent_users: usize,
    ramp_up: Duration,
    ctx: &QueryContext,
) -> Result<()> {
    ctx.logger.log(format!(
        "Ramp-up: scaling to {} users over {}s",
        concurrent_users,
        ramp_up.as_secs()
    ));

    // Floor division: a remainder that does not fill a whole lane is not sent.
    let per_lane = queries.len() / concurrent_users;
    let lane_delay = ramp_up.as_secs_f64() / concurrent_users as f64;
    let delay_of = |lane: usize| {
        Duration::try_from_secs_f64(lane_delay * lane as f64).unwrap_or(ramp_up)
    };

    let handles: Vec<JoinHandle<()>> = (0..concurrent_users)
        .map(|lane| {
            let first = lane * per_lane;
            let lane_queries = queries[first..first + per_lane].to_vec();
            let delay = delay_of(lane);
            let ctx = ctx.clone();

            tokio::spawn(async move {
                if !ctx.stop.sleep(delay).await || !ctx.may_start() {
                    return;
                }
                ctx.logger.log(format!("User {} started", lane + 1));

                for (offset, query) in lane_queries.into_iter().enumerate() {
                    if !ctx.may_start() {
                        break;
                    }
                    ctx.execute(lane, first + offset, query).await;
                }
            })
        })
        .collect();

    join_all_tasks(handles, &ctx.stop).await
}

/// Entry point of the stress-testing engine.
#[derive(Clone)]
pub struct StressTestRunner {
    service: Arc<dyn QueryService>,
    metrics: Arc<dyn MetricsSource>,
}

impl StressTestRunner {
    pub fn new(service: Arc<dyn QueryService>, metrics: Arc<dyn MetricsSource>) -> Self {
        Self { service, metrics }
    }

    /// Validates the configuration and creates the run handle, which owns the
    /// stop flag and live counters of that run alone.
    pub fn prepare(
        &self,
        test_id: impl Into<String>,
        name: Option<String>,
        config: TestConfiguration,
    ) -> Result<TestRun, ConfigError> {
        config.validate()?;
        Ok(TestRun {
            test_id: test_id.into(),
            name,
            config,
            service: self.service.clone(),
            metrics: self.metrics.clone(),
            counters: SharedCounters::new(),
            stop: StopSignal::new(),
        })
    }

    /// Runs a test to completion under a fresh id.
    pub async fn run_test(
        &self,
        config: TestConfiguration,
        on_log: Option<LogCallback>,
        on_snapshot: Option<SnapshotCallback>,
    ) -> Result<TestResult, ConfigError> {
        let run = self.prepare(Uuid::new_v4().to_string(), None, config)?;
        Ok(run.run(on_log, on_snapshot).await)
    }
}

/// Handle to one prepared stress test.
pub struct TestRun {
    test_id: String,
    name: Option<String>,
    config: TestConfiguration,
    service: Arc<dyn QueryService>,
    metrics: Arc<dyn MetricsSource>,
    counters: SharedCounters,
    stop: StopSignal,
}

impl TestRun {
    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    pub fn config(&self) -> &TestConfiguration {
        &self.config
    }

    /// Setting this flag stops the run: no new query starts, in-flight ones
    /// finish.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn counters(&self) -> SharedCounters {
        self.counters.clone()
    }

    /// Drives load and sampling concurrently and assembles the result once
    /// both have stopped. Always yields a result, even if the run failed.
    pub async fn run(
        self,
        on_log: Option<LogCallback>,
        on_snapshot: Option<SnapshotCallback>,
    ) -> TestResult {
        let logger = RunLogger::new(on_log);
        let config = &self.config;
        let users = config.concurrent_users as usize;
        let per_user = config.queries_per_user as usize;
        let queries = build_query_pool(config);

        logger.log("🎯 Starting stress test");
        logger.log(format!("  Concurrent users: {}", users));
        logger.log(format!("  Queries per user: {}", per_user));
        logger.log(format!("  Total queries: {}", queries.len()));
        logger.log(format!("  Model: {}", config.model_target));
        logger.log(format!("  RAG: {}", if config.use_rag { "yes" } else { "no" }));

        let hardware_info = self.metrics.hardware_info().await;
        logger.log(format!("  CPU: {}", hardware_info.cpu_model));
        logger.log(format!("  GPU: {}", hardware_info.gpu_model));
        logger.log(format!("  RAM: {} GB", hardware_info.ram_total_gb));

        let started_at = Utc::now();
        let started = Instant::now();

        let ctx = QueryContext {
            service: self.service.clone(),
            counters: self.counters.clone(),
            stop: self.stop.clone(),
            logger: logger.clone(),
            started,
            deadline: config.max_duration(),
            query_timeout: config.query_timeout(),
            test_id: Arc::from(self.test_id.as_str()),
            model: Arc::from(config.model_target.as_str()),
            use_rag: config.use_rag,
            total_queries: queries.len(),
            fault: Arc::new(OnceCell::new()),
        };

        let sampler = SnapshotSampler::new(
            self.metrics.clone(),
            self.counters.clone(),
            self.stop.clone(),
            config.snapshot_interval(),
            config.max_duration(),
        )
        .with_callback(on_snapshot);

        let generator = async {
            let outcome = match config.ramp_up() {
                Some(ramp_up) => run_with_ramp_up(&queries, users, ramp_up, &ctx).await,
                None => run_concurrent(&queries, users, per_user, &ctx).await,
            };
            let stopped_externally = self.stop.is_stopped();
            self.stop.stop();
            (outcome, stopped_externally)
        };

        let ((outcome, stopped_externally), snapshots) =
            tokio::join!(generator, sampler.run(started));

        let duration = started.elapsed();
        let fault = ctx.fault.get().cloned();
        let (status, run_error) = match (outcome, fault) {
            (_, Some(reason)) => {
                logger.log(format!("ERROR: {}", reason));
                (TestStatus::Failed, Some(reason))
            }
            (Err(e), None) => {
                error!("❌ Stress test {} aborted: {:#}", self.test_id, e);
                logger.log(format!("ERROR: {:#}", e));
                (TestStatus::Failed, Some(e.to_string()))
            }
            (Ok(()), None) if stopped_externally => (TestStatus::Stopped, None),
            (Ok(()), None) => (TestStatus::Completed, None),
        };

        let counters = self.counters.snapshot().await;
        let summary = compute_summary(&counters, &snapshots, duration);

        logger.log(format!(
            "✅ Test {} in {:.2} seconds",
            status,
            duration.as_secs_f64()
        ));
        logger.log(format!("  Successful queries: {}", summary.successful_queries));
        logger.log(format!("  Failed queries: {}", summary.failed_queries));

        TestResult {
            test_id: self.test_id,
            name: self.name,
            status,
            started_at,
            completed_at: Utc::now(),
            duration_seconds: (duration.as_secs_f64() * 100.0).round() / 100.0,
            config: self.config,
            hardware_info,
            summary,
            snapshots,
            outcomes: counters.outcomes,
            error: run_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_counts_characters() {
        assert_eq!(excerpt("Hola, como estas?", 4), "Hola");
        assert_eq!(excerpt("añb", 2), "añ");
        assert_eq!(excerpt("ab", 10), "ab");
    }

    #[test]
    fn test_panic_message_reads_common_payloads() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        let formatted: Box<dyn Any + Send> = Box::new(format!("code {}", 7));
        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(literal.as_ref()), "boom");
        assert_eq!(panic_message(formatted.as_ref()), "code 7");
        assert_eq!(panic_message(other.as_ref()), "query task panicked");
    }

    #[test]
    fn test_logger_stamps_callback_lines() {
        let lines = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = lines.clone();
        let logger = RunLogger::new(Some(Arc::new(move |line: &str| {
            sink.lock().unwrap().push(line.to_string());
        })));
        logger.log("hello");

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] hello"));
        assert_eq!(lines[0].len(), "[00:00:00] hello".len());
    }
}
