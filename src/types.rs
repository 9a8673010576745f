use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Hardware label used when no GPU could be identified.
pub const GPU_NOT_DETECTED: &str = "not detected";

/// Per-query timeout used when the test has no max duration.
pub const UNBOUNDED_QUERY_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryComplexity {
    Simple,
    #[default]
    Medium,
    Complex,
    Mixed,
    Custom,
}

impl QueryComplexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryComplexity::Simple => "simple",
            QueryComplexity::Medium => "medium",
            QueryComplexity::Complex => "complex",
            QueryComplexity::Mixed => "mixed",
            QueryComplexity::Custom => "custom",
        }
    }
}

impl fmt::Display for QueryComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_concurrent_users() -> u32 {
    5
}

fn default_queries_per_user() -> u32 {
    5
}

fn default_max_duration() -> u64 {
    120
}

fn default_model() -> String {
    "phi4".to_string()
}

fn default_use_rag() -> bool {
    true
}

fn default_snapshot_interval() -> f64 {
    5.0
}

/// Immutable description of one stress test.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TestConfiguration {
    #[serde(rename = "concurrentUsers", default = "default_concurrent_users")]
    pub concurrent_users: u32,
    #[serde(rename = "queriesPerUser", default = "default_queries_per_user")]
    pub queries_per_user: u32,
    /// 0 means the test is not bounded by time.
    #[serde(rename = "durationSeconds", default = "default_max_duration")]
    pub max_duration_seconds: u64,
    /// 0 means every user starts at once.
    #[serde(rename = "rampUpSeconds", default)]
    pub ramp_up_seconds: u64,
    #[serde(rename = "queryComplexity", default)]
    pub complexity: QueryComplexity,
    #[serde(rename = "modelTarget", default = "default_model")]
    pub model_target: String,
    #[serde(rename = "useRag", default = "default_use_rag")]
    pub use_rag: bool,
    #[serde(rename = "snapshotIntervalSeconds", default = "default_snapshot_interval")]
    pub snapshot_interval_seconds: f64,
    /// Overrides complexity-based sampling when non-empty.
    #[serde(rename = "customQueries", default)]
    pub custom_queries: Vec<String>,
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            concurrent_users: default_concurrent_users(),
            queries_per_user: default_queries_per_user(),
            max_duration_seconds: default_max_duration(),
            ramp_up_seconds: 0,
            complexity: QueryComplexity::default(),
            model_target: default_model(),
            use_rag: default_use_rag(),
            snapshot_interval_seconds: default_snapshot_interval(),
            custom_queries: Vec::new(),
        }
    }
}

impl TestConfiguration {
    pub fn total_queries(&self) -> usize {
        self.concurrent_users as usize * self.queries_per_user as usize
    }

    pub fn max_duration(&self) -> Option<Duration> {
        match self.max_duration_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn ramp_up(&self) -> Option<Duration> {
        match self.ramp_up_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Falls back to the default interval for values `validate` rejects.
    pub fn snapshot_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.snapshot_interval_seconds)
            .ok()
            .filter(|interval| !interval.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(default_snapshot_interval()))
    }

    /// Slow hardware may need the whole test window to answer a single query.
    pub fn query_timeout(&self) -> Duration {
        self.max_duration().unwrap_or(UNBOUNDED_QUERY_TIMEOUT)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrent_users == 0 {
            return Err(ConfigError::NoUsers);
        }
        if self.queries_per_user == 0 {
            return Err(ConfigError::NoQueries);
        }
        // Must be a non-zero interval that fits in a `Duration`.
        match Duration::try_from_secs_f64(self.snapshot_interval_seconds) {
            Ok(interval) if !interval.is_zero() => {}
            _ => {
                return Err(ConfigError::InvalidSnapshotInterval(
                    self.snapshot_interval_seconds,
                ))
            }
        }
        if self.complexity == QueryComplexity::Custom && self.custom_queries.is_empty() {
            return Err(ConfigError::EmptyCustomQueries);
        }
        Ok(())
    }
}

/// Stress test request as consumed from the queue.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StressTestMessage {
    #[serde(rename = "testId")]
    pub test_id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub config: TestConfiguration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Stop,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlMessage {
    #[serde(rename = "testId")]
    pub test_id: String,
    pub action: ControlAction,
}

/// Outcome of one query attempt. Recorded exactly once.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueryOutcome {
    #[serde(rename = "userIndex")]
    pub user_index: usize,
    pub query: String,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "latencyMs")]
    pub latency_ms: f64,
    pub success: bool,
    /// Present iff `success` is false.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemReading {
    pub cpu_percent: f64,
    pub cpu_freq_mhz: u64,
    pub ram_percent: f64,
    pub ram_used_mb: f64,
    pub ram_available_mb: f64,
}

/// GPU telemetry. All zero when no GPU is available.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuReading {
    pub gpu_percent: f64,
    pub vram_used_mb: f64,
    pub vram_total_mb: f64,
    pub temperature_c: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct ResourceReading {
    pub system: SystemReading,
    pub gpu: GpuReading,
}

/// Derived view of the live counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceView {
    pub active_queries: u32,
    pub completed_queries: u32,
    pub failed_queries: u32,
    pub avg_latency_ms: f64,
    pub throughput_qps: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "elapsedSeconds")]
    pub elapsed_seconds: f64,
    pub system: SystemReading,
    pub gpu: GpuReading,
    pub performance: PerformanceView,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareInfo {
    pub cpu_model: String,
    pub cpu_cores: usize,
    pub cpu_threads: usize,
    pub ram_total_gb: f64,
    pub os: String,
    pub gpu_model: String,
    pub gpu_vram_gb: f64,
}

impl HardwareInfo {
    pub fn has_gpu(&self) -> bool {
        self.gpu_model != GPU_NOT_DETECTED
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingStats {
    pub total_duration_seconds: f64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePeaks {
    pub cpu_max_percent: f64,
    pub ram_max_percent: f64,
    pub ram_max_mb: f64,
    pub gpu_max_percent: f64,
    pub vram_max_mb: f64,
    pub temperature_max_c: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAverages {
    pub cpu_avg_percent: f64,
    pub ram_avg_percent: f64,
    pub gpu_avg_percent: f64,
    pub temperature_avg_c: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Throughput {
    pub queries_per_second: f64,
    pub queries_per_minute: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub total_queries: u32,
    pub successful_queries: u32,
    pub failed_queries: u32,
    pub success_rate: f64,
    pub timing: TimingStats,
    pub resources_peak: ResourcePeaks,
    pub resources_avg: ResourceAverages,
    pub throughput: Throughput,
    pub error_distribution: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Completed,
    Stopped,
    Failed,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Completed => "completed",
            TestStatus::Stopped => "stopped",
            TestStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal aggregate of a stress test. Assembled once, after the load
/// generator and the sampler have both stopped.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TestResult {
    #[serde(rename = "testId")]
    pub test_id: String,
    pub name: Option<String>,
    pub status: TestStatus,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "completedAt")]
    pub completed_at: DateTime<Utc>,
    #[serde(rename = "durationSeconds")]
    pub duration_seconds: f64,
    pub config: TestConfiguration,
    #[serde(rename = "hardwareInfo")]
    pub hardware_info: HardwareInfo,
    pub summary: TestSummary,
    #[serde(rename = "metricsSnapshots")]
    pub snapshots: Vec<MetricsSnapshot>,
    pub outcomes: Vec<QueryOutcome>,
    /// Orchestration error that ended the run early, if any.
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotMessage<'a> {
    #[serde(rename = "testId")]
    pub test_id: &'a str,
    pub snapshot: &'a MetricsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct LogMessage<'a> {
    #[serde(rename = "testId")]
    pub test_id: &'a str,
    pub line: &'a str,
}
