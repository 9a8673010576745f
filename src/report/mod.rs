//! Rendering of finished stress tests.
//!
//! Every encoding is a pure function of a [`TestResult`]; nothing here does
//! I/O. Timestamps shown in reports come from the result itself, so the same
//! result always renders to the same output.

pub mod spreadsheet;
pub mod tabular;
pub mod text;

use crate::error::ReportError;
use crate::summary::round_to;
use crate::types::{MetricsSnapshot, TestResult};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;

/// Shown wherever a value is missing or unavailable.
pub const PLACEHOLDER: &str = "N/A";

pub const REPORT_TITLE: &str = "STRESS TEST REPORT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Text,
    Json,
    Xlsx,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 4] = [
        ReportFormat::Csv,
        ReportFormat::Text,
        ReportFormat::Json,
        ReportFormat::Xlsx,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "text/csv",
            ReportFormat::Text => "text/plain",
            ReportFormat::Json => "application/json",
            ReportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "txt" | "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "xlsx" | "excel" => Ok(ReportFormat::Xlsx),
            other => Err(format!("unknown report format: {}", other)),
        }
    }
}

/// Renders `result` in the requested encoding.
pub fn format_report(result: &TestResult, format: ReportFormat) -> Result<Vec<u8>, ReportError> {
    match format {
        ReportFormat::Csv => tabular::render(result).map(String::into_bytes),
        ReportFormat::Text => Ok(text::render(result).into_bytes()),
        ReportFormat::Json => render_json(result).map(String::into_bytes),
        ReportFormat::Xlsx => spreadsheet::render(result),
    }
}

pub fn render_json(result: &TestResult) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// One value in a tabular report.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Integer(u64),
}

impl Cell {
    /// Numbers are shown with at most two decimals.
    pub fn display(&self) -> String {
        match self {
            Cell::Text(text) if text.is_empty() => PLACEHOLDER.to_string(),
            Cell::Text(text) => text.clone(),
            Cell::Number(value) if value.is_finite() => round_to(*value, 2).to_string(),
            Cell::Number(_) => PLACEHOLDER.to_string(),
            Cell::Integer(value) => value.to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Cell::Integer(value as u64)
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::Integer(value)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Integer(value as u64)
    }
}

/// A titled two-column block of label/value rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: &'static str,
    pub columns: [&'static str; 2],
    pub rows: Vec<(String, Cell)>,
}

impl Section {
    fn new(title: &'static str, columns: [&'static str; 2]) -> Self {
        Self {
            title,
            columns,
            rows: Vec::new(),
        }
    }

    fn row(mut self, label: impl Into<String>, value: impl Into<Cell>) -> Self {
        self.rows.push((label.into(), value.into()));
        self
    }
}

pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

pub fn test_info_section(result: &TestResult) -> Section {
    Section::new("TEST INFORMATION", ["Field", "Value"])
        .row("Test ID", result.test_id.as_str())
        .row("Name", result.name.as_deref().unwrap_or(PLACEHOLDER))
        .row("Status", result.status.as_str())
        .row("Duration (s)", result.duration_seconds)
        .row("Started", timestamp(&result.started_at))
        .row("Finished", timestamp(&result.completed_at))
        .row("Error", result.error.as_deref().unwrap_or(PLACEHOLDER))
}

pub fn config_section(result: &TestResult) -> Section {
    let config = &result.config;
    let max_duration = match config.max_duration_seconds {
        0 => "unbounded".to_string(),
        secs => secs.to_string(),
    };
    Section::new("CONFIGURATION", ["Parameter", "Value"])
        .row("Concurrent Users", config.concurrent_users)
        .row("Queries per User", config.queries_per_user)
        .row("Max Duration (s)", max_duration)
        .row("Ramp-up (s)", config.ramp_up_seconds)
        .row("Query Complexity", config.complexity.as_str())
        .row("Target Model", config.model_target.as_str())
        .row("Use RAG", yes_no(config.use_rag))
        .row("Snapshot Interval (s)", config.snapshot_interval_seconds)
        .row("Custom Queries", config.custom_queries.len())
}

pub fn hardware_section(result: &TestResult) -> Section {
    let hardware = &result.hardware_info;
    Section::new("HARDWARE", ["Component", "Value"])
        .row("CPU", hardware.cpu_model.as_str())
        .row("Cores", hardware.cpu_cores)
        .row("Threads", hardware.cpu_threads)
        .row("GPU", hardware.gpu_model.as_str())
        .row("VRAM (GB)", hardware.gpu_vram_gb)
        .row("RAM Total (GB)", hardware.ram_total_gb)
        .row("OS", hardware.os.as_str())
}

pub fn results_section(result: &TestResult) -> Section {
    let summary = &result.summary;
    Section::new("RESULTS SUMMARY", ["Metric", "Value"])
        .row("Total Queries", summary.total_queries)
        .row("Successful Queries", summary.successful_queries)
        .row("Failed Queries", summary.failed_queries)
        .row("Success Rate (%)", summary.success_rate)
}

pub fn timing_section(result: &TestResult) -> Section {
    let timing = &result.summary.timing;
    Section::new("RESPONSE TIMES", ["Metric", "Value (ms)"])
        .row("Average Latency", timing.avg_latency_ms)
        .row("Minimum Latency", timing.min_latency_ms)
        .row("Maximum Latency", timing.max_latency_ms)
        .row("Percentile 50 (Median)", timing.p50_latency_ms)
        .row("Percentile 95", timing.p95_latency_ms)
        .row("Percentile 99", timing.p99_latency_ms)
}

pub fn peak_section(result: &TestResult) -> Section {
    let peak = &result.summary.resources_peak;
    Section::new("RESOURCES (PEAK)", ["Resource", "Value"])
        .row("CPU Max (%)", peak.cpu_max_percent)
        .row("RAM Max (%)", peak.ram_max_percent)
        .row("RAM Max (MB)", peak.ram_max_mb)
        .row("GPU Max (%)", peak.gpu_max_percent)
        .row("VRAM Max (MB)", peak.vram_max_mb)
        .row("Temperature Max (C)", peak.temperature_max_c)
}

pub fn average_section(result: &TestResult) -> Section {
    let avg = &result.summary.resources_avg;
    Section::new("RESOURCES (AVERAGE)", ["Resource", "Value"])
        .row("CPU Average (%)", avg.cpu_avg_percent)
        .row("RAM Average (%)", avg.ram_avg_percent)
        .row("GPU Average (%)", avg.gpu_avg_percent)
        .row("Temperature Average (C)", avg.temperature_avg_c)
}

pub fn throughput_section(result: &TestResult) -> Section {
    let throughput = &result.summary.throughput;
    Section::new("THROUGHPUT", ["Metric", "Value"])
        .row("Queries per Second", throughput.queries_per_second)
        .row("Queries per Minute", throughput.queries_per_minute)
}

pub fn error_section(result: &TestResult) -> Section {
    result
        .summary
        .error_distribution
        .iter()
        .fold(Section::new("ERRORS", ["Error", "Count"]), |section, (error, count)| {
            section.row(error.as_str(), *count)
        })
}

pub const TIME_SERIES_TITLE: &str = "METRICS TIME SERIES";

pub const TIME_SERIES_HEADERS: [&str; 12] = [
    "Time (s)",
    "CPU (%)",
    "RAM (%)",
    "RAM (MB)",
    "GPU (%)",
    "VRAM (MB)",
    "Temp (C)",
    "Active Queries",
    "Completed Queries",
    "Failed Queries",
    "Avg Latency (ms)",
    "Throughput (QPS)",
];

pub fn time_series_row(snapshot: &MetricsSnapshot) -> [Cell; 12] {
    let system = &snapshot.system;
    let gpu = &snapshot.gpu;
    let perf = &snapshot.performance;
    [
        Cell::Number(snapshot.elapsed_seconds),
        Cell::Number(system.cpu_percent),
        Cell::Number(system.ram_percent),
        Cell::Number(system.ram_used_mb),
        Cell::Number(gpu.gpu_percent),
        Cell::Number(gpu.vram_used_mb),
        Cell::Number(gpu.temperature_c),
        Cell::from(perf.active_queries),
        Cell::from(perf.completed_queries),
        Cell::from(perf.failed_queries),
        Cell::Number(round_to(perf.avg_latency_ms, 2)),
        Cell::Number(round_to(perf.throughput_qps, 3)),
    ]
}
