//! Concurrent stress testing of a conversational query service, with
//! system/GPU telemetry sampling and multi-format reports.

pub mod config;
pub mod error;
pub mod load_test;
pub mod metrics;
pub mod queries;
pub mod report;
pub mod sampler;
pub mod service;
pub mod signal;
pub mod stats;
pub mod summary;
pub mod types;
pub mod worker;

pub use config::WorkerConfig;
pub use error::{ConfigError, ReportError};
pub use load_test::{LogCallback, StressTestRunner, TestRun};
pub use metrics::{MetricsSource, SystemMetricsSource};
pub use report::{format_report, ReportFormat};
pub use sampler::SnapshotCallback;
pub use service::{HttpQueryService, QueryService};
pub use signal::StopSignal;
pub use types::{TestConfiguration, TestResult, TestStatus};
