#![allow(dead_code)]

use async_trait::async_trait;
use loadmaster_stress::metrics::MetricsSource;
use loadmaster_stress::service::{QueryAnswer, QueryError, QueryRequest, QueryService};
use loadmaster_stress::types::{
    GpuReading, HardwareInfo, QueryComplexity, ResourceReading, SystemReading,
    TestConfiguration, GPU_NOT_DETECTED,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// A submitted query as seen by the mock service.
#[derive(Debug, Clone)]
pub struct Call {
    pub user_id: String,
    pub text: String,
    pub at: Duration,
}

/// Answers after a fixed delay, optionally failing every call.
pub struct MockService {
    delay: Duration,
    failure: Option<QueryError>,
    origin: Instant,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

impl MockService {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            failure: None,
            origin: Instant::now(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(delay: Duration, error: QueryError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(delay)
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryService for MockService {
    async fn submit(&self, request: &QueryRequest) -> Result<QueryAnswer, QueryError> {
        self.calls.lock().unwrap().push(Call {
            user_id: request.user_id.clone(),
            text: request.text.clone(),
            at: self.origin.elapsed(),
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(QueryAnswer {
                text: format!("answer to {}", request.text),
            }),
        }
    }
}

/// Constant telemetry of a machine without a GPU.
pub struct StaticMetrics;

#[async_trait]
impl MetricsSource for StaticMetrics {
    async fn hardware_info(&self) -> HardwareInfo {
        HardwareInfo {
            cpu_model: "Test CPU".to_string(),
            cpu_cores: 4,
            cpu_threads: 8,
            ram_total_gb: 16.0,
            os: "TestOS 1.0".to_string(),
            gpu_model: GPU_NOT_DETECTED.to_string(),
            gpu_vram_gb: 0.0,
        }
    }

    async fn sample(&self) -> ResourceReading {
        ResourceReading {
            system: SystemReading {
                cpu_percent: 42.0,
                cpu_freq_mhz: 3000,
                ram_percent: 50.0,
                ram_used_mb: 8192.0,
                ram_available_mb: 8192.0,
            },
            gpu: GpuReading::default(),
        }
    }
}

pub fn config(users: u32, per_user: u32, complexity: QueryComplexity) -> TestConfiguration {
    TestConfiguration {
        concurrent_users: users,
        queries_per_user: per_user,
        complexity,
        snapshot_interval_seconds: 1.0,
        ..Default::default()
    }
}

/// Breaks down mid-call on every query.
pub struct PanickingService {
    delay: Duration,
    calls: AtomicUsize,
}

impl PanickingService {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryService for PanickingService {
    async fn submit(&self, _request: &QueryRequest) -> Result<QueryAnswer, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        panic!("model backend crashed");
    }
}
