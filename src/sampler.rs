use crate::metrics::MetricsSource;
use crate::signal::StopSignal;
use crate::stats::SharedCounters;
use crate::types::{MetricsSnapshot, ResourceReading};
use chrono::Utc;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Receives every snapshot as soon as it is taken. Must return quickly.
pub type SnapshotCallback = Arc<dyn Fn(&MetricsSnapshot) + Send + Sync>;

/// Periodic sampler running beside the load generator.
pub struct SnapshotSampler {
    source: Arc<dyn MetricsSource>,
    counters: SharedCounters,
    stop: StopSignal,
    interval: Duration,
    max_duration: Option<Duration>,
    on_snapshot: Option<SnapshotCallback>,
}

impl SnapshotSampler {
    pub fn new(
        source: Arc<dyn MetricsSource>,
        counters: SharedCounters,
        stop: StopSignal,
        interval: Duration,
        max_duration: Option<Duration>,
    ) -> Self {
        Self {
            source,
            counters,
            stop,
            interval,
            max_duration,
            on_snapshot: None,
        }
    }

    pub fn with_callback(mut self, on_snapshot: Option<SnapshotCallback>) -> Self {
        self.on_snapshot = on_snapshot;
        self
    }

    /// Samples until the stop flag is set or `max_duration` has passed.
    /// The returned series is ordered by elapsed time.
    pub async fn run(self, started: Instant) -> Vec<MetricsSnapshot> {
        let mut snapshots = Vec::new();

        while !self.stop.is_stopped() {
            let elapsed = started.elapsed();
            if matches!(self.max_duration, Some(max) if elapsed > max) {
                debug!("Sampler reached max duration after {:.2}s", elapsed.as_secs_f64());
                break;
            }

            let performance = self.counters.view(elapsed).await;
            let ResourceReading { system, gpu } = self.source.sample().await;

            let snapshot = MetricsSnapshot {
                timestamp: Utc::now(),
                elapsed_seconds: (elapsed.as_secs_f64() * 100.0).round() / 100.0,
                system,
                gpu,
                performance,
            };

            if let Some(on_snapshot) = &self.on_snapshot {
                on_snapshot(&snapshot);
            }
            snapshots.push(snapshot);

            if !self.stop.sleep(self.interval).await {
                break;
            }
        }

        snapshots
    }
}
