use crate::types::{PerformanceView, QueryOutcome};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Counters mutated by every in-flight query.
///
/// `active + completed + failed` never exceeds the planned query count and
/// `active` never underflows: a query is only finished after it was begun.
#[derive(Debug, Clone, Default)]
pub struct LiveCounters {
    pub active_queries: u32,
    pub completed_queries: u32,
    pub failed_queries: u32,
    /// Every observed latency, successful or not, in completion order.
    pub latencies_ms: Vec<f64>,
    pub errors: BTreeMap<String, u32>,
    pub outcomes: Vec<QueryOutcome>,
}

impl LiveCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_finished(&self) -> u32 {
        self.completed_queries + self.failed_queries
    }

    pub fn average_latency(&self) -> f64 {
        if self.latencies_ms.is_empty() {
            0.0
        } else {
            self.latencies_ms.iter().sum::<f64>() / self.latencies_ms.len() as f64
        }
    }

    /// Completed queries per second of elapsed test time.
    pub fn throughput(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            self.completed_queries as f64 / secs
        } else {
            0.0
        }
    }

    pub fn view(&self, elapsed: Duration) -> PerformanceView {
        PerformanceView {
            active_queries: self.active_queries,
            completed_queries: self.completed_queries,
            failed_queries: self.failed_queries,
            avg_latency_ms: self.average_latency(),
            throughput_qps: self.throughput(elapsed),
        }
    }

    fn begin(&mut self) {
        self.active_queries += 1;
    }

    fn finish(&mut self, outcome: QueryOutcome) {
        self.active_queries = self.active_queries.saturating_sub(1);
        if outcome.success {
            self.completed_queries += 1;
        } else {
            self.failed_queries += 1;
            let error = outcome
                .error
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string());
            *self.errors.entry(error).or_insert(0) += 1;
        }
        self.latencies_ms.push(outcome.latency_ms);
        self.outcomes.push(outcome);
    }
}

/// Counts observed right after a query finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub active: u32,
    pub completed: u32,
    pub failed: u32,
}

impl Progress {
    pub fn finished(&self) -> u32 {
        self.completed + self.failed
    }
}

/// Lock-guarded handle to the live counters of one run.
///
/// Every mutation is a single read-modify-write under the lock, and readers
/// only ever receive whole copies, never a guard held across an await.
#[derive(Debug, Clone, Default)]
pub struct SharedCounters {
    inner: Arc<Mutex<LiveCounters>>,
}

impl SharedCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin_query(&self) {
        self.inner.lock().await.begin();
    }

    pub async fn finish_query(&self, outcome: QueryOutcome) -> Progress {
        let mut counters = self.inner.lock().await;
        counters.finish(outcome);
        Progress {
            active: counters.active_queries,
            completed: counters.completed_queries,
            failed: counters.failed_queries,
        }
    }

    pub async fn view(&self, elapsed: Duration) -> PerformanceView {
        self.inner.lock().await.view(elapsed)
    }

    pub async fn snapshot(&self) -> LiveCounters {
        self.inner.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn outcome(latency_ms: f64, error: Option<&str>) -> QueryOutcome {
        QueryOutcome {
            user_index: 0,
            query: "q".to_string(),
            started_at: Utc::now(),
            latency_ms,
            success: error.is_none(),
            error: error.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_begin_and_finish_balance_active_count() {
        let counters = SharedCounters::new();
        counters.begin_query().await;
        counters.begin_query().await;
        assert_eq!(counters.snapshot().await.active_queries, 2);

        let progress = counters.finish_query(outcome(100.0, None)).await;
        assert_eq!(progress.active, 1);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.finished(), 1);

        counters.finish_query(outcome(300.0, Some("HTTP 500"))).await;
        let done = counters.snapshot().await;
        assert_eq!(done.active_queries, 0);
        assert_eq!(done.completed_queries, 1);
        assert_eq!(done.failed_queries, 1);
        assert_eq!(done.latencies_ms, vec![100.0, 300.0]);
        assert_eq!(done.errors.get("HTTP 500"), Some(&1));
        assert_eq!(done.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_view_derives_average_and_throughput() {
        let counters = SharedCounters::new();
        for latency in [100.0, 200.0, 300.0] {
            counters.begin_query().await;
            counters.finish_query(outcome(latency, None)).await;
        }
        let view = counters.view(Duration::from_secs(2)).await;
        assert_eq!(view.completed_queries, 3);
        assert_eq!(view.avg_latency_ms, 200.0);
        assert_eq!(view.throughput_qps, 1.5);
    }

    #[test]
    fn test_empty_counters_view_is_zero() {
        let view = LiveCounters::new().view(Duration::ZERO);
        assert_eq!(view, PerformanceView::default());
    }
}
