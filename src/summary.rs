use crate::stats::LiveCounters;
use crate::types::{
    MetricsSnapshot, ResourceAverages, ResourcePeaks, TestSummary, Throughput, TimingStats,
};
use std::time::Duration;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Median of an ascending slice; the two middle values are averaged for even
/// lengths.
pub fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => sorted[n / 2],
        _ => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    }
}

/// Nearest-rank percentile of an ascending slice, no interpolation:
/// `sorted[floor(n * p / 100)]`, clamped to the last index.
pub fn percentile(sorted: &[f64], percent: u32) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = sorted.len() * percent as usize / 100;
    sorted[index.min(sorted.len() - 1)]
}

pub fn timing_stats(latencies_ms: &[f64], duration: Duration) -> TimingStats {
    let total_duration_seconds = round_to(duration.as_secs_f64(), 2);
    if latencies_ms.is_empty() {
        return TimingStats {
            total_duration_seconds,
            ..Default::default()
        };
    }

    let mut sorted = latencies_ms.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    TimingStats {
        total_duration_seconds,
        avg_latency_ms: round_to(mean(&sorted), 2),
        min_latency_ms: round_to(sorted[0], 2),
        max_latency_ms: round_to(sorted[sorted.len() - 1], 2),
        p50_latency_ms: round_to(median(&sorted), 2),
        p95_latency_ms: round_to(percentile(&sorted, 95), 2),
        p99_latency_ms: round_to(percentile(&sorted, 99), 2),
    }
}

/// Peaks and averages over the snapshot series. A temperature of 0 means no
/// sensor and is left out of the average, not out of the peak.
pub fn resource_stats(snapshots: &[MetricsSnapshot]) -> (ResourcePeaks, ResourceAverages) {
    let mut peak = ResourcePeaks::default();
    let mut cpu = Vec::with_capacity(snapshots.len());
    let mut ram = Vec::with_capacity(snapshots.len());
    let mut gpu = Vec::with_capacity(snapshots.len());
    let mut temperature = Vec::new();

    for snapshot in snapshots {
        let system = &snapshot.system;
        let card = &snapshot.gpu;

        cpu.push(system.cpu_percent);
        ram.push(system.ram_percent);
        gpu.push(card.gpu_percent);
        if card.temperature_c > 0.0 {
            temperature.push(card.temperature_c);
        }

        peak.cpu_max_percent = peak.cpu_max_percent.max(system.cpu_percent);
        peak.ram_max_percent = peak.ram_max_percent.max(system.ram_percent);
        peak.ram_max_mb = peak.ram_max_mb.max(system.ram_used_mb);
        peak.gpu_max_percent = peak.gpu_max_percent.max(card.gpu_percent);
        peak.vram_max_mb = peak.vram_max_mb.max(card.vram_used_mb);
        peak.temperature_max_c = peak.temperature_max_c.max(card.temperature_c);
    }

    let avg = ResourceAverages {
        cpu_avg_percent: round_to(mean(&cpu), 1),
        ram_avg_percent: round_to(mean(&ram), 1),
        gpu_avg_percent: round_to(mean(&gpu), 1),
        temperature_avg_c: round_to(mean(&temperature), 1),
    };

    (peak, avg)
}

pub fn throughput(successful: u32, duration: Duration) -> Throughput {
    let secs = duration.as_secs_f64();
    if secs <= 0.0 {
        return Throughput::default();
    }
    let qps = successful as f64 / secs;
    Throughput {
        queries_per_second: round_to(qps, 2),
        queries_per_minute: round_to(qps * 60.0, 2),
    }
}

pub fn success_rate(successful: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        round_to(successful as f64 / total as f64 * 100.0, 1)
    }
}

/// Derives the summary of a finished run. Pure and deterministic.
pub fn compute_summary(
    counters: &LiveCounters,
    snapshots: &[MetricsSnapshot],
    duration: Duration,
) -> TestSummary {
    let successful = counters.completed_queries;
    let failed = counters.failed_queries;
    let total = successful + failed;
    let (resources_peak, resources_avg) = resource_stats(snapshots);

    TestSummary {
        total_queries: total,
        successful_queries: successful,
        failed_queries: failed,
        success_rate: success_rate(successful, total),
        timing: timing_stats(&counters.latencies_ms, duration),
        resources_peak,
        resources_avg,
        throughput: throughput(successful, duration),
        error_distribution: counters.errors.clone(),
    }
}
