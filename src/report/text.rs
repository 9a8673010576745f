use super::{timestamp, yes_no, PLACEHOLDER, REPORT_TITLE};
use crate::types::TestResult;

const WIDTH: usize = 60;
const RULE: usize = 40;

fn heading(lines: &mut Vec<String>, title: &str) {
    lines.push("-".repeat(RULE));
    lines.push(title.to_string());
    lines.push("-".repeat(RULE));
}

/// Plain-text narrative report.
pub fn render(result: &TestResult) -> String {
    let mut lines = Vec::new();
    let separator = "=".repeat(WIDTH);
    let config = &result.config;
    let hardware = &result.hardware_info;
    let summary = &result.summary;
    let timing = &summary.timing;
    let peak = &summary.resources_peak;
    let avg = &summary.resources_avg;
    let throughput = &summary.throughput;

    lines.push(separator.clone());
    lines.push(REPORT_TITLE.to_string());
    lines.push(separator.clone());
    lines.push(format!(
        "Generated: {} UTC",
        result.completed_at.format("%Y-%m-%d %H:%M:%S")
    ));
    lines.push(String::new());

    heading(&mut lines, "TEST INFORMATION");
    lines.push(format!("  Test ID:  {}", result.test_id));
    lines.push(format!(
        "  Name:     {}",
        result.name.as_deref().unwrap_or(PLACEHOLDER)
    ));
    lines.push(format!("  Status:   {}", result.status));
    lines.push(format!("  Duration: {:.2} seconds", result.duration_seconds));
    lines.push(format!("  Started:  {}", timestamp(&result.started_at)));
    lines.push(format!("  Finished: {}", timestamp(&result.completed_at)));
    if let Some(error) = &result.error {
        lines.push(format!("  Error:    {}", error));
    }
    lines.push(String::new());

    heading(&mut lines, "TEST CONFIGURATION");
    lines.push(format!("  Concurrent Users:  {}", config.concurrent_users));
    lines.push(format!("  Queries per User:  {}", config.queries_per_user));
    match config.max_duration_seconds {
        0 => lines.push("  Max Duration:      unbounded".to_string()),
        secs => lines.push(format!("  Max Duration:      {} s", secs)),
    }
    lines.push(format!("  Ramp-up:           {} s", config.ramp_up_seconds));
    lines.push(format!("  Query Complexity:  {}", config.complexity));
    lines.push(format!("  Target Model:      {}", config.model_target));
    lines.push(format!("  Use RAG:           {}", yes_no(config.use_rag)));
    lines.push(String::new());

    heading(&mut lines, "SYSTEM HARDWARE");
    lines.push(format!("  CPU:        {}", hardware.cpu_model));
    lines.push(format!(
        "  Cores:      {} ({} threads)",
        hardware.cpu_cores, hardware.cpu_threads
    ));
    lines.push(format!("  GPU:        {}", hardware.gpu_model));
    if hardware.has_gpu() {
        lines.push(format!("  VRAM:       {:.2} GB", hardware.gpu_vram_gb));
    } else {
        lines.push(format!("  VRAM:       {}", PLACEHOLDER));
    }
    lines.push(format!("  RAM Total:  {:.2} GB", hardware.ram_total_gb));
    lines.push(format!("  OS:         {}", hardware.os));
    lines.push(String::new());

    heading(&mut lines, "RESULTS SUMMARY");
    lines.push(format!("  Total Queries:       {}", summary.total_queries));
    lines.push(format!("  Successful Queries:  {}", summary.successful_queries));
    lines.push(format!("  Failed Queries:      {}", summary.failed_queries));
    lines.push(format!("  Success Rate:        {:.1}%", summary.success_rate));
    lines.push(String::new());

    heading(&mut lines, "RESPONSE TIMES");
    lines.push(format!("  Average Latency: {:.2} ms", timing.avg_latency_ms));
    lines.push(format!("  Minimum Latency: {:.2} ms", timing.min_latency_ms));
    lines.push(format!("  Maximum Latency: {:.2} ms", timing.max_latency_ms));
    lines.push(format!("  Percentile 50:   {:.2} ms", timing.p50_latency_ms));
    lines.push(format!("  Percentile 95:   {:.2} ms", timing.p95_latency_ms));
    lines.push(format!("  Percentile 99:   {:.2} ms", timing.p99_latency_ms));
    lines.push(String::new());

    heading(&mut lines, "RESOURCES - PEAK");
    lines.push(format!("  CPU Max:          {:.1}%", peak.cpu_max_percent));
    lines.push(format!(
        "  RAM Max:          {:.1}% ({:.0} MB)",
        peak.ram_max_percent, peak.ram_max_mb
    ));
    lines.push(format!("  GPU Max:          {:.1}%", peak.gpu_max_percent));
    lines.push(format!("  VRAM Max:         {:.0} MB", peak.vram_max_mb));
    lines.push(format!("  Temperature Max:  {:.0} C", peak.temperature_max_c));
    lines.push(String::new());

    heading(&mut lines, "RESOURCES - AVERAGE");
    lines.push(format!("  CPU Average:          {:.1}%", avg.cpu_avg_percent));
    lines.push(format!("  RAM Average:          {:.1}%", avg.ram_avg_percent));
    lines.push(format!("  GPU Average:          {:.1}%", avg.gpu_avg_percent));
    lines.push(format!("  Temperature Average:  {:.0} C", avg.temperature_avg_c));
    lines.push(String::new());

    heading(&mut lines, "THROUGHPUT");
    lines.push(format!("  Queries per Second: {:.2}", throughput.queries_per_second));
    lines.push(format!("  Queries per Minute: {:.2}", throughput.queries_per_minute));
    lines.push(String::new());

    if !summary.error_distribution.is_empty() {
        heading(&mut lines, "ERRORS");
        for (error, count) in &summary.error_distribution {
            lines.push(format!("  {:>5}x  {}", count, error));
        }
        lines.push(String::new());
    }

    lines.push(separator.clone());
    lines.push("END OF REPORT".to_string());
    lines.push(separator);

    lines.join("\n")
}
