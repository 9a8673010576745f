use super::gpu::{self, GpuTelemetry};
use super::MetricsSource;
use crate::summary::round_to;
use crate::types::{HardwareInfo, ResourceReading, SystemReading, GPU_NOT_DETECTED};
use async_trait::async_trait;
use sysinfo::System;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::{sleep, Instant};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

struct CpuState {
    system: System,
    last_refresh: Instant,
}

/// Host telemetry from `sysinfo`, GPU telemetry from the detected strategy.
pub struct SystemMetricsSource {
    state: Mutex<CpuState>,
    gpu: Box<dyn GpuTelemetry>,
    hardware: OnceCell<HardwareInfo>,
}

impl SystemMetricsSource {
    pub fn new(gpu: Box<dyn GpuTelemetry>) -> Self {
        let mut system = System::new_all();
        system.refresh_cpu_usage();
        Self {
            state: Mutex::new(CpuState {
                system,
                last_refresh: Instant::now(),
            }),
            gpu,
            hardware: OnceCell::new(),
        }
    }

    /// Builds a source with the GPU strategy detected on this host.
    pub async fn detect() -> Self {
        Self::new(gpu::detect().await)
    }

    pub fn gpu_backend(&self) -> &'static str {
        self.gpu.name()
    }

    async fn identify(&self) -> HardwareInfo {
        let (cpu_model, cpu_cores, cpu_threads, ram_total_gb) = {
            let state = self.state.lock().await;
            let system = &state.system;
            let cpu_model = system
                .cpus()
                .first()
                .map(|cpu| cpu.brand().trim().to_string())
                .filter(|brand| !brand.is_empty())
                .unwrap_or_else(|| "Unknown".to_string());
            (
                cpu_model,
                system.physical_core_count().unwrap_or(0),
                system.cpus().len(),
                round_to(system.total_memory() as f64 / BYTES_PER_GB, 2),
            )
        };

        let os = format!(
            "{} {}",
            System::name().unwrap_or_else(|| "Unknown".to_string()),
            System::kernel_version().unwrap_or_default()
        )
        .trim()
        .to_string();

        let (gpu_model, gpu_vram_gb) = match self.gpu.identify().await {
            Some(gpu) => (gpu.name, round_to(gpu.vram_total_mb / 1024.0, 2)),
            None => (GPU_NOT_DETECTED.to_string(), 0.0),
        };

        HardwareInfo {
            cpu_model,
            cpu_cores,
            cpu_threads,
            ram_total_gb,
            os,
            gpu_model,
            gpu_vram_gb,
        }
    }

    async fn read_system(&self) -> SystemReading {
        let mut state = self.state.lock().await;

        // CPU usage is a delta between two refreshes; they must be far enough apart.
        let since_last = state.last_refresh.elapsed();
        if since_last < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL {
            sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL - since_last).await;
        }

        let system = &mut state.system;
        system.refresh_cpu_usage();
        system.refresh_cpu_frequency();
        system.refresh_memory();

        let total = system.total_memory() as f64;
        let used = system.used_memory() as f64;
        let reading = SystemReading {
            cpu_percent: round_to(system.global_cpu_usage() as f64, 1),
            cpu_freq_mhz: system.cpus().first().map(|cpu| cpu.frequency()).unwrap_or(0),
            ram_percent: if total > 0.0 {
                round_to(used / total * 100.0, 1)
            } else {
                0.0
            },
            ram_used_mb: (used / BYTES_PER_MB).round(),
            ram_available_mb: (system.available_memory() as f64 / BYTES_PER_MB).round(),
        };
        state.last_refresh = Instant::now();
        reading
    }
}

#[async_trait]
impl MetricsSource for SystemMetricsSource {
    async fn hardware_info(&self) -> HardwareInfo {
        self.hardware
            .get_or_init(|| self.identify())
            .await
            .clone()
    }

    async fn sample(&self) -> ResourceReading {
        let system = self.read_system().await;
        let gpu = self.gpu.read().await;
        ResourceReading { system, gpu }
    }
}
