use crate::types::GpuReading;
use async_trait::async_trait;
use log::{debug, info};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

const NVIDIA_SMI: &str = "nvidia-smi";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct GpuIdentity {
    pub name: String,
    pub vram_total_mb: f64,
}

/// GPU telemetry strategy, chosen once at startup by [`detect`].
#[async_trait]
pub trait GpuTelemetry: Send + Sync {
    fn name(&self) -> &'static str;

    async fn identify(&self) -> Option<GpuIdentity>;

    /// Never fails: unavailable telemetry reads as all zeros.
    async fn read(&self) -> GpuReading;
}

/// Used when no GPU telemetry is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGpu;

#[async_trait]
impl GpuTelemetry for NoGpu {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn identify(&self) -> Option<GpuIdentity> {
        None
    }

    async fn read(&self) -> GpuReading {
        GpuReading::default()
    }
}

/// NVIDIA telemetry read through the `nvidia-smi` CLI.
#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    binary: String,
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self {
            binary: NVIDIA_SMI.to_string(),
        }
    }
}

impl NvidiaSmi {
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn query(&self, fields: &str) -> Option<String> {
        let output = Command::new(&self.binary)
            .arg(format!("--query-gpu={}", fields))
            .arg("--format=csv,noheader,nounits")
            .kill_on_drop(true)
            .output();

        match timeout(PROBE_TIMEOUT, output).await {
            Ok(Ok(output)) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(Ok(output)) => {
                debug!("{} exited with {}", self.binary, output.status);
                None
            }
            Ok(Err(e)) => {
                debug!("{} could not be run: {}", self.binary, e);
                None
            }
            Err(_) => {
                debug!("{} timed out", self.binary);
                None
            }
        }
    }
}

#[async_trait]
impl GpuTelemetry for NvidiaSmi {
    fn name(&self) -> &'static str {
        NVIDIA_SMI
    }

    async fn identify(&self) -> Option<GpuIdentity> {
        let stdout = self.query("name,memory.total").await?;
        parse_identity(&stdout)
    }

    async fn read(&self) -> GpuReading {
        let stdout = self
            .query("utilization.gpu,memory.used,memory.total,temperature.gpu")
            .await;
        match stdout.as_deref().and_then(parse_reading) {
            Some(reading) => reading,
            None => {
                debug!("GPU reading unavailable, reporting zeros");
                GpuReading::default()
            }
        }
    }
}

/// First GPU's `name, memory.total` line.
pub fn parse_identity(stdout: &str) -> Option<GpuIdentity> {
    let line = stdout.lines().next()?;
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 2 || parts[0].is_empty() {
        return None;
    }
    Some(GpuIdentity {
        name: parts[0].to_string(),
        vram_total_mb: parts[1].parse().ok()?,
    })
}

/// First GPU's `utilization, memory.used, memory.total, temperature` line.
/// Fields reported as `[N/A]` read as zero.
pub fn parse_reading(stdout: &str) -> Option<GpuReading> {
    let line = stdout.lines().next()?;
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 4 {
        return None;
    }
    let field = |i: usize| parts[i].parse::<f64>().unwrap_or(0.0);
    Some(GpuReading {
        gpu_percent: field(0),
        vram_used_mb: field(1),
        vram_total_mb: field(2),
        temperature_c: field(3),
    })
}

/// Picks the telemetry strategy for this host. Called once at startup.
pub async fn detect() -> Box<dyn GpuTelemetry> {
    let smi = NvidiaSmi::default();
    match smi.identify().await {
        Some(gpu) => {
            info!("🎮 GPU detected: {} ({} MB)", gpu.name, gpu.vram_total_mb);
            Box::new(smi)
        }
        None => {
            info!("🎮 No GPU telemetry available, GPU metrics will read as zero");
            Box::new(NoGpu)
        }
    }
}
