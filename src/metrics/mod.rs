pub mod gpu;
pub mod system;

use crate::types::{HardwareInfo, ResourceReading};
use async_trait::async_trait;

pub use gpu::{GpuIdentity, GpuTelemetry, NoGpu, NvidiaSmi};
pub use system::SystemMetricsSource;

/// Hardware telemetry as seen by the sampler.
///
/// Implementations degrade instead of failing: missing sensors read as zero
/// and a missing GPU is reported as "not detected".
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// One-time identification, captured at test start.
    async fn hardware_info(&self) -> HardwareInfo;

    /// Instantaneous reading for one snapshot.
    async fn sample(&self) -> ResourceReading;
}
