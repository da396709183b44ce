mod interfaces;
mod metrics;
mod stats;

pub use interfaces::*;

use crate::configuration::BenchmarkConfiguration;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

impl<T> StageResult<T> {
    pub fn live(data: T) -> Self {
        StageResult::Success {
            data,
            origin: DataOrigin::Live,
        }
    }

    pub fn recovered(data: T) -> Self {
        StageResult::Success {
            data,
            origin: DataOrigin::PersistedLog,
        }
    }

    pub fn failed<S: Into<String>>(reason: S) -> Self {
        StageResult::Failed {
            reason: reason.into(),
        }
    }

    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        StageResult::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            StageResult::Success { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn origin(&self) -> Option<DataOrigin> {
        match self {
            StageResult::Success { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageResult::Success { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageResult::Failed { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StageResult::Unavailable { .. })
    }

    /// Short human-readable status, used when the data itself cannot be shown.
    pub fn status_label(&self) -> &'static str {
        match self {
            StageResult::Success {
                origin: DataOrigin::Live,
                ..
            } => "ok",
            StageResult::Success {
                origin: DataOrigin::PersistedLog,
                ..
            } => "ok (from log)",
            StageResult::Failed { .. } => "failed",
            StageResult::Unavailable { .. } => "unavailable",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            StageResult::Failed { reason } | StageResult::Unavailable { reason } => Some(reason),
            StageResult::Success { .. } => None,
        }
    }
}

impl MeasurementResult {
    /// Assemble the record and derive the efficiency metrics from whatever stages succeeded.
    pub fn new(
        benchmark: String,
        configuration: BenchmarkConfiguration,
        latency: StageResult<Latency>,
        memory_traffic: StageResult<MemoryTraffic>,
        operation_count: StageResult<OperationCount>,
    ) -> Self {
        let derived = DerivedMetrics::derive(
            latency.data().map(|l| l.mean_s),
            memory_traffic.data().map(|m| m.total_bytes),
            operation_count.data().map(|o| o.total),
        );
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        MeasurementResult {
            benchmark,
            timestamp,
            configuration,
            latency,
            memory_traffic,
            operation_count,
            derived,
        }
    }

    pub fn benchmark(&self) -> &str {
        &self.benchmark
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn configuration(&self) -> &BenchmarkConfiguration {
        &self.configuration
    }

    pub fn latency(&self) -> &StageResult<Latency> {
        &self.latency
    }

    pub fn memory_traffic(&self) -> &StageResult<MemoryTraffic> {
        &self.memory_traffic
    }

    pub fn operation_count(&self) -> &StageResult<OperationCount> {
        &self.operation_count
    }

    pub fn derived(&self) -> &DerivedMetrics {
        &self.derived
    }

    pub fn mean_runtime_s(&self) -> Option<f64> {
        self.latency.data().map(|l| l.mean_s)
    }

    pub fn total_bytes(&self) -> Option<u64> {
        self.memory_traffic.data().map(|m| m.total_bytes)
    }

    pub fn total_ops(&self) -> Option<u64> {
        self.operation_count.data().map(|o| o.total)
    }

    /// True when no stage produced data.
    pub fn is_empty(&self) -> bool {
        !self.latency.is_success()
            && !self.memory_traffic.is_success()
            && !self.operation_count.is_success()
    }

    /// Ratio of `baseline`'s mean runtime to this one's, when both are known.
    pub fn speedup_over(&self, baseline: &MeasurementResult) -> Option<f64> {
        let own = self.mean_runtime_s().filter(|r| *r > 0.0)?;
        let base = baseline.mean_runtime_s().filter(|r| *r > 0.0)?;
        Some(base / own)
    }
}

/// Write results as pretty JSON, creating the parent directory if needed.
pub fn save_to_file<P: AsRef<Path>>(results: &[MeasurementResult], path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!("Failed to create directory: {}: {}", parent.display(), e)
        })?;
    }

    let file = std::fs::File::create(path)
        .map_err(|e| anyhow::anyhow!("Failed to create file: {}: {}", path.display(), e))?;
    serde_json::to_writer_pretty(file, results)
        .map_err(|e| anyhow::anyhow!("Failed to write JSON to file: {}: {}", path.display(), e))?;
    log::debug!("Wrote {} result(s) to {}", results.len(), path.display());
    Ok(())
}
