use crate::configuration::BenchmarkConfiguration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the data of a successful stage came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    /// Parsed from the output of the invocation that was just made
    Live,
    /// Recovered from a log file left behind by the subject, possibly by an earlier run
    PersistedLog,
}

/// Outcome of one measurement channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageResult<T> {
    /// The channel was not attempted: missing privilege or tooling
    Unavailable { reason: String },
    Success { data: T, origin: DataOrigin },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Latency {
    /// Per-run elapsed time in **seconds**, in invocation order
    pub samples_s: Vec<f64>,
    pub mean_s: f64,
    /// Sample standard deviation (n - 1 denominator)
    pub stdev_s: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryTraffic {
    pub read_bytes: Option<u64>,
    pub write_bytes: Option<u64>,
    /// Reported independently by the hardware counter, not necessarily read + write
    pub total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCount {
    pub total: u64,
    /// Per-kind counts (e.g. ADD, MUL). Need not sum to `total`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub breakdown: BTreeMap<String, u64>,
}

/// Efficiency metrics, stored in base units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Operations per byte of memory traffic
    pub arithmetic_intensity: Option<f64>,
    /// Operations per second
    pub throughput_ops_per_s: Option<f64>,
    /// Bytes per second
    pub bandwidth_bytes_per_s: Option<f64>,
}

/// Aggregate record of one configuration's measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    pub(super) benchmark: String,
    /// Seconds since the UNIX epoch at which the record was assembled
    pub(super) timestamp: u64,
    pub(super) configuration: BenchmarkConfiguration,
    pub(super) latency: StageResult<Latency>,
    pub(super) memory_traffic: StageResult<MemoryTraffic>,
    pub(super) operation_count: StageResult<OperationCount>,
    pub(super) derived: DerivedMetrics,
}
