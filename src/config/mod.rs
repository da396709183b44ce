//! Engine configuration.
//!
//! [`EngineConfig`] is built once per process from built-in defaults, the optional project
//! file and the command line, then shared read-only with every component.

use crate::prelude::*;
use roofline_shared::configuration::BenchmarkConfiguration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod merger;
mod project;

pub use project::*;

pub const DEFAULT_SOURCE_DIR: &str = "examples";
pub const DEFAULT_SOURCE_EXTENSION: &str = "cpp";
pub const DEFAULT_BUILD_DIR: &str = "build";
pub const DEFAULT_BUILD_TOOL: &str = "cmake";
pub const DEFAULT_BUILD_TYPE: &str = "Release";
pub const DEFAULT_PIN_PATH: &str = "/opt/intel/pin/pin";
pub const DEFAULT_PINTOOL_PATH: &str = "/opt/profiling-tools/lib/pintool.so";
pub const DEFAULT_MEMORY_TRAFFIC_LOG: &str = "logs/dram_counts.out";
pub const DEFAULT_OPERATION_COUNT_LOG: &str = "logs/int_counts.out";

/// How the privileged stages obtain their privilege.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PrivilegeMode {
    /// Elevate with `sudo --non-interactive` unless already root
    #[default]
    Sudo,
    /// Run as-is, assuming the current context already holds the needed privilege
    Inherit,
}

/// Upper bound on a single subject invocation, per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub latency: Duration,
    pub memory_traffic: Duration,
    pub operation_count: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            latency: Duration::from_secs(10 * 60),
            memory_traffic: Duration::from_secs(15 * 60),
            // Dynamic instrumentation slows the subject down by an order of magnitude or more
            operation_count: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub repo_root: PathBuf,
    /// Directory holding `<benchmark>.<source_extension>`, relative to `repo_root`
    pub source_dir: PathBuf,
    pub source_extension: String,
    /// Relative to `repo_root`
    pub build_dir: PathBuf,
    pub build_tool: String,
    pub build_type: String,
    pub build_jobs: usize,
    pub pin_path: PathBuf,
    pub pintool_path: PathBuf,
    /// Pass `-quiet` to the instrumentation tool
    pub pin_quiet: bool,
    pub privilege: PrivilegeMode,
    /// Relative to `repo_root`
    pub memory_traffic_log: PathBuf,
    /// Relative to `repo_root`
    pub operation_count_log: PathBuf,
    /// Delete both persisted logs before measuring each configuration
    pub reset_logs: bool,
    pub timeouts: StageTimeouts,
    /// Layered beneath every requested configuration
    pub defaults: BenchmarkConfiguration,
}

impl EngineConfig {
    pub fn new<P: Into<PathBuf>>(repo_root: P) -> Self {
        Self {
            repo_root: repo_root.into(),
            source_dir: DEFAULT_SOURCE_DIR.into(),
            source_extension: DEFAULT_SOURCE_EXTENSION.into(),
            build_dir: DEFAULT_BUILD_DIR.into(),
            build_tool: DEFAULT_BUILD_TOOL.into(),
            build_type: DEFAULT_BUILD_TYPE.into(),
            build_jobs: default_build_jobs(),
            pin_path: DEFAULT_PIN_PATH.into(),
            pintool_path: DEFAULT_PINTOOL_PATH.into(),
            pin_quiet: true,
            privilege: PrivilegeMode::default(),
            memory_traffic_log: DEFAULT_MEMORY_TRAFFIC_LOG.into(),
            operation_count_log: DEFAULT_OPERATION_COUNT_LOG.into(),
            reset_logs: true,
            timeouts: StageTimeouts::default(),
            defaults: BenchmarkConfiguration::default(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo_root.join(path)
        }
    }

    /// Source path relative to the repository root, as handed to the build system.
    pub fn relative_source_path(&self, benchmark: &str) -> PathBuf {
        self.source_dir
            .join(format!("{benchmark}.{}", self.source_extension))
    }

    pub fn source_path(&self, benchmark: &str) -> PathBuf {
        self.resolve(&self.relative_source_path(benchmark))
    }

    pub fn build_dir(&self) -> PathBuf {
        self.resolve(&self.build_dir)
    }

    pub fn executable_path(&self, benchmark: &str) -> PathBuf {
        self.build_dir().join(benchmark)
    }

    pub fn memory_traffic_log_path(&self) -> PathBuf {
        self.resolve(&self.memory_traffic_log)
    }

    pub fn operation_count_log_path(&self) -> PathBuf {
        self.resolve(&self.operation_count_log)
    }
}

fn default_build_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Parse a duration given either as a humantime string ("90s", "10m") or as bare seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    if let Ok(seconds) = s.parse::<f64>() {
        ensure!(
            seconds.is_finite() && seconds > 0.0,
            "Invalid duration '{s}': must be a positive number of seconds"
        );
        return Ok(Duration::from_secs_f64(seconds));
    }

    let duration = humantime::parse_duration(s).with_context(|| {
        format!("Invalid duration format: '{s}'. Expected format like '90s', '10m', '1h' or a number in seconds")
    })?;
    ensure!(!duration.is_zero(), "Invalid duration '{s}': must not be zero");
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_paths_are_resolved_against_repo_root() {
        let config = EngineConfig::new("/work/fhe");
        assert_eq!(
            config.relative_source_path("addition"),
            PathBuf::from("examples/addition.cpp")
        );
        assert_eq!(
            config.source_path("addition"),
            PathBuf::from("/work/fhe/examples/addition.cpp")
        );
        assert_eq!(
            config.executable_path("addition"),
            PathBuf::from("/work/fhe/build/addition")
        );
        assert_eq!(
            config.operation_count_log_path(),
            PathBuf::from("/work/fhe/logs/int_counts.out")
        );
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let mut config = EngineConfig::new("/work/fhe");
        config.build_dir = "/tmp/build".into();
        config.memory_traffic_log = "/var/log/dram.out".into();
        assert_eq!(
            config.executable_path("rotation"),
            PathBuf::from("/tmp/build/rotation")
        );
        assert_eq!(
            config.memory_traffic_log_path(),
            PathBuf::from("/var/log/dram.out")
        );
    }

    #[rstest]
    #[case("90", Duration::from_secs(90))]
    #[case("0.5", Duration::from_millis(500))]
    #[case("10m", Duration::from_secs(600))]
    #[case("1h 30m", Duration::from_secs(5400))]
    fn test_parse_duration(#[case] raw: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("0")]
    #[case("-1")]
    #[case("0s")]
    #[case("soon")]
    fn test_parse_duration_rejects(#[case] raw: &str) {
        assert!(parse_duration(raw).is_err());
    }
}
