use super::{PrivilegeMode, parse_duration};
use crate::prelude::*;
use roofline_shared::configuration::Parameters;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Config file names in priority order
const CONFIG_FILENAMES: &[&str] = &["roofline.yaml", "roofline.yml", ".roofline.yaml"];

/// Project-level configuration from a `roofline.yaml` file.
///
/// Every field is optional. Command-line arguments always take precedence over values
/// from the file.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectConfig {
    /// Repository holding the benchmark sources, relative to the config file
    pub repo_root: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,
    pub source_extension: Option<String>,
    pub build_dir: Option<PathBuf>,
    pub build_tool: Option<String>,
    pub build_type: Option<String>,
    pub build_jobs: Option<usize>,
    pub privilege: Option<PrivilegeMode>,
    pub tools: Option<ToolOptions>,
    pub logs: Option<LogOptions>,
    pub timeouts: Option<TimeoutOptions>,
    /// Benchmark parameters and controls applied beneath every run
    pub defaults: Option<Parameters>,

    /// Directory of the file this config was loaded from
    #[serde(skip)]
    pub location: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ToolOptions {
    /// Path to the dynamic instrumentation tool
    pub pin: Option<PathBuf>,
    /// Path to the instrumentation plugin counting operations
    pub pintool: Option<PathBuf>,
    pub pin_quiet: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LogOptions {
    pub memory_traffic: Option<PathBuf>,
    pub operation_count: Option<PathBuf>,
    /// Delete both logs before measuring each configuration
    pub reset_before_run: Option<bool>,
}

/// Per-stage invocation timeouts (e.g., "90s", "10m", or a number in seconds)
#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TimeoutOptions {
    pub latency: Option<String>,
    pub memory_traffic: Option<String>,
    pub operation_count: Option<String>,
}

impl ProjectConfig {
    /// Discover and load the project configuration file
    ///
    /// # Search Strategy
    /// 1. If `config_path_override` is provided, load from that path only (error if not found)
    /// 2. Otherwise, try filenames in priority order in `current_dir`
    ///
    /// # Returns
    /// * `Ok(Some(config))` - Config found and loaded successfully
    /// * `Ok(None)` - No config file found
    /// * `Err(_)` - Error loading or parsing config
    pub fn discover_and_load(
        config_path_override: Option<&Path>,
        current_dir: &Path,
    ) -> Result<Option<ProjectConfig>> {
        if let Some(config_path) = config_path_override {
            let config = Self::load_from_path(config_path)
                .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
            return Ok(Some(config));
        }

        for filename in CONFIG_FILENAMES {
            let candidate_path = current_dir.join(filename);
            if candidate_path.exists() {
                debug!("Found config file at {}", candidate_path.display());
                return Self::load_from_path(&candidate_path).map(Some);
            }
        }

        Ok(None)
    }

    /// Load and parse config from a specific path
    fn load_from_path(path: &Path) -> Result<Self> {
        let config_content = fs::read(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let mut config: Self = serde_yaml::from_slice(&config_content)
            .with_context(|| format!("Failed to parse project config at {}", path.display()))?;

        config.validate()?;

        let canonical_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        config.location = canonical_path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Validate values that serde cannot check on its own
    fn validate(&self) -> Result<()> {
        if let Some(timeouts) = &self.timeouts {
            for (stage, value) in [
                ("latency", &timeouts.latency),
                ("memory-traffic", &timeouts.memory_traffic),
                ("operation-count", &timeouts.operation_count),
            ] {
                if let Some(value) = value {
                    parse_duration(value)
                        .with_context(|| format!("Invalid `timeouts.{stage}` value"))?;
                }
            }
        }

        if self.build_jobs == Some(0) {
            bail!("`build-jobs` must be at least 1");
        }

        if let Some(extension) = &self.source_extension {
            if extension.is_empty() || extension.starts_with('.') {
                bail!("`source-extension` must be given without a leading dot, got `{extension}`");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roofline_shared::configuration::ParamValue;
    use tempfile::TempDir;

    #[test]
    fn test_deserialize_empty_config() {
        let config: ProjectConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn test_deserialize_full_config() {
        let yaml = r#"
repo-root: ..
source-dir: kernels
build-dir: out
build-jobs: 4
privilege: inherit
tools:
  pin: /usr/local/pin/pin
  pin-quiet: false
logs:
  operation-count: out/ops.log
  reset-before-run: false
timeouts:
  latency: 2m
  operation-count: "7200"
defaults:
  ring_dim: 8192
  mult_depth: 1
  check_security: false
  timing_runs: 5
"#;
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.repo_root, Some(PathBuf::from("..")));
        assert_eq!(config.build_jobs, Some(4));
        assert_eq!(config.privilege, Some(PrivilegeMode::Inherit));
        let tools = config.tools.as_ref().unwrap();
        assert_eq!(tools.pin, Some(PathBuf::from("/usr/local/pin/pin")));
        assert_eq!(tools.pintool, None);
        assert_eq!(tools.pin_quiet, Some(false));
        assert_eq!(
            config.logs.as_ref().unwrap().reset_before_run,
            Some(false)
        );

        let defaults = config.defaults.unwrap();
        let keys: Vec<_> = defaults.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["ring_dim", "mult_depth", "check_security", "timing_runs"]
        );
        assert_eq!(defaults.get("check_security"), Some(&ParamValue::Bool(false)));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = serde_yaml::from_str::<ProjectConfig>("build-directory: out\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_invalid_timeout() {
        let config = ProjectConfig {
            timeouts: Some(TimeoutOptions {
                latency: Some("forever".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("timeouts.latency"));
    }

    #[test]
    fn test_validate_source_extension() {
        let config = ProjectConfig {
            source_extension: Some(".cpp".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discover_in_priority_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".roofline.yaml"), "build-dir: hidden\n").unwrap();
        fs::write(dir.path().join("roofline.yml"), "build-dir: yml\n").unwrap();

        let config = ProjectConfig::discover_and_load(None, dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(config.build_dir, Some(PathBuf::from("yml")));
        assert_eq!(
            config.location,
            Some(dir.path().canonicalize().unwrap())
        );
    }

    #[test]
    fn test_discover_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(
            ProjectConfig::discover_and_load(None, dir.path())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("custom.yaml");
        let err = ProjectConfig::discover_and_load(Some(&missing), dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }

    #[test]
    fn test_duplicate_default_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roofline.yaml");
        fs::write(&path, "defaults:\n  ring_dim: 1\n  ring-dim: 2\n").unwrap();
        let err = ProjectConfig::discover_and_load(Some(&path), dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("more than once"));
    }
}
