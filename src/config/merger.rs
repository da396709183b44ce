use super::{EngineConfig, PrivilegeMode, ProjectConfig, StageTimeouts, parse_duration};
use crate::prelude::*;
use roofline_shared::configuration::BenchmarkConfiguration;
use std::path::{Path, PathBuf};

/// Engine settings that can be given on the command line.
#[derive(Debug, Clone, Default)]
pub struct EngineOverrides {
    pub repo_root: Option<PathBuf>,
    pub pin: Option<PathBuf>,
    pub pintool: Option<PathBuf>,
    pub privilege: Option<PrivilegeMode>,
}

/// Handles merging of CLI arguments with project configuration
///
/// Implements the precedence rule: CLI > config > built-in default
pub struct ConfigMerger;

impl ConfigMerger {
    /// Build the engine configuration. Relative paths from the project file are taken
    /// relative to the file itself, relative paths from the CLI relative to `current_dir`.
    pub fn merge(
        cli: &EngineOverrides,
        project: Option<&ProjectConfig>,
        current_dir: &Path,
    ) -> Result<EngineConfig> {
        let config_dir = project
            .and_then(|p| p.location.clone())
            .unwrap_or_else(|| current_dir.to_path_buf());

        let repo_root = match (&cli.repo_root, project.and_then(|p| p.repo_root.as_ref())) {
            (Some(cli_root), _) => current_dir.join(cli_root),
            (None, Some(config_root)) => config_dir.join(config_root),
            (None, None) => config_dir,
        };

        let mut config = EngineConfig::new(repo_root);
        config.privilege = Self::merge_option(&cli.privilege, project.and_then(|p| p.privilege.as_ref()))
            .unwrap_or(config.privilege);

        let tools = project.and_then(|p| p.tools.as_ref());
        if let Some(pin) = Self::merge_option(&cli.pin, tools.and_then(|t| t.pin.as_ref())) {
            config.pin_path = pin;
        }
        if let Some(pintool) = Self::merge_option(&cli.pintool, tools.and_then(|t| t.pintool.as_ref())) {
            config.pintool_path = pintool;
        }

        let Some(project) = project else {
            return Ok(config);
        };

        if let Some(quiet) = tools.and_then(|t| t.pin_quiet) {
            config.pin_quiet = quiet;
        }
        Self::apply_build_options(&mut config, project);
        if let Some(logs) = &project.logs {
            if let Some(path) = &logs.memory_traffic {
                config.memory_traffic_log = path.clone();
            }
            if let Some(path) = &logs.operation_count {
                config.operation_count_log = path.clone();
            }
            config.reset_logs = logs.reset_before_run.unwrap_or(config.reset_logs);
        }
        if let Some(timeouts) = &project.timeouts {
            config.timeouts = Self::merge_timeouts(config.timeouts, timeouts)?;
        }
        if let Some(defaults) = &project.defaults {
            config.defaults = BenchmarkConfiguration::from_entries(
                defaults.iter().map(|(key, value)| (key, value.clone())),
            )
            .context("Invalid `defaults` in project config")?;
        }

        Ok(config)
    }

    fn apply_build_options(config: &mut EngineConfig, project: &ProjectConfig) {
        if let Some(source_dir) = &project.source_dir {
            config.source_dir = source_dir.clone();
        }
        if let Some(extension) = &project.source_extension {
            config.source_extension = extension.clone();
        }
        if let Some(build_dir) = &project.build_dir {
            config.build_dir = build_dir.clone();
        }
        if let Some(build_tool) = &project.build_tool {
            config.build_tool = build_tool.clone();
        }
        if let Some(build_type) = &project.build_type {
            config.build_type = build_type.clone();
        }
        if let Some(jobs) = project.build_jobs {
            config.build_jobs = jobs;
        }
    }

    fn merge_timeouts(
        base: StageTimeouts,
        options: &super::TimeoutOptions,
    ) -> Result<StageTimeouts> {
        let parse = |value: &Option<String>, fallback| -> Result<_> {
            value.as_deref().map(parse_duration).unwrap_or(Ok(fallback))
        };
        Ok(StageTimeouts {
            latency: parse(&options.latency, base.latency)?,
            memory_traffic: parse(&options.memory_traffic, base.memory_traffic)?,
            operation_count: parse(&options.operation_count, base.operation_count)?,
        })
    }

    /// Helper to merge Option values with precedence: CLI > config > None
    fn merge_option<T: Clone>(cli_value: &Option<T>, config_value: Option<&T>) -> Option<T> {
        cli_value.clone().or_else(|| config_value.cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogOptions, TimeoutOptions, ToolOptions};
    use roofline_shared::configuration::{ParamValue, Parameters};
    use std::time::Duration;

    #[test]
    fn test_no_project_config() {
        let config =
            ConfigMerger::merge(&EngineOverrides::default(), None, Path::new("/work")).unwrap();
        assert_eq!(config, EngineConfig::new("/work"));
    }

    #[test]
    fn test_cli_wins_over_config() {
        let cli = EngineOverrides {
            repo_root: Some("fhe".into()),
            pin: Some("/cli/pin".into()),
            pintool: None,
            privilege: Some(PrivilegeMode::Inherit),
        };
        let project = ProjectConfig {
            repo_root: Some("ignored".into()),
            privilege: Some(PrivilegeMode::Sudo),
            tools: Some(ToolOptions {
                pin: Some("/config/pin".into()),
                pintool: Some("/config/pintool.so".into()),
                pin_quiet: Some(false),
            }),
            location: Some("/etc/project".into()),
            ..Default::default()
        };

        let config = ConfigMerger::merge(&cli, Some(&project), Path::new("/work")).unwrap();
        assert_eq!(config.repo_root, PathBuf::from("/work/fhe"));
        assert_eq!(config.privilege, PrivilegeMode::Inherit);
        assert_eq!(config.pin_path, PathBuf::from("/cli/pin"));
        assert_eq!(config.pintool_path, PathBuf::from("/config/pintool.so"));
        assert!(!config.pin_quiet);
    }

    #[test]
    fn test_config_paths_are_relative_to_the_file() {
        let project = ProjectConfig {
            repo_root: Some("..".into()),
            build_dir: Some("out".into()),
            logs: Some(LogOptions {
                memory_traffic: Some("out/dram.log".into()),
                operation_count: None,
                reset_before_run: Some(false),
            }),
            location: Some("/repo/bench".into()),
            ..Default::default()
        };

        let config =
            ConfigMerger::merge(&EngineOverrides::default(), Some(&project), Path::new("/tmp"))
                .unwrap();
        assert_eq!(config.repo_root, PathBuf::from("/repo/bench/.."));
        assert_eq!(config.build_dir(), PathBuf::from("/repo/bench/../out"));
        assert_eq!(
            config.memory_traffic_log_path(),
            PathBuf::from("/repo/bench/../out/dram.log")
        );
        assert!(!config.reset_logs);
    }

    #[test]
    fn test_timeouts_and_defaults() {
        let mut defaults = Parameters::new();
        defaults.insert("ring_dim", 8192);
        defaults.insert("timing_runs", 5);
        let project = ProjectConfig {
            timeouts: Some(TimeoutOptions {
                latency: Some("30s".into()),
                memory_traffic: None,
                operation_count: Some("2h".into()),
            }),
            defaults: Some(defaults),
            ..Default::default()
        };

        let config =
            ConfigMerger::merge(&EngineOverrides::default(), Some(&project), Path::new("/w"))
                .unwrap();
        assert_eq!(config.timeouts.latency, Duration::from_secs(30));
        assert_eq!(
            config.timeouts.memory_traffic,
            StageTimeouts::default().memory_traffic
        );
        assert_eq!(config.timeouts.operation_count, Duration::from_secs(7200));
        assert_eq!(config.defaults.controls.runs, Some(5));
        assert_eq!(
            config.defaults.params.get("ring_dim"),
            Some(&ParamValue::Int(8192))
        );
    }

    #[test]
    fn test_engine_owned_default_is_rejected() {
        let mut defaults = Parameters::new();
        defaults.insert("measure", "pin");
        let project = ProjectConfig {
            defaults: Some(defaults),
            ..Default::default()
        };
        let err = ConfigMerger::merge(&EngineOverrides::default(), Some(&project), Path::new("/w"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("set by the engine"));
    }
}
