mod build;
mod check;
mod display;
mod run;
mod shared;
mod sweep;

use std::path::PathBuf;

use crate::{
    config::{
        PrivilegeMode, ProjectConfig,
        merger::{ConfigMerger, EngineOverrides},
    },
    local_logger::{ROOFLINE_U8_COLOR_CODE, init_local_logger},
    prelude::*,
};
use clap::{
    Parser, Subcommand,
    builder::{Styles, styling},
};

fn create_styles() -> Styles {
    styling::Styles::styled()
        .header(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .usage(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .literal(
            styling::Ansi256Color(ROOFLINE_U8_COLOR_CODE).on_default() | styling::Effects::BOLD,
        )
        .placeholder(styling::AnsiColor::Cyan.on_default())
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Measure latency, DRAM traffic and operation counts of compute kernels",
    styles = create_styles()
)]
pub struct Cli {
    /// Path to the project configuration file (roofline.yaml)
    /// If not provided, the file is searched for in the current directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Root of the repository holding the benchmark sources.
    /// Defaults to the directory of the project configuration file, or the current directory.
    #[arg(long, env = "ROOFLINE_REPO_ROOT", global = true)]
    pub repo_root: Option<PathBuf>,

    /// Path to the dynamic binary instrumentation tool
    #[arg(long, env = "ROOFLINE_PIN", global = true)]
    pub pin: Option<PathBuf>,

    /// Path to the operation counting plugin of the instrumentation tool
    #[arg(long, env = "ROOFLINE_PINTOOL", global = true)]
    pub pintool: Option<PathBuf>,

    /// Do not elevate with sudo: run the privileged stages as the current user
    #[arg(long, global = true)]
    pub no_sudo: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a benchmark if needed and measure one configuration of it
    #[command(alias = "r")]
    Run(Box<run::RunArgs>),
    /// Measure a benchmark over the values of one parameter or over thread counts
    #[command(alias = "s")]
    Sweep(Box<sweep::SweepArgs>),
    /// Build a benchmark without measuring it
    Build(build::BuildArgs),
    /// Check which measurement stages can run on this machine
    Check,
}

impl Cli {
    fn overrides(&self) -> EngineOverrides {
        EngineOverrides {
            repo_root: self.repo_root.clone(),
            pin: self.pin.clone(),
            pintool: self.pintool.clone(),
            privilege: self.no_sudo.then_some(PrivilegeMode::Inherit),
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_local_logger()?;

    let current_dir = std::env::current_dir()?;
    let project_config = ProjectConfig::discover_and_load(cli.config.as_deref(), &current_dir)?;
    let config = ConfigMerger::merge(&cli.overrides(), project_config.as_ref(), &current_dir)?;
    debug!("Engine configuration: {config:#?}");

    match cli.command {
        Commands::Run(args) => run::run(*args, config).await?,
        Commands::Sweep(args) => sweep::run(*args, config).await?,
        Commands::Build(args) => build::run(args, config).await?,
        Commands::Check => check::run(config).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SweepAxis;

    fn parse(args: &[&str]) -> Cli {
        temp_env::with_vars_unset(["ROOFLINE_REPO_ROOT", "ROOFLINE_PIN", "ROOFLINE_PINTOOL"], || {
            Cli::try_parse_from(std::iter::once("roofline").chain(args.iter().copied())).unwrap()
        })
    }

    #[test]
    fn test_run_command() {
        let cli = parse(&[
            "--no-sudo",
            "run",
            "addition",
            "-p",
            "ring_dim=16384",
            "--runs",
            "5",
            "--json",
            "out/addition.json",
        ]);
        assert_eq!(cli.overrides().privilege, Some(PrivilegeMode::Inherit));
        let Commands::Run(args) = cli.command else {
            panic!("expected the run command");
        };
        assert_eq!(args.benchmark, "addition");
        assert_eq!(
            args.measure.params,
            vec![("ring_dim".to_string(), "16384".to_string())]
        );
        assert_eq!(args.measure.runs, Some(5));
        assert_eq!(args.measure.json, Some(PathBuf::from("out/addition.json")));
    }

    #[test]
    fn test_sweep_flags_after_the_axis() {
        let cli = parse(&[
            "sweep",
            "addition",
            "param",
            "ring_dim",
            "4096",
            "8192",
            "--runs",
            "2",
        ]);
        assert_eq!(cli.overrides().privilege, None);
        let Commands::Sweep(args) = cli.command else {
            panic!("expected the sweep command");
        };
        assert_eq!(args.measure.runs, Some(2));
        match SweepAxis::from(args.axis) {
            SweepAxis::Parameter { name, values } => {
                assert_eq!(name, "ring_dim");
                assert_eq!(values.len(), 2);
            }
            other => panic!("unexpected axis: {other:?}"),
        }
    }

    #[test]
    fn test_thread_sweep_requires_counts() {
        let result = temp_env::with_vars_unset(["ROOFLINE_REPO_ROOT"], || {
            Cli::try_parse_from(["roofline", "sweep", "addition", "threads"])
        });
        assert!(result.is_err());
    }
}
