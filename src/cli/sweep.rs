use super::display::render_sweep;
use super::shared::MeasureArgs;
use crate::benchmark::ParamValue;
use crate::config::EngineConfig;
use crate::engine::{Orchestrator, SweepAxis};
use crate::prelude::*;
use clap::{Args, Subcommand};
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Name of the benchmark, i.e. its source file without extension
    pub benchmark: String,

    #[command(flatten)]
    pub measure: MeasureArgs,

    #[command(subcommand)]
    pub axis: AxisCommand,
}

#[derive(Subcommand, Debug)]
pub enum AxisCommand {
    /// Vary one benchmark parameter, holding everything else fixed
    Param {
        /// Name of the parameter
        name: String,
        /// Values to measure, in order
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Vary the thread count, holding every parameter fixed
    Threads {
        /// Thread counts to measure, in order
        #[arg(required = true)]
        counts: Vec<u32>,
    },
}

impl From<AxisCommand> for SweepAxis {
    fn from(command: AxisCommand) -> Self {
        match command {
            AxisCommand::Param { name, values } => SweepAxis::Parameter {
                name,
                values: values.iter().map(|v| ParamValue::infer(v)).collect(),
            },
            AxisCommand::Threads { counts } => SweepAxis::Threads { counts },
        }
    }
}

/// Cancel `token` on the first Ctrl-C. Subjects run in their own process groups, so the
/// configuration in flight still completes.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current configuration");
            token.cancel();
        }
    });
}

pub async fn run(args: SweepArgs, config: EngineConfig) -> Result<()> {
    let fixed = args.measure.to_configuration()?;
    let axis = SweepAxis::from(args.axis);
    let orchestrator = Orchestrator::new(config);

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let report = orchestrator
        .sweep(&args.benchmark, &axis, &fixed, &cancel)
        .await?;
    if !args.measure.json_to_stdout() {
        println!(
            "{}",
            render_sweep(&args.benchmark, &report.results, &report.speedups())
        );
    }
    args.measure.export(&report.results)?;

    if report.cancelled {
        bail!(
            "Sweep cancelled after {}/{} configurations",
            report.results.len(),
            axis.len()
        );
    }
    Ok(())
}
