use super::display::render_result;
use super::shared::MeasureArgs;
use crate::config::EngineConfig;
use crate::engine::Orchestrator;
use crate::prelude::*;
use clap::Args;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Name of the benchmark, i.e. its source file without extension
    pub benchmark: String,

    #[command(flatten)]
    pub measure: MeasureArgs,
}

pub async fn run(args: RunArgs, config: EngineConfig) -> Result<()> {
    let requested = args.measure.to_configuration()?;
    let orchestrator = Orchestrator::new(config);

    let result = orchestrator.measure(&args.benchmark, &requested).await?;
    if !args.measure.json_to_stdout() {
        println!("{}", render_result(&result));
    }
    args.measure.export(std::slice::from_ref(&result))?;

    if result.is_empty() {
        bail!("No measurement stage produced data for {}", args.benchmark);
    }
    Ok(())
}
