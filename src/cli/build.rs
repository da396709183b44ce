use crate::config::EngineConfig;
use crate::engine::Orchestrator;
use crate::prelude::*;
use clap::Args;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Name of the benchmark, i.e. its source file without extension
    pub benchmark: String,

    /// Build even if the executable is up to date
    #[arg(long)]
    pub force: bool,
}

pub async fn run(args: BuildArgs, config: EngineConfig) -> Result<()> {
    let orchestrator = Orchestrator::new(config);
    let artifact = orchestrator.build(&args.benchmark, args.force).await?;
    info!("{} is ready", artifact.executable.display());
    Ok(())
}
