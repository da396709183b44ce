//! Orchestration of the measurement of one configuration, and of sweeps over many.

use crate::benchmark::{self, BenchmarkConfiguration, RunControls};
use crate::builder::{ArtifactBuilder, BuildError, ExecutableArtifact};
use crate::config::EngineConfig;
use crate::executor::{
    LatencyRunner, MemoryTrafficRunner, OperationCountRunner, StageRunner, SubjectInvocation,
};
use crate::prelude::*;
use roofline_shared::results::{MeasurementResult, StageResult};
use std::path::Path;
use std::rc::Rc;

mod sweep;

pub use sweep::*;

pub struct Orchestrator {
    config: Rc<EngineConfig>,
    builder: ArtifactBuilder,
    latency: LatencyRunner,
    memory_traffic: MemoryTrafficRunner,
    operation_count: OperationCountRunner,
}

impl Orchestrator {
    pub fn new(config: EngineConfig) -> Self {
        let config = Rc::new(config);
        Self {
            builder: ArtifactBuilder::new(config.clone()),
            latency: LatencyRunner::new(config.clone()),
            memory_traffic: MemoryTrafficRunner::new(config.clone()),
            operation_count: OperationCountRunner::new(config.clone()),
            config,
        }
    }

    /// Build `benchmark` if needed, without measuring it.
    pub async fn build(&self, benchmark: &str, force: bool) -> Result<ExecutableArtifact, BuildError> {
        self.builder.ensure(benchmark, force).await
    }

    /// Measure one configuration of `benchmark`, building it first if needed.
    ///
    /// Only a build failure is an error; stage failures are recorded in the result.
    pub async fn measure(
        &self,
        benchmark: &str,
        requested: &BenchmarkConfiguration,
    ) -> Result<MeasurementResult, BuildError> {
        let effective = benchmark::resolve(requested, &self.config.defaults);
        let controls = RunControls::from(&effective.controls);
        let artifact = self.builder.ensure(benchmark, controls.rebuild).await?;
        Ok(self.measure_built(benchmark, &artifact, effective).await)
    }

    /// Run the three stages in order against an already built executable.
    ///
    /// `effective` must already be resolved against the defaults.
    pub(crate) async fn measure_built(
        &self,
        benchmark: &str,
        artifact: &ExecutableArtifact,
        effective: BenchmarkConfiguration,
    ) -> MeasurementResult {
        let args = benchmark::to_args(&effective);
        let invocation = SubjectInvocation {
            executable: &artifact.executable,
            args: &args,
            controls: RunControls::from(&effective.controls),
        };

        start_opened_group!(format!("Measuring {benchmark} {}", args.join(" ")));
        if self.config.reset_logs {
            self.reset_logs();
        }
        let latency = run_stage(&self.latency, &invocation).await;
        let memory_traffic = run_stage(&self.memory_traffic, &invocation).await;
        let operation_count = run_stage(&self.operation_count, &invocation).await;
        end_group!();

        MeasurementResult::new(
            benchmark.to_string(),
            effective,
            latency,
            memory_traffic,
            operation_count,
        )
    }

    /// Remove the logs a previous run may have left, so that a recovered value always
    /// comes from this configuration.
    fn reset_logs(&self) {
        for path in [
            self.config.memory_traffic_log_path(),
            self.config.operation_count_log_path(),
        ] {
            remove_log(&path);
        }
    }
}

fn remove_log(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed stale log {}", path.display()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!("Could not remove stale log {}: {err}", path.display()),
    }
    // The subject writes its logs without creating their directory
    if let Some(parent) = path.parent() {
        if let Err(err) = std::fs::create_dir_all(parent) {
            warn!("Could not create {}: {err}", parent.display());
        }
    }
}

async fn run_stage<R: StageRunner>(
    runner: &R,
    invocation: &SubjectInvocation<'_>,
) -> StageResult<R::Payload> {
    let stage = runner.stage();
    debug!("Running the {stage} stage");
    let result = runner.run(invocation).await;
    match &result {
        StageResult::Success { .. } => debug!("The {stage} stage succeeded"),
        StageResult::Failed { reason } => warn!("The {stage} stage failed: {reason}"),
        StageResult::Unavailable { reason } => info!("The {stage} stage is unavailable: {reason}"),
    }
    result
}
