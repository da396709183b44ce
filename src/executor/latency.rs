use super::helpers::run_captured::run_captured;
use super::{Stage, StageRunner, SubjectInvocation};
use crate::benchmark::MeasureMode;
use crate::config::EngineConfig;
use crate::prelude::*;
use async_trait::async_trait;
use roofline_shared::results::{Latency, StageResult};
use std::rc::Rc;

/// Wall-clock timing of unelevated invocations.
pub struct LatencyRunner {
    config: Rc<EngineConfig>,
}

impl LatencyRunner {
    pub fn new(config: Rc<EngineConfig>) -> Self {
        Self { config }
    }
}

#[async_trait(?Send)]
impl StageRunner for LatencyRunner {
    type Payload = Latency;

    fn stage(&self) -> Stage {
        Stage::Latency
    }

    async fn run(&self, invocation: &SubjectInvocation<'_>) -> StageResult<Latency> {
        let timeout = Some(self.config.timeouts.latency);
        let controls = invocation.controls;

        // Warm-up runs only prime caches, their outcome is irrelevant
        for i in 1..=controls.warmup_runs {
            let cmd = invocation.command(&self.config, MeasureMode::None);
            match run_captured(cmd, timeout).await {
                Ok(run) if run.status.success() => {
                    debug!("Warm-up run {i}/{} took {:?}", controls.warmup_runs, run.elapsed)
                }
                Ok(run) => debug!("Ignoring warm-up run {i}: {}", run.failure_reason()),
                Err(err) => debug!("Ignoring warm-up run {i}: {err}"),
            }
        }

        let mut samples = Vec::with_capacity(controls.runs as usize);
        for i in 1..=controls.runs {
            let cmd = invocation.command(&self.config, MeasureMode::None);
            let run = match run_captured(cmd, timeout).await {
                Ok(run) if run.status.success() => run,
                Ok(run) => {
                    return StageResult::failed(format!(
                        "timed run {i}/{} {}",
                        controls.runs,
                        run.failure_reason()
                    ));
                }
                Err(err) => {
                    return StageResult::failed(format!("timed run {i}/{} {err}", controls.runs));
                }
            };
            debug!("Timed run {i}/{} took {:?}", controls.runs, run.elapsed);
            samples.push(run.elapsed);
        }

        match Latency::from_samples(&samples) {
            Some(latency) => StageResult::live(latency),
            None => StageResult::failed("no timed run was requested"),
        }
    }
}
