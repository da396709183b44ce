use crate::benchmark::{MeasureMode, RunControls, stage_flags, thread_env};
use crate::config::EngineConfig;
use async_trait::async_trait;
use helpers::command::CommandBuilder;
use roofline_shared::results::StageResult;
use std::fmt::Display;
use std::path::Path;

pub mod fallback;
pub mod helpers;
mod latency;
mod memory_traffic;
mod operation_count;
pub mod parse;

pub use latency::LatencyRunner;
pub use memory_traffic::MemoryTrafficRunner;
pub use operation_count::OperationCountRunner;

pub const EXECUTOR_TARGET: &str = "executor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Latency,
    MemoryTraffic,
    OperationCount,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Latency => write!(f, "latency"),
            Stage::MemoryTraffic => write!(f, "memory traffic"),
            Stage::OperationCount => write!(f, "operation count"),
        }
    }
}

/// One configuration of a built subject, ready to be invoked by any stage.
#[derive(Debug, Clone)]
pub struct SubjectInvocation<'a> {
    pub executable: &'a Path,
    /// Flags from the argument mapper, without the per-stage flags
    pub args: &'a [String],
    pub controls: RunControls,
}

impl SubjectInvocation<'_> {
    /// The bare subject command for `mode`, run from the repository root so that relative
    /// log paths written by the subject land where the engine reads them.
    pub fn command(&self, config: &EngineConfig, mode: MeasureMode) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(self.executable);
        cmd.args(self.args)
            .args(stage_flags(mode, &self.controls))
            .envs(thread_env(self.controls.threads))
            .current_dir(&config.repo_root);
        cmd
    }
}

/// A measurement channel. Running a stage never fails: every outcome is encoded in the
/// returned [`StageResult`].
#[async_trait(?Send)]
pub trait StageRunner {
    type Payload;

    fn stage(&self) -> Stage;

    async fn run(&self, invocation: &SubjectInvocation<'_>) -> StageResult<Self::Payload>;
}
