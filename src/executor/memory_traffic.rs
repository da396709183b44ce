use super::fallback::{Stream, recover};
use super::helpers::privilege::Privilege;
use super::helpers::run_captured::run_captured;
use super::{Stage, StageRunner, SubjectInvocation, parse};
use crate::benchmark::MeasureMode;
use crate::config::EngineConfig;
use async_trait::async_trait;
use roofline_shared::results::{MemoryTraffic, StageResult};
use std::rc::Rc;

/// DRAM byte counters, read by the subject itself with elevated privilege.
pub struct MemoryTrafficRunner {
    config: Rc<EngineConfig>,
}

impl MemoryTrafficRunner {
    pub fn new(config: Rc<EngineConfig>) -> Self {
        Self { config }
    }
}

#[async_trait(?Send)]
impl StageRunner for MemoryTrafficRunner {
    type Payload = MemoryTraffic;

    fn stage(&self) -> Stage {
        Stage::MemoryTraffic
    }

    async fn run(&self, invocation: &SubjectInvocation<'_>) -> StageResult<MemoryTraffic> {
        let privilege = match Privilege::probe(self.config.privilege).await {
            Ok(privilege) => privilege,
            Err(reason) => return StageResult::unavailable(reason),
        };

        let cmd = privilege.wrap(invocation.command(&self.config, MeasureMode::Dram));
        let attempt = run_captured(cmd, Some(self.config.timeouts.memory_traffic)).await;
        recover(
            self.stage(),
            &attempt,
            Stream::Stdout,
            parse::memory_traffic,
            &self.config.memory_traffic_log_path(),
        )
    }
}
