use super::fallback::{Stream, recover};
use super::helpers::command::CommandBuilder;
use super::helpers::privilege::Privilege;
use super::helpers::run_captured::run_captured;
use super::{Stage, StageRunner, SubjectInvocation, parse};
use crate::benchmark::MeasureMode;
use crate::config::EngineConfig;
use async_trait::async_trait;
use roofline_shared::results::{OperationCount, StageResult};
use std::ffi::OsString;
use std::rc::Rc;

/// Operation counts from running the subject under dynamic binary instrumentation.
pub struct OperationCountRunner {
    config: Rc<EngineConfig>,
}

impl OperationCountRunner {
    pub fn new(config: Rc<EngineConfig>) -> Self {
        Self { config }
    }

    /// Reason the instrumentation tooling cannot be used, if any.
    pub fn missing_tooling(&self) -> Option<String> {
        if !self.config.pin_path.is_file() {
            return Some(format!(
                "instrumentation tool not found at {}",
                self.config.pin_path.display()
            ));
        }
        if !self.config.pintool_path.is_file() {
            return Some(format!(
                "instrumentation plugin not found at {}",
                self.config.pintool_path.display()
            ));
        }
        None
    }

    fn command(&self, invocation: &SubjectInvocation<'_>, privilege: Privilege) -> CommandBuilder {
        let mut tool_args: Vec<OsString> = vec!["-t".into(), self.config.pintool_path.clone().into()];
        if self.config.pin_quiet {
            tool_args.push("-quiet".into());
        }
        tool_args.push("--".into());

        let mut cmd = invocation.command(&self.config, MeasureMode::Pin);
        cmd.wrap(&self.config.pin_path, tool_args);
        privilege.wrap(cmd)
    }
}

#[async_trait(?Send)]
impl StageRunner for OperationCountRunner {
    type Payload = OperationCount;

    fn stage(&self) -> Stage {
        Stage::OperationCount
    }

    async fn run(&self, invocation: &SubjectInvocation<'_>) -> StageResult<OperationCount> {
        if let Some(reason) = self.missing_tooling() {
            return StageResult::unavailable(reason);
        }
        let privilege = match Privilege::probe(self.config.privilege).await {
            Ok(privilege) => privilege,
            Err(reason) => return StageResult::unavailable(reason),
        };

        let cmd = self.command(invocation, privilege);
        let attempt = run_captured(cmd, Some(self.config.timeouts.operation_count)).await;
        // The tool reports on stderr so that the subject's own output stays untouched
        recover(
            self.stage(),
            &attempt,
            Stream::Stderr,
            parse::operation_count,
            &self.config.operation_count_log_path(),
        )
    }
}
