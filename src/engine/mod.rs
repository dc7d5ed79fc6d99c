mod process;

pub use process::{execute_stage, StageOutcome};

use crate::model::CommandNode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One execution attempt over an immutable snapshot of the stage list.
pub struct PipelineEngine {
    stages: Vec<CommandNode>,
    input: Arc<[u8]>,
}

impl PipelineEngine {
    pub fn new(stages: Vec<CommandNode>, input: Arc<[u8]>) -> Self {
        Self { stages, input }
    }

    /// Run every stage in order, piping each output into the next stage.
    ///
    /// Stops at the first failing stage and returns its error-augmented output.
    /// Returns `None` if `cancel` fires at any point; a cancelled run has no result.
    pub async fn run(self, cancel: CancellationToken) -> Option<Vec<u8>> {
        let mut carried = self.input.to_vec();

        for (idx, stage) in self.stages.iter().enumerate() {
            if cancel.is_cancelled() {
                return None;
            }
            let args = stage.effective_args();
            match execute_stage(&stage.command, &args, &carried, &cancel).await {
                StageOutcome::Completed(out) => carried = out,
                StageOutcome::Failed(out) => {
                    debug!(stage = idx, command = %stage.command, "pipeline halted at failing stage");
                    carried = out;
                    break;
                }
                StageOutcome::Cancelled => return None,
            }
        }

        if cancel.is_cancelled() {
            return None;
        }
        Some(carried)
    }
}
