//! Pipeline lifecycle controller.
//!
//! Owns the pipeline state, turns edits and structural commands into runs, and emits
//! events for presentation layers. Every state mutation happens on the single task
//! draining the controller's event stream.

use super::debounce::DebounceScheduler;
use super::state::PipelineState;
use crate::engine::PipelineEngine;
use crate::model::{CommandNode, ControllerEvent, PipelineConfig, PipelineEvent};
use anyhow::Result;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handle for the one run whose result may still be adopted.
struct ActiveRun {
    run_id: u64,
    cancel: CancellationToken,
}

pub(crate) struct PipelineController {
    state: PipelineState,
    input: Arc<[u8]>,
    scheduler: DebounceScheduler,
    event_tx: UnboundedSender<ControllerEvent>,
    update_tx: UnboundedSender<PipelineEvent>,
    active: Option<ActiveRun>,
    next_run_id: u64,
}

impl PipelineController {
    pub fn new(
        seed: Option<CommandNode>,
        input: Vec<u8>,
        debounce: Duration,
        event_tx: UnboundedSender<ControllerEvent>,
        update_tx: UnboundedSender<PipelineEvent>,
    ) -> Self {
        Self {
            state: PipelineState::new(seed),
            input: Arc::from(input),
            scheduler: DebounceScheduler::new(debounce, event_tx.clone()),
            event_tx,
            update_tx,
            active: None,
            next_run_id: 0,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Publish the initial pipeline and run it if a seed stage exists.
    pub fn start(&mut self) {
        self.publish_stages();
        if self.state.is_awaiting_command() {
            let _ = self.update_tx.send(PipelineEvent::AwaitingCommand);
        } else {
            self.start_run();
        }
    }

    /// Apply one event. `Break` means the controller should stop.
    pub fn handle(&mut self, ev: ControllerEvent) -> ControlFlow<()> {
        match ev {
            ControllerEvent::Edit { stage, arg } => {
                if let Some(tag) = self.state.set_arg(stage, arg) {
                    self.scheduler.schedule(tag);
                }
            }
            ControllerEvent::AddStage { line } => match CommandNode::parse(&line) {
                Some(node) => {
                    info!(command = %node.command, "stage added");
                    self.state.push_stage(node);
                    self.publish_stages();
                    // Structural changes skip the debounce.
                    self.start_run();
                }
                None => debug!("blank add-stage line rejected"),
            },
            ControllerEvent::RemoveStage => {
                let Some(removed) = self.state.remove_focused() else {
                    return ControlFlow::Continue(());
                };
                info!(command = %removed.command, "stage removed");
                self.publish_stages();
                if self.state.is_awaiting_command() {
                    self.cancel_active();
                    self.state.clear_output();
                    let _ = self.update_tx.send(PipelineEvent::OutputUpdated {
                        output: String::new(),
                    });
                    let _ = self.update_tx.send(PipelineEvent::AwaitingCommand);
                } else {
                    self.start_run();
                }
            }
            ControllerEvent::ChangeFocus(delta) => {
                if self.state.move_focus(delta) {
                    self.publish_stages();
                }
            }
            ControllerEvent::RunCompleted { run_id, output } => {
                let current = self.active.as_ref().map(|active| active.run_id);
                if current == Some(run_id) {
                    debug!(run_id, bytes = output.len(), "run completed");
                    self.active = None;
                    self.state.adopt_output(output);
                    let _ = self.update_tx.send(PipelineEvent::OutputUpdated {
                        output: self.state.last_output().to_string(),
                    });
                } else {
                    debug!(run_id, "dropping result of superseded run");
                }
            }
            ControllerEvent::RerunRequested { tag } => {
                // Read and branch with no mutation in between.
                if tag == self.state.sequence() {
                    self.start_run();
                } else {
                    debug!(tag, live = self.state.sequence(), "stale rerun request");
                }
            }
            ControllerEvent::Quit => {
                self.cancel_active();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Cancel the outstanding run, then start a new one over a snapshot of the stages.
    fn start_run(&mut self) {
        self.cancel_active();
        if self.state.is_awaiting_command() {
            return;
        }

        self.next_run_id += 1;
        let run_id = self.next_run_id;
        let cancel = CancellationToken::new();
        self.active = Some(ActiveRun {
            run_id,
            cancel: cancel.clone(),
        });

        let engine = PipelineEngine::new(self.state.stages().to_vec(), self.input.clone());
        let event_tx = self.event_tx.clone();
        debug!(run_id, stages = self.state.stages().len(), "run started");
        tokio::spawn(async move {
            if let Some(output) = engine.run(cancel.clone()).await {
                if !cancel.is_cancelled() {
                    let output = String::from_utf8_lossy(&output).into_owned();
                    let _ = event_tx.send(ControllerEvent::RunCompleted { run_id, output });
                }
            } else {
                debug!(run_id, "run cancelled");
            }
        });
        let _ = self.update_tx.send(PipelineEvent::RunStarted { run_id });
    }

    fn cancel_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }

    fn publish_stages(&self) {
        let _ = self.update_tx.send(PipelineEvent::StagesChanged {
            stages: self.state.stages().to_vec(),
            focus: self.state.focus(),
        });
    }
}

/// Drive the controller until `Quit` arrives or every sender is gone.
pub(crate) async fn run_controller(
    cfg: &PipelineConfig,
    input: Vec<u8>,
    event_tx: UnboundedSender<ControllerEvent>,
    mut event_rx: UnboundedReceiver<ControllerEvent>,
    update_tx: UnboundedSender<PipelineEvent>,
) -> Result<()> {
    let mut controller =
        PipelineController::new(cfg.seed.clone(), input, cfg.debounce, event_tx, update_tx);
    controller.start();

    while let Some(ev) = event_rx.recv().await {
        if controller.handle(ev).is_break() {
            break;
        }
    }
    controller.cancel_active();
    info!("controller stopped");
    Ok(())
}
