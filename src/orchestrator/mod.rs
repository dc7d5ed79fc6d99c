//! Application-level orchestration.
//!
//! This module owns the pipeline state and run lifecycle (debounced reruns,
//! structural reruns, cancellation). UI/CLI layers talk to it only through
//! `ControllerEvent`s in and `PipelineEvent`s out.

mod controller;
mod debounce;
mod state;

#[cfg(feature = "tui")]
pub(crate) use controller::run_controller;
pub(crate) use debounce::DEFAULT_QUIESCENCE;
