//! Stage trait: the unit of work run against the tray

use crate::error::StageError;
use crate::tray::Tray;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

/// Outcome of a stage that did not fail
///
/// A fatal failure is the `Err` side of [`Stage::process`]; together these
/// give the three states continue / stop this chain / stop the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Hand over to the next stage in the chain
    Continue,
    /// Skip the remaining stages of this sub-pipeline for the current frame
    StopChain,
}

impl StageOutcome {
    pub fn from_success(success: bool) -> Self {
        if success {
            StageOutcome::Continue
        } else {
            StageOutcome::StopChain
        }
    }

    pub fn is_continue(self) -> bool {
        self == StageOutcome::Continue
    }
}

/// Core stage trait - every pipeline stage implements this
pub trait Stage: Send {
    /// Name the stage was registered and configured under
    fn name(&self) -> &str;

    /// Stage body. Reads inputs from the tray by key, writes outputs back.
    ///
    /// The default does nothing and continues.
    fn process(&mut self, _tray: &mut Tray) -> Result<StageOutcome, StageError> {
        Ok(StageOutcome::Continue)
    }
}

/// Run `stage` inside the failure boundary
///
/// Every stage of a sub-pipeline goes through here. Errors and panics are
/// reported with the stage name and returned as `Err`, which stops the whole
/// pipeline run.
pub fn run_stage(stage: &mut dyn Stage, tray: &mut Tray) -> Result<StageOutcome, StageError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| stage.process(tray)));

    let err = match result {
        Ok(Ok(outcome)) => return Ok(outcome),
        Ok(Err(err)) => err,
        Err(payload) => StageError::Panicked(panic_message(payload.as_ref())),
    };

    error!(
        stage = stage.name(),
        "Pipeline stage {} has exited prematurely: {}. Stopping pipeline.",
        stage.name(),
        err
    );
    Err(err)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
