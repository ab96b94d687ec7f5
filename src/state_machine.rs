//! Step-transition plumbing shared by the workflow engines
//!
//! Each workflow's steps are an enum implementing [`WorkflowState`]; the
//! enum itself declares which transitions are legal. Engines move a draft
//! forward through [`transition`], so an illegal hop is caught at the seam
//! instead of silently corrupting the accumulator.

use std::fmt::Debug;

use crate::errors::{DeskError, DeskResult};

/// Trait for types that can be used as workflow steps
pub trait WorkflowState: Debug + Clone + PartialEq + Eq + Send + Sync {
    /// Name of this step for logging
    fn name(&self) -> &'static str;

    /// Check if this is a terminal step
    fn is_terminal(&self) -> bool {
        false
    }

    /// All steps legally reachable from this one. Re-entering the same step
    /// (the photo loop) is always allowed and need not be listed.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Check if a transition to the target step is valid
    fn can_transition_to(&self, target: &Self) -> bool {
        target == self || self.valid_transitions().contains(target)
    }
}

/// Advance a step in place, rejecting illegal transitions.
///
/// Terminal steps accept no further transitions.
pub fn transition<S: WorkflowState>(step: &mut S, target: S) -> DeskResult<()> {
    if step.is_terminal() || !step.can_transition_to(&target) {
        return Err(DeskError::InvalidInput(format!(
            "illegal step transition {} -> {}",
            step.name(),
            target.name()
        )));
    }
    tracing::debug!(from = step.name(), to = target.name(), "workflow step");
    *step = target;
    Ok(())
}
