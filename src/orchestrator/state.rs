//! Per-request workflow state machine.
//!
//! `Classified` is reachable only from `IdentityResolved`; there is no
//! path from `Received` to classification that skips identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ErrorKind, OrchestratorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowState {
    Received,
    IdentityResolved,
    Classified,
    Persisted,
    Notified,
    Reported,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_advance_to(&self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        match (*self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Received, IdentityResolved | Persisted | Reported | Completed) => true,
            (IdentityResolved, Classified | Persisted | Notified | Reported | Completed) => true,
            (Classified, Persisted) => true,
            (Persisted, Notified | Reported | Completed) => true,
            (Notified, Reported | Completed) => true,
            (Reported, Completed) => true,
            _ => false,
        }
    }
}

/// One request's walk through the states.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub request_id: Uuid,
    trace: Vec<WorkflowState>,
}

impl Workflow {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            trace: vec![WorkflowState::Received],
        }
    }

    pub fn current(&self) -> WorkflowState {
        self.trace
            .last()
            .copied()
            .unwrap_or(WorkflowState::Received)
    }

    pub fn trace(&self) -> &[WorkflowState] {
        &self.trace
    }

    pub fn advance(&mut self, next: WorkflowState) -> Result<(), OrchestratorError> {
        let current = self.current();
        if !current.can_advance_to(next) {
            tracing::error!(
                request_id = %self.request_id,
                from = ?current,
                to = ?next,
                "Illegal workflow transition"
            );
            return Err(OrchestratorError::new(
                ErrorKind::Internal,
                "The request could not be processed",
            ));
        }
        tracing::debug!(request_id = %self.request_id, from = ?current, to = ?next, "Transition");
        self.trace.push(next);
        Ok(())
    }

    /// Move to `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.current().is_terminal() {
            tracing::debug!(request_id = %self.request_id, from = ?self.current(), "Transition to Failed");
            self.trace.push(WorkflowState::Failed);
        }
    }

    pub fn into_trace(self) -> Vec<WorkflowState> {
        self.trace
    }
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}
