//! Error types for desk operations

use thiserror::Error;

use crate::draft_store::WorkflowKind;
use crate::entities::UserId;

/// Errors that can occur while processing inbound events
#[derive(Debug, Clone, Error)]
pub enum DeskError {
    /// The referenced in-flight workflow no longer exists (raced, expired,
    /// or already finalized). Recovered locally by informing the user.
    #[error("stale draft for user {user} in workflow {kind:?}")]
    StaleDraft {
        /// User the draft belonged to
        user: UserId,
        /// Workflow kind of the vanished draft
        kind: WorkflowKind,
    },

    /// Referenced entity does not exist
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Type of entity that was looked up
        entity: &'static str,
        /// Key that was searched for
        key: String,
    },

    /// Malformed numeric field, empty required text, or out-of-range
    /// enumerated selection
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Actor is not authorized for an admin-only action
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Durable store unreachable. Fatal to the current terminal write; the
    /// draft is left in place so the user can retry.
    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(String),

    /// Administrative add with an equipment id that already exists
    #[error("equipment already registered: {0}")]
    DuplicateEquipment(String),

    /// Outbound delivery failure. Best-effort; never rolls back a committed
    /// repository write.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Result type for desk operations
pub type DeskResult<T> = Result<T, DeskError>;

impl DeskError {
    /// Validation-class errors are handled inside the workflow engine that
    /// detected them and never propagate to the dispatcher.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DeskError::InvalidInput(_)
                | DeskError::NotFound { .. }
                | DeskError::DuplicateEquipment(_)
        )
    }

    /// Infrastructure-class errors propagate up and are reported to the user
    /// as a transient failure while preserving draft state for retry.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, DeskError::RepositoryUnavailable(_))
    }

    /// Check if this is the stale-draft signal
    pub fn is_stale_draft(&self) -> bool {
        matches!(self, DeskError::StaleDraft { .. })
    }
}
