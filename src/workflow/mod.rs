//! Workflow engines
//!
//! One engine per conversational workflow. Each consumes inbound events the
//! dispatcher routes to it, validates input, advances or terminates the
//! draft, and on terminal success performs exactly one repository write.

pub mod equipment;
pub mod intake;
pub mod support;

pub use equipment::{EquipmentDraft, EquipmentEngine, EquipStep};
pub use intake::{IntakeDraft, IntakeEngine, IntakeStep};
pub use support::SupportEngine;
