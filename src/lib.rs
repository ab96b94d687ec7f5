//! # opsdesk
//!
//! Conversational workflow core for a small operations desk.
//!
//! Staff interact through discrete inbound events (typed text, attached
//! media, button presses); the core tracks one draft per (user, workflow)
//! pair, walks each draft through an explicit step machine, and commits
//! exactly one atomic write per completed workflow:
//! - **Request intake**: category, title, priority, description,
//!   subcategory, then any number of photos, filed as one `Open` request
//! - **Equipment actions**: hand to courier, return to stock, or file a
//!   repair ticket, each with its own short branch
//! - **Support threads**: a dashboard of active requests plus one-shot
//!   question/answer exchanges between support and request owners
//!
//! ## Design Principles
//!
//! 1. **Typed routing**: button tokens are decoded once at the boundary
//!    into an enum; nothing downstream parses strings
//! 2. **One draft per key**: starting a workflow replaces any incomplete
//!    draft of the same kind, and generation-stamped handles turn late
//!    events into a recoverable stale signal instead of a race
//! 3. **Atomic terminal writes**: every workflow ends in a single
//!    repository call, never observable as partially applied
//! 4. **Best-effort delivery**: notifications never roll back a committed
//!    write; failures are logged and the write stands
//!
//! Delivery and storage are seams: implement [`Notifier`] and
//! [`EntityRepository`] for the real transport and database, or use
//! [`RecordingNotifier`] and [`InMemoryRepository`] in tests.

#![warn(missing_docs)]

mod config;
mod dispatcher;
mod draft_store;
mod entities;
mod errors;
mod events;
mod notifier;
mod pagination;
mod repository;
mod state_machine;
pub mod workflow;

// Re-export core types
pub use config::DeskConfig;
pub use dispatcher::Dispatcher;
pub use draft_store::{DraftHandle, DraftState, DraftStore, WorkflowKind};
pub use entities::{
    Equipment, EquipmentStatus, Message, Request, RequestId, RequestStatus, User, UserId,
};
pub use errors::{DeskError, DeskResult};
pub use events::{ActionToken, EquipAction, EventPayload, InboundEvent, MediaRef, MenuAction};
pub use notifier::{Button, MessageRef, Notifier, RecordingNotifier, SentMessage};
pub use pagination::{nav_buttons, paginate, render, Page};
pub use repository::{EntityRepository, InMemoryRepository, NewRequest};
pub use state_machine::{transition, WorkflowState};
