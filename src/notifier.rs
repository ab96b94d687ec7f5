//! Front-end notifier seam
//!
//! The core never talks to the delivery transport directly. Engines call
//! [`Notifier`] to send or edit outbound messages; delivery is best-effort
//! and never transactional with repository writes. A committed write whose
//! notification fails stays committed; the failure is logged and reported.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::UserId;
use crate::errors::DeskResult;
use crate::events::ActionToken;

/// Opaque handle to a delivered message, used for later edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub Uuid);

impl MessageRef {
    /// Mint a fresh reference
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageRef {
    fn default() -> Self {
        Self::new()
    }
}

/// One interactive button attached to an outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Visible label
    pub label: String,
    /// Token delivered back as an action event when pressed
    pub token: ActionToken,
}

impl Button {
    /// Build a button
    pub fn new(label: impl Into<String>, token: ActionToken) -> Self {
        Self { label: label.into(), token }
    }
}

/// Outward message-delivery channel, implemented by the embedder
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message with optional buttons; returns a reference usable
    /// for later edits
    async fn send(
        &self,
        recipient: UserId,
        text: &str,
        buttons: Vec<Button>,
    ) -> DeskResult<MessageRef>;

    /// Replace the text and buttons of a previously delivered message
    async fn edit(&self, msg: MessageRef, text: &str, buttons: Vec<Button>) -> DeskResult<()>;

    /// Remove the buttons from a previously delivered message
    async fn clear_buttons(&self, msg: MessageRef) -> DeskResult<()>;
}

/// One outbound message captured by [`RecordingNotifier`]
#[derive(Debug, Clone)]
pub struct SentMessage {
    /// Who the message went to
    pub recipient: UserId,
    /// Delivered text
    pub text: String,
    /// Buttons attached, possibly empty
    pub buttons: Vec<Button>,
    /// Reference assigned at send time
    pub msg_ref: MessageRef,
}

/// Recording notifier for tests and examples
///
/// Captures every outbound message so assertions can inspect what the
/// engines said and to whom. Edits rewrite the captured entry in place.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<SentMessage>>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured messages, in delivery order
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().unwrap().clone()
    }

    /// Captured messages addressed to one recipient
    pub fn sent_to(&self, recipient: UserId) -> Vec<SentMessage> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .filter(|m| m.recipient == recipient)
            .cloned()
            .collect()
    }

    /// The most recently delivered or edited message, if any
    pub fn last(&self) -> Option<SentMessage> {
        self.sent.read().unwrap().last().cloned()
    }

    /// Number of messages delivered so far
    pub fn count(&self) -> usize {
        self.sent.read().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        recipient: UserId,
        text: &str,
        buttons: Vec<Button>,
    ) -> DeskResult<MessageRef> {
        let msg_ref = MessageRef::new();
        self.sent.write().unwrap().push(SentMessage {
            recipient,
            text: text.to_string(),
            buttons,
            msg_ref,
        });
        Ok(msg_ref)
    }

    async fn edit(&self, msg: MessageRef, text: &str, buttons: Vec<Button>) -> DeskResult<()> {
        let mut sent = self.sent.write().unwrap();
        if let Some(entry) = sent.iter_mut().find(|m| m.msg_ref == msg) {
            entry.text = text.to_string();
            entry.buttons = buttons;
        }
        Ok(())
    }

    async fn clear_buttons(&self, msg: MessageRef) -> DeskResult<()> {
        let mut sent = self.sent.write().unwrap();
        if let Some(entry) = sent.iter_mut().find(|m| m.msg_ref == msg) {
            entry.buttons.clear();
        }
        Ok(())
    }
}

/// Deliver best-effort: a failure is logged and swallowed, never propagated.
/// Used for every notification that follows a committed repository write.
pub async fn send_best_effort(
    notifier: &dyn Notifier,
    recipient: UserId,
    text: &str,
    buttons: Vec<Button>,
) -> Option<MessageRef> {
    match notifier.send(recipient, text, buttons).await {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::warn!(%recipient, error = %e, "outbound delivery failed");
            None
        }
    }
}

/// Edit `source` in place when the triggering button press carried one,
/// otherwise send a fresh message. Best-effort either way.
pub async fn edit_or_send(
    notifier: &dyn Notifier,
    recipient: UserId,
    source: Option<MessageRef>,
    text: &str,
    buttons: Vec<Button>,
) -> Option<MessageRef> {
    if let Some(msg) = source {
        match notifier.edit(msg, text, buttons.clone()).await {
            Ok(()) => return Some(msg),
            Err(e) => {
                tracing::warn!(%recipient, error = %e, "edit failed, sending instead");
            }
        }
    }
    send_best_effort(notifier, recipient, text, buttons).await
}
