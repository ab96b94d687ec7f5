//! Inbound event model
//!
//! Button presses arrive as opaque colon-delimited tokens. They are decoded
//! exactly once, at the dispatcher boundary, into [`ActionToken`] variants;
//! engines route on the typed verb and never re-parse substrings. Unknown
//! verbs and unparsable payloads decode to [`ActionToken::Malformed`], which
//! the dispatcher logs and ignores.

use serde::{Deserialize, Serialize};

use crate::entities::{RequestId, UserId};
use crate::notifier::MessageRef;

/// Reference to an attached media object, opaque to the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef(pub String);

/// One inbound event from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// User the event originates from; the only session identifier there is
    pub sender: UserId,
    /// What arrived
    pub payload: EventPayload,
    /// For button presses, the outbound message the button was attached to.
    /// Engines edit that message in place when re-rendering menus.
    pub source: Option<MessageRef>,
}

impl InboundEvent {
    /// Typed text from the user
    pub fn text(sender: UserId, text: impl Into<String>) -> Self {
        Self { sender, payload: EventPayload::Text(text.into()), source: None }
    }

    /// Attached media
    pub fn media(sender: UserId, media: impl Into<String>) -> Self {
        Self { sender, payload: EventPayload::Media(MediaRef(media.into())), source: None }
    }

    /// Button press carrying a wire token
    pub fn action(sender: UserId, token: &str) -> Self {
        Self { sender, payload: EventPayload::Action(ActionToken::decode(token)), source: None }
    }

    /// Button press together with the message it was pressed on
    pub fn action_on(sender: UserId, token: &str, source: MessageRef) -> Self {
        Self {
            sender,
            payload: EventPayload::Action(ActionToken::decode(token)),
            source: Some(source),
        }
    }
}

/// Payload of an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// Typed text
    Text(String),
    /// Attached media
    Media(MediaRef),
    /// Button press, already decoded
    Action(ActionToken),
}

/// Top-level menu entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuAction {
    /// Start the request-intake workflow
    NewRequest,
    /// Start the equipment-action workflow
    Equipment,
    /// Show the paged equipment listing
    EquipmentList,
    /// Show the support dashboard
    Support,
}

/// Equipment operations selectable from the action menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquipAction {
    /// Hand equipment to a courier
    Assign,
    /// Take equipment back into stock
    Return,
    /// File a repair ticket for it
    Repair,
}

/// Decoded button-press token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionToken {
    /// Top-level menu selection
    Menu(MenuAction),
    /// Intake: category chosen by index into the configured enumeration
    Category(usize),
    /// Intake: priority chosen by index
    Priority(usize),
    /// Intake: subcategory chosen by index
    Subcategory(usize),
    /// Intake: finalize without (more) photos
    PhotoSkip,
    /// Intake: finalize with the photos collected so far
    PhotoConfirm,
    /// Intake: cancel the draft
    IntakeCancel,
    /// Equipment: action chosen from the menu
    EquipChoice(EquipAction),
    /// Equipment: file the repair ticket without a photo
    EquipSkipPhoto,
    /// Equipment: cancel the draft
    EquipCancel,
    /// Equipment listing: go to page
    EquipPage(usize),
    /// Request dashboard: go to page
    RequestPage(usize),
    /// Close the current listing view
    CloseView,
    /// Support: open a request card
    RequestCard(RequestId),
    /// Support: ask the owner a question about a request
    AskQuestion(RequestId),
    /// Support: reply to a question about a request
    AnswerQuestion(RequestId),
    /// Unknown verb or unparsable payload; ignored by the dispatcher
    Malformed(String),
}

impl ActionToken {
    /// Decode a wire token of the form `verb`, `verb:payload`, or
    /// `verb:scope:payload`.
    pub fn decode(raw: &str) -> Self {
        let mut parts = raw.splitn(3, ':');
        let verb = parts.next().unwrap_or_default();
        let arg = parts.next();
        let rest = parts.next();

        let token = match (verb, arg, rest) {
            ("menu", Some("intake"), None) => Some(Self::Menu(MenuAction::NewRequest)),
            ("menu", Some("equipment"), None) => Some(Self::Menu(MenuAction::Equipment)),
            ("menu", Some("list"), None) => Some(Self::Menu(MenuAction::EquipmentList)),
            ("menu", Some("support"), None) => Some(Self::Menu(MenuAction::Support)),
            ("cat", Some(i), None) => i.parse().ok().map(Self::Category),
            ("prio", Some(i), None) => i.parse().ok().map(Self::Priority),
            ("sub", Some(i), None) => i.parse().ok().map(Self::Subcategory),
            ("photo", Some("skip"), None) => Some(Self::PhotoSkip),
            ("photo", Some("done"), None) => Some(Self::PhotoConfirm),
            ("intake", Some("cancel"), None) => Some(Self::IntakeCancel),
            ("eq", Some("assign"), None) => Some(Self::EquipChoice(EquipAction::Assign)),
            ("eq", Some("return"), None) => Some(Self::EquipChoice(EquipAction::Return)),
            ("eq", Some("repair"), None) => Some(Self::EquipChoice(EquipAction::Repair)),
            ("eq", Some("skip_photo"), None) => Some(Self::EquipSkipPhoto),
            ("eq", Some("cancel"), None) => Some(Self::EquipCancel),
            ("page", Some("eq"), Some(n)) => n.parse().ok().map(Self::EquipPage),
            ("page", Some("req"), Some(n)) => n.parse().ok().map(Self::RequestPage),
            ("close", None, None) => Some(Self::CloseView),
            ("req", Some("card"), Some(id)) => {
                id.parse().ok().map(|id| Self::RequestCard(RequestId(id)))
            }
            ("req", Some("ask"), Some(id)) => {
                id.parse().ok().map(|id| Self::AskQuestion(RequestId(id)))
            }
            ("req", Some("answer"), Some(id)) => {
                id.parse().ok().map(|id| Self::AnswerQuestion(RequestId(id)))
            }
            _ => None,
        };

        token.unwrap_or_else(|| Self::Malformed(raw.to_string()))
    }

    /// Encode back to the wire form used in button callbacks
    pub fn encode(&self) -> String {
        match self {
            Self::Menu(MenuAction::NewRequest) => "menu:intake".into(),
            Self::Menu(MenuAction::Equipment) => "menu:equipment".into(),
            Self::Menu(MenuAction::EquipmentList) => "menu:list".into(),
            Self::Menu(MenuAction::Support) => "menu:support".into(),
            Self::Category(i) => format!("cat:{i}"),
            Self::Priority(i) => format!("prio:{i}"),
            Self::Subcategory(i) => format!("sub:{i}"),
            Self::PhotoSkip => "photo:skip".into(),
            Self::PhotoConfirm => "photo:done".into(),
            Self::IntakeCancel => "intake:cancel".into(),
            Self::EquipChoice(EquipAction::Assign) => "eq:assign".into(),
            Self::EquipChoice(EquipAction::Return) => "eq:return".into(),
            Self::EquipChoice(EquipAction::Repair) => "eq:repair".into(),
            Self::EquipSkipPhoto => "eq:skip_photo".into(),
            Self::EquipCancel => "eq:cancel".into(),
            Self::EquipPage(n) => format!("page:eq:{n}"),
            Self::RequestPage(n) => format!("page:req:{n}"),
            Self::CloseView => "close".into(),
            Self::RequestCard(id) => format!("req:card:{id}"),
            Self::AskQuestion(id) => format!("req:ask:{id}"),
            Self::AnswerQuestion(id) => format!("req:answer:{id}"),
            Self::Malformed(raw) => raw.clone(),
        }
    }
}
