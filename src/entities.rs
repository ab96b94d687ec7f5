//! Durable entities owned by the entity repository
//!
//! These rows are mutated only through the workflow engines' terminal writes
//! or administrative commands. Workflow engines read a snapshot and propose
//! writes; they never cache entities across events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identity of a desk user. Identities come from the inbound
/// transport; the repository creates a `User` row lazily the first time an
/// identity is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Auto-assigned request identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A desk user (courier or support staff)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Transport-level identity, unique
    pub id: UserId,
    /// Display name, may be empty for lazily created rows
    pub name: String,
    /// Role tag, defaults to courier
    pub role: String,
}

impl User {
    /// Create a user row with the default courier role
    pub fn courier(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: "courier".to_string(),
        }
    }
}

/// Lifecycle status of a piece of equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    /// Stored at the warehouse
    InStock,
    /// Handed out to a courier
    WithCourier,
    /// Flagged for repair
    NeedRepair,
}

/// A physical piece of equipment tracked by the desk
///
/// Invariant: `assigned_to` is `Some` iff `status == WithCourier`. All status
/// mutations go through [`Equipment::apply_status`], which enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    /// Internal auto id
    pub id: i64,
    /// External equipment id, unique (printed on the asset label)
    pub eq_id: String,
    /// Type label, e.g. "bike"
    pub type_label: String,
    /// Current lifecycle status
    pub status: EquipmentStatus,
    /// Courier holding the equipment, meaningful only when `WithCourier`
    pub assigned_to: Option<UserId>,
}

impl Equipment {
    /// Apply a status change, keeping the assignee consistent with it.
    ///
    /// Any assignee passed alongside a non-courier status is dropped rather
    /// than stored, so the invariant holds no matter what the caller sends.
    pub fn apply_status(&mut self, status: EquipmentStatus, assignee: Option<UserId>) {
        self.status = status;
        self.assigned_to = match status {
            EquipmentStatus::WithCourier => assignee,
            _ => None,
        };
    }
}

/// Lifecycle status of a support request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Freshly filed, not yet picked up
    Open,
    /// Being worked by support
    InProgress,
    /// Support is waiting on the owner's answer
    NeedInfo,
    /// Resolved
    Closed,
}

impl RequestStatus {
    /// Statuses shown on the support dashboard
    pub fn is_active(self) -> bool {
        !matches!(self, RequestStatus::Closed)
    }

    /// Lowercase label used in listings
    pub fn label(self) -> &'static str {
        match self {
            RequestStatus::Open => "open",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::NeedInfo => "need_info",
            RequestStatus::Closed => "closed",
        }
    }
}

/// A filed support request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Auto id assigned by the repository on insert
    pub id: RequestId,
    /// Owning user
    pub user_id: UserId,
    /// Category label, one of the configured enumeration
    pub category: String,
    /// Optional subcategory refinement
    pub subcategory: Option<String>,
    /// Short title
    pub title: String,
    /// Free-form description
    pub description: String,
    /// Priority label, one of the configured enumeration
    pub priority: String,
    /// Ordered photo references, possibly empty
    pub photos: Vec<String>,
    /// Current status; starts `Open`, changed only by the support thread
    pub status: RequestStatus,
    /// When the request was filed
    pub created_at: DateTime<Utc>,
}

/// One message in a support thread. Append-only; never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Auto id assigned by the repository on insert
    pub id: i64,
    /// Request the message belongs to, if any
    pub request_id: Option<RequestId>,
    /// Sending user
    pub from_user: UserId,
    /// Receiving user
    pub to_user: UserId,
    /// Body text
    pub text: String,
    /// When the message was appended
    pub created_at: DateTime<Utc>,
}
