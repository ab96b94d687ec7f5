//! Entity repository seam
//!
//! Durable entities live behind [`EntityRepository`]. Every method is one
//! atomic commit: the compound operations (assign, return, request creation,
//! thread recording) exist so that each workflow's terminal write is exactly
//! one repository call, never observable as partially applied. Store errors
//! surface as [`DeskError::RepositoryUnavailable`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;

use crate::entities::{
    Equipment, EquipmentStatus, Message, Request, RequestId, RequestStatus, User, UserId,
};
use crate::errors::{DeskError, DeskResult};

/// Fields of a request about to be persisted. The repository assigns the id,
/// the `Open` status, and the creation timestamp.
#[derive(Debug, Clone)]
pub struct NewRequest {
    /// Owning user; their row is created in the same commit if absent
    pub user_id: UserId,
    /// Category label
    pub category: String,
    /// Optional subcategory
    pub subcategory: Option<String>,
    /// Short title
    pub title: String,
    /// Free-form description
    pub description: String,
    /// Priority label
    pub priority: String,
    /// Collected photo references
    pub photos: Vec<String>,
    /// When set, the same commit moves this equipment row to `NeedRepair`.
    /// Only the repair workflow sets it, and only under the configured policy.
    pub flag_equipment: Option<i64>,
}

/// Durable store for users, equipment, requests, and threaded messages
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Look up a user row
    async fn user(&self, id: UserId) -> DeskResult<Option<User>>;

    /// Create a user row with the courier role if absent; returns the row
    async fn ensure_user(&self, id: UserId, name: &str) -> DeskResult<User>;

    /// Register a new piece of equipment in stock.
    /// Fails with [`DeskError::DuplicateEquipment`] if `eq_id` exists.
    async fn insert_equipment(&self, eq_id: &str, type_label: &str) -> DeskResult<Equipment>;

    /// Look up equipment by its external id
    async fn equipment_by_eq_id(&self, eq_id: &str) -> DeskResult<Option<Equipment>>;

    /// All equipment in registration order
    async fn list_equipment(&self) -> DeskResult<Vec<Equipment>>;

    /// Terminal write of the ASSIGN branch: create the courier row if absent
    /// and set `WithCourier` plus the assignee, in one commit.
    async fn assign_equipment(&self, equipment_id: i64, courier: UserId) -> DeskResult<Equipment>;

    /// Terminal write of the RETURN branch: set `InStock` and clear the
    /// assignee, in one commit.
    async fn return_equipment(&self, equipment_id: i64) -> DeskResult<Equipment>;

    /// Terminal write of request intake and the repair branch: create the
    /// owner row if absent and insert the request (status `Open`), in one
    /// commit. Returns the persisted request with its assigned id.
    async fn create_request(&self, new: NewRequest) -> DeskResult<Request>;

    /// Look up a request
    async fn request(&self, id: RequestId) -> DeskResult<Option<Request>>;

    /// Requests with status in {Open, NeedInfo, InProgress}, newest first
    async fn list_active_requests(&self) -> DeskResult<Vec<Request>>;

    /// Terminal write of a support half-flow: append one message per
    /// recipient and set the request status, in one commit. Returns the
    /// appended messages.
    async fn record_thread(
        &self,
        request_id: RequestId,
        from: UserId,
        recipients: &[UserId],
        text: &str,
        new_status: RequestStatus,
    ) -> DeskResult<Vec<Message>>;
}

#[derive(Debug, Default)]
struct Tables {
    users: IndexMap<UserId, User>,
    equipment: IndexMap<i64, Equipment>,
    requests: IndexMap<i64, Request>,
    messages: IndexMap<i64, Message>,
    next_equipment_id: i64,
    next_request_id: i64,
    next_message_id: i64,
}

impl Tables {
    fn ensure_user(&mut self, id: UserId, name: &str) -> User {
        self.users
            .entry(id)
            .or_insert_with(|| User::courier(id, name))
            .clone()
    }
}

/// In-memory repository
///
/// Tables are insertion-ordered so listings page deterministically. All
/// mutation happens under one lock, which makes every trait method a single
/// all-or-nothing commit. An injectable outage flag lets tests exercise the
/// `RepositoryUnavailable` paths.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<RwLock<Tables>>,
    fail_next: Arc<AtomicBool>,
}

impl InMemoryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next repository call fail with `RepositoryUnavailable`
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check_outage(&self) -> DeskResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(DeskError::RepositoryUnavailable("injected outage".into()));
        }
        Ok(())
    }

    /// Number of persisted requests, for test assertions
    pub fn request_count(&self) -> usize {
        self.tables.read().unwrap().requests.len()
    }

    /// All messages appended so far, for test assertions
    pub fn messages(&self) -> Vec<Message> {
        self.tables.read().unwrap().messages.values().cloned().collect()
    }
}

#[async_trait]
impl EntityRepository for InMemoryRepository {
    async fn user(&self, id: UserId) -> DeskResult<Option<User>> {
        self.check_outage()?;
        Ok(self.tables.read().unwrap().users.get(&id).cloned())
    }

    async fn ensure_user(&self, id: UserId, name: &str) -> DeskResult<User> {
        self.check_outage()?;
        Ok(self.tables.write().unwrap().ensure_user(id, name))
    }

    async fn insert_equipment(&self, eq_id: &str, type_label: &str) -> DeskResult<Equipment> {
        self.check_outage()?;
        let mut tables = self.tables.write().unwrap();
        if tables.equipment.values().any(|eq| eq.eq_id == eq_id) {
            return Err(DeskError::DuplicateEquipment(eq_id.to_string()));
        }
        tables.next_equipment_id += 1;
        let eq = Equipment {
            id: tables.next_equipment_id,
            eq_id: eq_id.to_string(),
            type_label: type_label.to_string(),
            status: EquipmentStatus::InStock,
            assigned_to: None,
        };
        tables.equipment.insert(eq.id, eq.clone());
        Ok(eq)
    }

    async fn equipment_by_eq_id(&self, eq_id: &str) -> DeskResult<Option<Equipment>> {
        self.check_outage()?;
        Ok(self
            .tables
            .read()
            .unwrap()
            .equipment
            .values()
            .find(|eq| eq.eq_id == eq_id)
            .cloned())
    }

    async fn list_equipment(&self) -> DeskResult<Vec<Equipment>> {
        self.check_outage()?;
        Ok(self.tables.read().unwrap().equipment.values().cloned().collect())
    }

    async fn assign_equipment(&self, equipment_id: i64, courier: UserId) -> DeskResult<Equipment> {
        self.check_outage()?;
        let mut tables = self.tables.write().unwrap();
        tables.ensure_user(courier, "");
        let eq = tables.equipment.get_mut(&equipment_id).ok_or(DeskError::NotFound {
            entity: "equipment",
            key: equipment_id.to_string(),
        })?;
        eq.apply_status(EquipmentStatus::WithCourier, Some(courier));
        Ok(eq.clone())
    }

    async fn return_equipment(&self, equipment_id: i64) -> DeskResult<Equipment> {
        self.check_outage()?;
        let mut tables = self.tables.write().unwrap();
        let eq = tables.equipment.get_mut(&equipment_id).ok_or(DeskError::NotFound {
            entity: "equipment",
            key: equipment_id.to_string(),
        })?;
        eq.apply_status(EquipmentStatus::InStock, None);
        Ok(eq.clone())
    }

    async fn create_request(&self, new: NewRequest) -> DeskResult<Request> {
        self.check_outage()?;
        let mut tables = self.tables.write().unwrap();
        if let Some(eq_internal_id) = new.flag_equipment {
            // Validate before touching anything so the commit stays atomic
            if !tables.equipment.contains_key(&eq_internal_id) {
                return Err(DeskError::NotFound {
                    entity: "equipment",
                    key: eq_internal_id.to_string(),
                });
            }
        }
        tables.ensure_user(new.user_id, "");
        tables.next_request_id += 1;
        let request = Request {
            id: RequestId(tables.next_request_id),
            user_id: new.user_id,
            category: new.category,
            subcategory: new.subcategory,
            title: new.title,
            description: new.description,
            priority: new.priority,
            photos: new.photos,
            status: RequestStatus::Open,
            created_at: Utc::now(),
        };
        tables.requests.insert(request.id.0, request.clone());
        if let Some(eq_internal_id) = new.flag_equipment {
            if let Some(eq) = tables.equipment.get_mut(&eq_internal_id) {
                eq.apply_status(EquipmentStatus::NeedRepair, None);
            }
        }
        Ok(request)
    }

    async fn request(&self, id: RequestId) -> DeskResult<Option<Request>> {
        self.check_outage()?;
        Ok(self.tables.read().unwrap().requests.get(&id.0).cloned())
    }

    async fn list_active_requests(&self) -> DeskResult<Vec<Request>> {
        self.check_outage()?;
        let mut items: Vec<Request> = self
            .tables
            .read()
            .unwrap()
            .requests
            .values()
            .filter(|r| r.status.is_active())
            .cloned()
            .collect();
        // Newest first; the id breaks ties between same-instant inserts
        items.sort_by(|a, b| (b.created_at, b.id.0).cmp(&(a.created_at, a.id.0)));
        Ok(items)
    }

    async fn record_thread(
        &self,
        request_id: RequestId,
        from: UserId,
        recipients: &[UserId],
        text: &str,
        new_status: RequestStatus,
    ) -> DeskResult<Vec<Message>> {
        self.check_outage()?;
        let mut tables = self.tables.write().unwrap();
        if !tables.requests.contains_key(&request_id.0) {
            return Err(DeskError::NotFound {
                entity: "request",
                key: request_id.to_string(),
            });
        }
        let mut appended = Vec::with_capacity(recipients.len());
        for &to in recipients {
            tables.next_message_id += 1;
            let msg = Message {
                id: tables.next_message_id,
                request_id: Some(request_id),
                from_user: from,
                to_user: to,
                text: text.to_string(),
                created_at: Utc::now(),
            };
            tables.messages.insert(msg.id, msg.clone());
            appended.push(msg);
        }
        if let Some(req) = tables.requests.get_mut(&request_id.0) {
            req.status = new_status;
        }
        Ok(appended)
    }
}
