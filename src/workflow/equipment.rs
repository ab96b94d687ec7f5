//! Equipment-Action workflow
//!
//! One action menu, then an equipment id, then a branch per action:
//! RETURN commits immediately, ASSIGN collects a courier id, REPAIR collects
//! an issue description and an optional photo and files a repair ticket.
//! Filing a repair ticket does not change the equipment's status unless the
//! `repair_marks_equipment` policy is enabled; the desk has always treated
//! repair reporting as a ticket, not a status mutation.
//!
//! Also hosts the administrative `add_equipment` command and the paged
//! equipment listing.

use std::sync::Arc;

use crate::config::DeskConfig;
use crate::draft_store::{DraftHandle, DraftState, DraftStore, WorkflowKind};
use crate::entities::{Equipment, EquipmentStatus, UserId};
use crate::errors::{DeskError, DeskResult};
use crate::events::{ActionToken, EquipAction, MediaRef};
use crate::notifier::{edit_or_send, send_best_effort, Button, MessageRef, Notifier};
use crate::pagination::{nav_buttons, render};
use crate::repository::{EntityRepository, NewRequest};
use crate::state_machine::{transition, WorkflowState};

/// Steps of the equipment-action workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipStep {
    /// Waiting for an action button press
    AwaitingAction,
    /// Waiting for the equipment id text
    AwaitingEquipmentId,
    /// ASSIGN branch: waiting for the courier id text
    AwaitingCourierId,
    /// REPAIR branch: waiting for the issue description text
    AwaitingIssueDescription,
    /// REPAIR branch: waiting for a photo or an explicit skip
    AwaitingPhoto,
    /// Terminal: the write has been committed
    Done,
}

impl WorkflowState for EquipStep {
    fn name(&self) -> &'static str {
        match self {
            Self::AwaitingAction => "AwaitingAction",
            Self::AwaitingEquipmentId => "AwaitingEquipmentId",
            Self::AwaitingCourierId => "AwaitingCourierId",
            Self::AwaitingIssueDescription => "AwaitingIssueDescription",
            Self::AwaitingPhoto => "AwaitingPhoto",
            Self::Done => "Done",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            Self::AwaitingAction => vec![Self::AwaitingEquipmentId],
            // The branch point: RETURN goes straight to Done
            Self::AwaitingEquipmentId => {
                vec![Self::AwaitingCourierId, Self::AwaitingIssueDescription, Self::Done]
            }
            Self::AwaitingCourierId => vec![Self::Done],
            Self::AwaitingIssueDescription => vec![Self::AwaitingPhoto],
            Self::AwaitingPhoto => vec![Self::Done],
            Self::Done => vec![],
        }
    }
}

/// Accumulator of an in-flight equipment-action draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentDraft {
    /// Current step
    pub step: EquipStep,
    /// Chosen action
    pub action: Option<EquipAction>,
    /// Matched equipment: internal id plus external label
    pub equipment: Option<(i64, String)>,
    /// REPAIR branch: entered issue description
    pub issue: Option<String>,
}

impl EquipmentDraft {
    /// Fresh draft at the initial step
    pub fn new() -> Self {
        Self {
            step: EquipStep::AwaitingAction,
            action: None,
            equipment: None,
            issue: None,
        }
    }
}

impl Default for EquipmentDraft {
    fn default() -> Self {
        Self::new()
    }
}

/// Equipment-action workflow engine
pub struct EquipmentEngine {
    repo: Arc<dyn EntityRepository>,
    notifier: Arc<dyn Notifier>,
    drafts: Arc<DraftStore>,
    config: Arc<DeskConfig>,
}

impl EquipmentEngine {
    /// Wire up the engine
    pub fn new(
        repo: Arc<dyn EntityRepository>,
        notifier: Arc<dyn Notifier>,
        drafts: Arc<DraftStore>,
        config: Arc<DeskConfig>,
    ) -> Self {
        Self { repo, notifier, drafts, config }
    }

    fn draft(&self, user: UserId) -> Option<(DraftHandle, EquipmentDraft)> {
        match self.drafts.find(user, WorkflowKind::EquipmentAction) {
            Some((handle, DraftState::Equipment(draft))) => Some((handle, draft)),
            _ => None,
        }
    }

    /// Mutate the live draft in place under the store lock, so concurrent
    /// updates to the same draft compose instead of overwriting each other.
    fn update(
        &self,
        handle: &DraftHandle,
        f: impl FnOnce(&mut EquipmentDraft) -> DeskResult<()>,
    ) -> DeskResult<()> {
        self.drafts.advance(handle, |state| match state {
            DraftState::Equipment(draft) => f(draft),
            DraftState::Intake(_) => {
                Err(DeskError::StaleDraft { user: handle.user, kind: handle.kind })
            }
        })
    }

    /// Start (or restart) the workflow and render the action menu
    pub async fn start(&self, user: UserId) -> DeskResult<()> {
        self.drafts.begin(user, DraftState::Equipment(EquipmentDraft::new()));
        send_best_effort(
            self.notifier.as_ref(),
            user,
            "Choose an equipment action:",
            vec![
                Button::new("Hand to courier", ActionToken::EquipChoice(EquipAction::Assign)),
                Button::new("Return to stock", ActionToken::EquipChoice(EquipAction::Return)),
                Button::new("Needs repair", ActionToken::EquipChoice(EquipAction::Repair)),
                Button::new("❌ Cancel", ActionToken::EquipCancel),
            ],
        )
        .await;
        Ok(())
    }

    /// Handle a button press routed to this workflow
    pub async fn on_action(
        &self,
        user: UserId,
        token: &ActionToken,
        source: Option<MessageRef>,
    ) -> DeskResult<()> {
        let Some((handle, draft)) = self.draft(user) else {
            tracing::debug!(%user, ?token, "equipment press without a live draft");
            edit_or_send(
                self.notifier.as_ref(),
                user,
                source,
                "This menu has expired.",
                vec![],
            )
            .await;
            return Ok(());
        };

        match token {
            ActionToken::EquipCancel => {
                self.drafts.end(&handle)?;
                tracing::info!(%user, "equipment draft cancelled");
                edit_or_send(
                    self.notifier.as_ref(),
                    user,
                    source,
                    "Operation cancelled.",
                    vec![],
                )
                .await;
                Ok(())
            }
            ActionToken::EquipChoice(action) if draft.step == EquipStep::AwaitingAction => {
                self.update(&handle, |draft| {
                    transition(&mut draft.step, EquipStep::AwaitingEquipmentId)?;
                    draft.action = Some(*action);
                    Ok(())
                })?;
                edit_or_send(
                    self.notifier.as_ref(),
                    user,
                    source,
                    &format!("Action: {}\nEnter the equipment id:", action_label(*action)),
                    vec![],
                )
                .await;
                Ok(())
            }
            ActionToken::EquipSkipPhoto if draft.step == EquipStep::AwaitingPhoto => {
                self.file_repair_ticket(user, handle, draft, None, source).await
            }
            _ => {
                tracing::debug!(%user, ?token, step = draft.step.name(), "ignoring mismatched press");
                Ok(())
            }
        }
    }

    /// Handle typed text. Returns `false` when no equipment draft is
    /// waiting for text.
    pub async fn on_text(&self, user: UserId, text: &str) -> DeskResult<bool> {
        let Some((handle, draft)) = self.draft(user) else {
            return Ok(false);
        };
        let trimmed = text.trim();

        match draft.step {
            EquipStep::AwaitingEquipmentId => {
                let Some(equipment) = self.repo.equipment_by_eq_id(trimmed).await? else {
                    send_best_effort(
                        self.notifier.as_ref(),
                        user,
                        "Equipment not found. Try another id:",
                        vec![],
                    )
                    .await;
                    return Ok(true);
                };
                self.branch_on_action(user, handle, draft, equipment).await?;
                Ok(true)
            }
            EquipStep::AwaitingCourierId => {
                let Ok(courier) = trimmed.parse::<i64>() else {
                    // Accumulator untouched; only the prompt repeats
                    send_best_effort(
                        self.notifier.as_ref(),
                        user,
                        "The courier id must be a number. Enter the courier id:",
                        vec![],
                    )
                    .await;
                    return Ok(true);
                };
                let (equipment_id, eq_label) =
                    draft.equipment.clone().ok_or_else(|| {
                        DeskError::InvalidInput("courier step without equipment".into())
                    })?;
                self.repo.assign_equipment(equipment_id, UserId(courier)).await?;
                if let Err(e) = self.drafts.end(&handle) {
                    tracing::warn!(%user, error = %e, "draft vanished after terminal write");
                }
                tracing::info!(%user, eq_id = %eq_label, courier, "equipment assigned");
                send_best_effort(
                    self.notifier.as_ref(),
                    user,
                    &format!("✅ {eq_label} handed to courier #{courier}."),
                    vec![],
                )
                .await;
                Ok(true)
            }
            EquipStep::AwaitingIssueDescription => {
                if trimmed.is_empty() {
                    send_best_effort(
                        self.notifier.as_ref(),
                        user,
                        "The description cannot be empty. Describe the issue:",
                        vec![],
                    )
                    .await;
                    return Ok(true);
                }
                self.update(&handle, |draft| {
                    transition(&mut draft.step, EquipStep::AwaitingPhoto)?;
                    draft.issue = Some(trimmed.to_string());
                    Ok(())
                })?;
                send_best_effort(
                    self.notifier.as_ref(),
                    user,
                    "Attach a photo, or skip:",
                    vec![
                        Button::new("Skip photo", ActionToken::EquipSkipPhoto),
                        Button::new("❌ Cancel", ActionToken::EquipCancel),
                    ],
                )
                .await;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Handle attached media: the repair branch accepts one photo, which
    /// finalizes the ticket.
    pub async fn on_media(&self, user: UserId, media: &MediaRef) -> DeskResult<bool> {
        let Some((handle, draft)) = self.draft(user) else {
            return Ok(false);
        };
        if draft.step != EquipStep::AwaitingPhoto {
            return Ok(false);
        }
        self.file_repair_ticket(user, handle, draft, Some(media.0.clone()), None).await?;
        Ok(true)
    }

    /// After the equipment id matched: RETURN commits now, the other
    /// branches collect more input.
    async fn branch_on_action(
        &self,
        user: UserId,
        handle: DraftHandle,
        draft: EquipmentDraft,
        equipment: Equipment,
    ) -> DeskResult<()> {
        let action = draft.action.ok_or_else(|| {
            DeskError::InvalidInput("equipment id step without an action".into())
        })?;
        match action {
            EquipAction::Return => {
                self.repo.return_equipment(equipment.id).await?;
                if let Err(e) = self.drafts.end(&handle) {
                    tracing::warn!(%user, error = %e, "draft vanished after terminal write");
                }
                tracing::info!(%user, eq_id = %equipment.eq_id, "equipment returned to stock");
                send_best_effort(
                    self.notifier.as_ref(),
                    user,
                    &format!("✅ {} returned to stock.", equipment.eq_id),
                    vec![],
                )
                .await;
            }
            EquipAction::Assign => {
                self.update(&handle, |draft| {
                    transition(&mut draft.step, EquipStep::AwaitingCourierId)?;
                    draft.equipment = Some((equipment.id, equipment.eq_id.clone()));
                    Ok(())
                })?;
                send_best_effort(self.notifier.as_ref(), user, "Enter the courier id:", vec![])
                    .await;
            }
            EquipAction::Repair => {
                self.update(&handle, |draft| {
                    transition(&mut draft.step, EquipStep::AwaitingIssueDescription)?;
                    draft.equipment = Some((equipment.id, equipment.eq_id.clone()));
                    Ok(())
                })?;
                send_best_effort(
                    self.notifier.as_ref(),
                    user,
                    "Describe the issue:",
                    vec![],
                )
                .await;
            }
        }
        Ok(())
    }

    /// Terminal write of the REPAIR branch: file one repair request with
    /// zero or one photo. Equipment status is left alone unless the policy
    /// says otherwise.
    async fn file_repair_ticket(
        &self,
        user: UserId,
        handle: DraftHandle,
        draft: EquipmentDraft,
        photo: Option<String>,
        source: Option<MessageRef>,
    ) -> DeskResult<()> {
        let (equipment_id, eq_label) = draft
            .equipment
            .clone()
            .ok_or_else(|| DeskError::InvalidInput("photo step without equipment".into()))?;

        let request = self
            .repo
            .create_request(NewRequest {
                user_id: user,
                category: self.config.repair_category.clone(),
                subcategory: Some(eq_label.clone()),
                title: format!("Repair {eq_label}"),
                description: draft.issue.clone().unwrap_or_default(),
                priority: self.config.repair_priority.clone(),
                photos: photo.into_iter().collect(),
                flag_equipment: self.config.repair_marks_equipment.then_some(equipment_id),
            })
            .await?;

        if let Err(e) = self.drafts.end(&handle) {
            tracing::warn!(%user, error = %e, "draft vanished after terminal write");
        }
        tracing::info!(%user, eq_id = %eq_label, request = %request.id, "repair ticket filed");
        edit_or_send(
            self.notifier.as_ref(),
            user,
            source,
            &format!("✅ Repair ticket #{} filed for {eq_label}.", request.id),
            vec![],
        )
        .await;
        Ok(())
    }

    /// Administrative command: register new equipment in stock.
    /// Restricted to the configured administrator identity.
    pub async fn add_equipment(
        &self,
        caller: UserId,
        eq_id: &str,
        type_label: &str,
    ) -> DeskResult<Equipment> {
        if caller != self.config.admin_id {
            return Err(DeskError::PermissionDenied(format!(
                "user {caller} may not add equipment"
            )));
        }
        let equipment = self.repo.insert_equipment(eq_id, type_label).await?;
        tracing::info!(eq_id, type_label, "equipment registered");
        Ok(equipment)
    }

    /// Render one page of the equipment listing, editing `source` in place
    /// when the request came from a navigation press.
    pub async fn list_view(
        &self,
        user: UserId,
        page: usize,
        source: Option<MessageRef>,
    ) -> DeskResult<()> {
        let items = self.repo.list_equipment().await?;
        let (visible, page) = render(&items, page, self.config.page_size);

        let mut lines = Vec::with_capacity(visible.len());
        for eq in visible {
            lines.push(equipment_line(eq));
        }
        let body = if lines.is_empty() { "The list is empty.".to_string() } else { lines.join("\n") };
        let text = format!(
            "Equipment (page {}/{})\n\n{}",
            page.page + 1,
            page.total_pages,
            body
        );
        let buttons = nav_buttons(&page, ActionToken::EquipPage);
        edit_or_send(self.notifier.as_ref(), user, source, &text, buttons).await;
        Ok(())
    }
}

fn action_label(action: EquipAction) -> &'static str {
    match action {
        EquipAction::Assign => "hand to courier",
        EquipAction::Return => "return to stock",
        EquipAction::Repair => "needs repair",
    }
}

fn equipment_line(eq: &Equipment) -> String {
    match (eq.status, eq.assigned_to) {
        (EquipmentStatus::WithCourier, Some(courier)) => {
            format!("🚴 {} — with courier #{courier}", eq.eq_id)
        }
        (EquipmentStatus::NeedRepair, _) => format!("🛠 {} — needs repair", eq.eq_id),
        _ => format!("🟢 {} — in stock", eq.eq_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::entities::{Message, Request, RequestId, RequestStatus, User};
    use crate::notifier::RecordingNotifier;
    use crate::repository::InMemoryRepository;

    #[test]
    fn test_branch_point_edges() {
        let step = EquipStep::AwaitingEquipmentId;
        assert!(step.can_transition_to(&EquipStep::Done));
        assert!(step.can_transition_to(&EquipStep::AwaitingCourierId));
        assert!(step.can_transition_to(&EquipStep::AwaitingIssueDescription));
        assert!(!step.can_transition_to(&EquipStep::AwaitingPhoto));
    }

    #[test]
    fn test_repair_branch_requires_description_before_photo() {
        let mut step = EquipStep::AwaitingEquipmentId;
        assert!(transition(&mut step, EquipStep::AwaitingIssueDescription).is_ok());
        assert!(transition(&mut step, EquipStep::AwaitingPhoto).is_ok());
        assert!(transition(&mut step, EquipStep::Done).is_ok());
        assert!(step.is_terminal());
    }

    #[test]
    fn test_status_lines() {
        let eq = Equipment {
            id: 1,
            eq_id: "0001".into(),
            type_label: "bike".into(),
            status: EquipmentStatus::WithCourier,
            assigned_to: Some(UserId(42)),
        };
        assert_eq!(equipment_line(&eq), "🚴 0001 — with courier #42");
    }

    /// Repository that replaces the caller's draft while the RETURN write
    /// commits, reproducing a restart racing the terminal write.
    struct ReplacingRepo {
        inner: InMemoryRepository,
        drafts: Arc<DraftStore>,
        user: UserId,
    }

    #[async_trait]
    impl EntityRepository for ReplacingRepo {
        async fn user(&self, id: UserId) -> DeskResult<Option<User>> {
            self.inner.user(id).await
        }

        async fn ensure_user(&self, id: UserId, name: &str) -> DeskResult<User> {
            self.inner.ensure_user(id, name).await
        }

        async fn insert_equipment(&self, eq_id: &str, type_label: &str) -> DeskResult<Equipment> {
            self.inner.insert_equipment(eq_id, type_label).await
        }

        async fn equipment_by_eq_id(&self, eq_id: &str) -> DeskResult<Option<Equipment>> {
            self.inner.equipment_by_eq_id(eq_id).await
        }

        async fn list_equipment(&self) -> DeskResult<Vec<Equipment>> {
            self.inner.list_equipment().await
        }

        async fn assign_equipment(
            &self,
            equipment_id: i64,
            courier: UserId,
        ) -> DeskResult<Equipment> {
            self.inner.assign_equipment(equipment_id, courier).await
        }

        async fn return_equipment(&self, equipment_id: i64) -> DeskResult<Equipment> {
            let eq = self.inner.return_equipment(equipment_id).await?;
            self.drafts.begin(self.user, DraftState::Equipment(EquipmentDraft::new()));
            Ok(eq)
        }

        async fn create_request(&self, new: NewRequest) -> DeskResult<Request> {
            self.inner.create_request(new).await
        }

        async fn request(&self, id: RequestId) -> DeskResult<Option<Request>> {
            self.inner.request(id).await
        }

        async fn list_active_requests(&self) -> DeskResult<Vec<Request>> {
            self.inner.list_active_requests().await
        }

        async fn record_thread(
            &self,
            request_id: RequestId,
            from: UserId,
            recipients: &[UserId],
            text: &str,
            new_status: RequestStatus,
        ) -> DeskResult<Vec<Message>> {
            self.inner
                .record_thread(request_id, from, recipients, text, new_status)
                .await
        }
    }

    #[tokio::test]
    async fn test_commit_stands_when_draft_races_away() {
        let inner = InMemoryRepository::new();
        inner.insert_equipment("0001", "bike").await.unwrap();
        let drafts = Arc::new(DraftStore::new());
        let user = UserId(5);
        let repo = Arc::new(ReplacingRepo {
            inner: inner.clone(),
            drafts: Arc::clone(&drafts),
            user,
        });
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = EquipmentEngine::new(
            repo,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::clone(&drafts),
            Arc::new(DeskConfig::default()),
        );

        engine.start(user).await.unwrap();
        engine
            .on_action(user, &ActionToken::EquipChoice(EquipAction::Return), None)
            .await
            .unwrap();
        // The draft is replaced during the commit; the commit still stands
        // and the user sees success, not an expiry notice.
        assert!(engine.on_text(user, "0001").await.unwrap());

        let eq = inner.equipment_by_eq_id("0001").await.unwrap().unwrap();
        assert_eq!(eq.status, EquipmentStatus::InStock);
        assert!(notifier.last().unwrap().text.contains("returned to stock"));
    }
}
