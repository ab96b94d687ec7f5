//! Request-Intake workflow
//!
//! Six steps, in order: category (button), title (text), priority (button),
//! description (text), subcategory (button), then the photo stage where any
//! number of photos may be attached before a skip or confirm press
//! finalizes. The terminal write persists exactly one request with status
//! `Open` and notifies the configured support identities with the assigned
//! id. Cancellation at any non-terminal step deletes the draft and writes
//! nothing.

use std::sync::Arc;

use crate::config::DeskConfig;
use crate::draft_store::{DraftHandle, DraftState, DraftStore, WorkflowKind};
use crate::entities::UserId;
use crate::errors::{DeskError, DeskResult};
use crate::events::{ActionToken, MediaRef};
use crate::notifier::{edit_or_send, send_best_effort, Button, MessageRef, Notifier};
use crate::repository::{EntityRepository, NewRequest};
use crate::state_machine::{transition, WorkflowState};

/// Steps of the request-intake workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeStep {
    /// Waiting for a category button press
    AwaitingCategory,
    /// Waiting for the title text
    AwaitingTitle,
    /// Waiting for a priority button press
    AwaitingPriority,
    /// Waiting for the description text
    AwaitingDescription,
    /// Waiting for a subcategory button press
    AwaitingSubcategory,
    /// Photo stage: media events append and re-enter this step; skip or
    /// confirm finalizes with however many photos were collected
    AwaitingPhotoOrFinalize,
    /// Terminal: the request has been persisted
    Finalized,
}

impl WorkflowState for IntakeStep {
    fn name(&self) -> &'static str {
        match self {
            Self::AwaitingCategory => "AwaitingCategory",
            Self::AwaitingTitle => "AwaitingTitle",
            Self::AwaitingPriority => "AwaitingPriority",
            Self::AwaitingDescription => "AwaitingDescription",
            Self::AwaitingSubcategory => "AwaitingSubcategory",
            Self::AwaitingPhotoOrFinalize => "AwaitingPhotoOrFinalize",
            Self::Finalized => "Finalized",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            Self::AwaitingCategory => vec![Self::AwaitingTitle],
            Self::AwaitingTitle => vec![Self::AwaitingPriority],
            Self::AwaitingPriority => vec![Self::AwaitingDescription],
            Self::AwaitingDescription => vec![Self::AwaitingSubcategory],
            Self::AwaitingSubcategory => vec![Self::AwaitingPhotoOrFinalize],
            Self::AwaitingPhotoOrFinalize => vec![Self::Finalized],
            Self::Finalized => vec![],
        }
    }
}

/// Accumulator of an in-flight intake draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeDraft {
    /// Current step
    pub step: IntakeStep,
    /// Chosen category label
    pub category: Option<String>,
    /// Entered title
    pub title: Option<String>,
    /// Chosen priority label
    pub priority: Option<String>,
    /// Entered description
    pub description: Option<String>,
    /// Chosen subcategory label
    pub subcategory: Option<String>,
    /// Photo references collected at the photo stage
    pub photos: Vec<String>,
}

impl IntakeDraft {
    /// Fresh draft at the initial step
    pub fn new() -> Self {
        Self {
            step: IntakeStep::AwaitingCategory,
            category: None,
            title: None,
            priority: None,
            description: None,
            subcategory: None,
            photos: Vec::new(),
        }
    }
}

impl Default for IntakeDraft {
    fn default() -> Self {
        Self::new()
    }
}

/// Request-intake workflow engine
pub struct IntakeEngine {
    repo: Arc<dyn EntityRepository>,
    notifier: Arc<dyn Notifier>,
    drafts: Arc<DraftStore>,
    config: Arc<DeskConfig>,
}

impl IntakeEngine {
    /// Wire up the engine
    pub fn new(
        repo: Arc<dyn EntityRepository>,
        notifier: Arc<dyn Notifier>,
        drafts: Arc<DraftStore>,
        config: Arc<DeskConfig>,
    ) -> Self {
        Self { repo, notifier, drafts, config }
    }

    fn draft(&self, user: UserId) -> Option<(DraftHandle, IntakeDraft)> {
        match self.drafts.find(user, WorkflowKind::RequestIntake) {
            Some((handle, DraftState::Intake(draft))) => Some((handle, draft)),
            _ => None,
        }
    }

    /// Mutate the live draft in place under the store lock, so concurrent
    /// updates to the same draft compose instead of overwriting each other.
    fn update(
        &self,
        handle: &DraftHandle,
        f: impl FnOnce(&mut IntakeDraft) -> DeskResult<()>,
    ) -> DeskResult<()> {
        self.drafts.advance(handle, |state| match state {
            DraftState::Intake(draft) => f(draft),
            DraftState::Equipment(_) => {
                Err(DeskError::StaleDraft { user: handle.user, kind: handle.kind })
            }
        })
    }

    /// Start (or restart) the workflow for `user` and render the category
    /// menu. Any incomplete intake draft the user had is discarded.
    pub async fn start(&self, user: UserId) -> DeskResult<()> {
        self.drafts.begin(user, DraftState::Intake(IntakeDraft::new()));

        let mut buttons: Vec<Button> = self
            .config
            .categories
            .iter()
            .enumerate()
            .map(|(i, cat)| Button::new(cat.clone(), ActionToken::Category(i)))
            .collect();
        buttons.push(Button::new("❌ Cancel", ActionToken::IntakeCancel));
        send_best_effort(
            self.notifier.as_ref(),
            user,
            "Choose a request category:",
            buttons,
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
            tracing::debug!(%user, ?token, "intake press without a live draft");
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
            ActionToken::IntakeCancel => self.cancel(user, handle, source).await,
            ActionToken::Category(i) if draft.step == IntakeStep::AwaitingCategory => {
                let Some(category) = self.config.categories.get(*i).cloned() else {
                    tracing::warn!(%user, index = i, "category index out of range");
                    return Ok(());
                };
                self.update(&handle, |draft| {
                    transition(&mut draft.step, IntakeStep::AwaitingTitle)?;
                    draft.category = Some(category.clone());
                    Ok(())
                })?;
                edit_or_send(
                    self.notifier.as_ref(),
                    user,
                    source,
                    &format!("Category: {category}\nEnter a title:"),
                    vec![],
                )
                .await;
                Ok(())
            }
            ActionToken::Priority(i) if draft.step == IntakeStep::AwaitingPriority => {
                let Some(priority) = self.config.priorities.get(*i).cloned() else {
                    tracing::warn!(%user, index = i, "priority index out of range");
                    return Ok(());
                };
                self.update(&handle, |draft| {
                    transition(&mut draft.step, IntakeStep::AwaitingDescription)?;
                    draft.priority = Some(priority.clone());
                    Ok(())
                })?;
                edit_or_send(
                    self.notifier.as_ref(),
                    user,
                    source,
                    &format!("Priority: {priority}\nDescribe the problem:"),
                    vec![],
                )
                .await;
                Ok(())
            }
            ActionToken::Subcategory(i) if draft.step == IntakeStep::AwaitingSubcategory => {
                let Some(subcategory) = self.config.subcategories.get(*i).cloned() else {
                    tracing::warn!(%user, index = i, "subcategory index out of range");
                    return Ok(());
                };
                self.update(&handle, |draft| {
                    transition(&mut draft.step, IntakeStep::AwaitingPhotoOrFinalize)?;
                    draft.subcategory = Some(subcategory.clone());
                    Ok(())
                })?;
                edit_or_send(
                    self.notifier.as_ref(),
                    user,
                    source,
                    &format!("Subcategory: {subcategory}\nAttach photos, or finish:"),
                    photo_stage_buttons(),
                )
                .await;
                Ok(())
            }
            ActionToken::PhotoSkip | ActionToken::PhotoConfirm
                if draft.step == IntakeStep::AwaitingPhotoOrFinalize =>
            {
                self.finalize(user, handle, draft, source).await
            }
            _ => {
                // A press that does not match the current step: a late or
                // duplicated callback. Ignore it.
                tracing::debug!(%user, ?token, step = draft.step.name(), "ignoring mismatched press");
                Ok(())
            }
        }
    }

    /// Handle typed text. Returns `false` when no intake draft is waiting
    /// for text so the dispatcher can try the next consumer.
    pub async fn on_text(&self, user: UserId, text: &str) -> DeskResult<bool> {
        let Some((handle, draft)) = self.draft(user) else {
            return Ok(false);
        };
        let trimmed = text.trim();

        match draft.step {
            IntakeStep::AwaitingTitle => {
                if trimmed.is_empty() {
                    send_best_effort(
                        self.notifier.as_ref(),
                        user,
                        "A title cannot be empty. Enter a title:",
                        vec![],
                    )
                    .await;
                    return Ok(true);
                }
                self.update(&handle, |draft| {
                    transition(&mut draft.step, IntakeStep::AwaitingPriority)?;
                    draft.title = Some(trimmed.to_string());
                    Ok(())
                })?;

                let mut buttons: Vec<Button> = self
                    .config
                    .priorities
                    .iter()
                    .enumerate()
                    .map(|(i, p)| Button::new(p.clone(), ActionToken::Priority(i)))
                    .collect();
                buttons.push(Button::new("❌ Cancel", ActionToken::IntakeCancel));
                send_best_effort(self.notifier.as_ref(), user, "Choose a priority:", buttons)
                    .await;
                Ok(true)
            }
            IntakeStep::AwaitingDescription => {
                if trimmed.is_empty() {
                    send_best_effort(
                        self.notifier.as_ref(),
                        user,
                        "A description cannot be empty. Describe the problem:",
                        vec![],
                    )
                    .await;
                    return Ok(true);
                }
                self.update(&handle, |draft| {
                    transition(&mut draft.step, IntakeStep::AwaitingSubcategory)?;
                    draft.description = Some(trimmed.to_string());
                    Ok(())
                })?;

                let mut buttons: Vec<Button> = self
                    .config
                    .subcategories
                    .iter()
                    .enumerate()
                    .map(|(i, s)| Button::new(s.clone(), ActionToken::Subcategory(i)))
                    .collect();
                buttons.push(Button::new("❌ Cancel", ActionToken::IntakeCancel));
                send_best_effort(self.notifier.as_ref(), user, "Narrow it down:", buttons).await;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Handle attached media. Each photo appends to the accumulator and
    /// re-enters the photo stage; zero photos is a valid outcome.
    pub async fn on_media(&self, user: UserId, media: &MediaRef) -> DeskResult<bool> {
        let Some((handle, draft)) = self.draft(user) else {
            return Ok(false);
        };
        if draft.step != IntakeStep::AwaitingPhotoOrFinalize {
            return Ok(false);
        }

        let mut count = 0;
        self.update(&handle, |draft| {
            draft.photos.push(media.0.clone());
            count = draft.photos.len();
            Ok(())
        })?;

        send_best_effort(
            self.notifier.as_ref(),
            user,
            &format!("Photo added ({count} attached). Add more, or finish:"),
            photo_stage_buttons(),
        )
        .await;
        Ok(true)
    }

    /// Terminal write: persist the request once, then notify support.
    async fn finalize(
        &self,
        user: UserId,
        handle: DraftHandle,
        draft: IntakeDraft,
        source: Option<MessageRef>,
    ) -> DeskResult<()> {
        // The repository call comes first: if the store is down the draft
        // stays in place and the user can press finish again.
        let request = self
            .repo
            .create_request(NewRequest {
                user_id: user,
                category: draft.category.clone().unwrap_or_default(),
                subcategory: draft.subcategory.clone(),
                title: draft.title.clone().unwrap_or_default(),
                description: draft.description.clone().unwrap_or_default(),
                priority: draft.priority.clone().unwrap_or_default(),
                photos: draft.photos.clone(),
                flag_equipment: None,
            })
            .await?;

        if let Err(e) = self.drafts.end(&handle) {
            // The write is committed; a raced cancel only means there is no
            // draft left to delete.
            tracing::warn!(%user, error = %e, "draft vanished after terminal write");
        }
        tracing::info!(%user, request = %request.id, "request filed");

        edit_or_send(
            self.notifier.as_ref(),
            user,
            source,
            &format!("✅ Request #{} created.", request.id),
            vec![],
        )
        .await;

        let summary = format!(
            "New request #{}\nCategory: {}\nTitle: {}\nPriority: {}",
            request.id, request.category, request.title, request.priority
        );
        for &admin in &self.config.support_admins {
            send_best_effort(self.notifier.as_ref(), admin, &summary, vec![]).await;
        }
        Ok(())
    }

    /// Explicit cancel: delete the draft, close the menu, write nothing.
    async fn cancel(
        &self,
        user: UserId,
        handle: DraftHandle,
        source: Option<MessageRef>,
    ) -> DeskResult<()> {
        self.drafts.end(&handle)?;
        tracing::info!(%user, "intake draft cancelled");
        edit_or_send(
            self.notifier.as_ref(),
            user,
            source,
            "❌ Request cancelled.",
            vec![],
        )
        .await;
        Ok(())
    }
}

fn photo_stage_buttons() -> Vec<Button> {
    vec![
        Button::new("Skip", ActionToken::PhotoSkip),
        Button::new("Done", ActionToken::PhotoConfirm),
        Button::new("❌ Cancel", ActionToken::IntakeCancel),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order() {
        let mut step = IntakeStep::AwaitingCategory;
        for next in [
            IntakeStep::AwaitingTitle,
            IntakeStep::AwaitingPriority,
            IntakeStep::AwaitingDescription,
            IntakeStep::AwaitingSubcategory,
            IntakeStep::AwaitingPhotoOrFinalize,
            IntakeStep::Finalized,
        ] {
            assert!(transition(&mut step, next).is_ok(), "expected edge into {next:?}");
        }
        assert!(step.is_terminal());
    }

    #[test]
    fn test_no_step_skipping() {
        let mut step = IntakeStep::AwaitingCategory;
        assert!(transition(&mut step, IntakeStep::AwaitingPriority).is_err());
        assert!(transition(&mut step, IntakeStep::Finalized).is_err());
        assert_eq!(step, IntakeStep::AwaitingCategory);
    }

    #[test]
    fn test_photo_stage_reenters_itself() {
        let step = IntakeStep::AwaitingPhotoOrFinalize;
        assert!(step.can_transition_to(&IntakeStep::AwaitingPhotoOrFinalize));
        assert!(step.can_transition_to(&IntakeStep::Finalized));
    }
}
