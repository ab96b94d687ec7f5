//! Event dispatcher
//!
//! The single entry point: the embedder decodes nothing and routes nothing,
//! it hands every inbound event to [`Dispatcher::dispatch`]. Button tokens
//! are decoded into [`ActionToken`] before they get here; the dispatcher
//! routes on the typed verb, and text/media events are offered to the
//! engines in a fixed order until one consumes them. Errors the user can
//! act on are reported back as messages; everything else is logged.

use std::sync::Arc;
use std::time::Duration;

use crate::config::DeskConfig;
use crate::draft_store::DraftStore;
use crate::entities::UserId;
use crate::errors::{DeskError, DeskResult};
use crate::events::{ActionToken, EventPayload, InboundEvent, MenuAction};
use crate::notifier::{send_best_effort, Button, MessageRef, Notifier};
use crate::repository::EntityRepository;
use crate::workflow::{EquipmentEngine, IntakeEngine, SupportEngine};

/// Routes inbound events to the workflow engines
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    drafts: Arc<DraftStore>,
    config: Arc<DeskConfig>,
    repo: Arc<dyn EntityRepository>,
    intake: IntakeEngine,
    equipment: EquipmentEngine,
    support: SupportEngine,
}

impl Dispatcher {
    /// Wire up the engines over shared seams
    pub fn new(
        repo: Arc<dyn EntityRepository>,
        notifier: Arc<dyn Notifier>,
        config: Arc<DeskConfig>,
    ) -> Self {
        let drafts = Arc::new(DraftStore::new());
        let intake = IntakeEngine::new(
            Arc::clone(&repo),
            Arc::clone(&notifier),
            Arc::clone(&drafts),
            Arc::clone(&config),
        );
        let equipment = EquipmentEngine::new(
            Arc::clone(&repo),
            Arc::clone(&notifier),
            Arc::clone(&drafts),
            Arc::clone(&config),
        );
        let support =
            SupportEngine::new(Arc::clone(&repo), Arc::clone(&notifier), Arc::clone(&config));
        Self { notifier, drafts, config, repo, intake, equipment, support }
    }

    /// Handle one inbound event. Recoverable failures are reported to the
    /// sender as messages; the call itself only fails on programming errors.
    pub async fn dispatch(&self, event: InboundEvent) -> DeskResult<()> {
        let sender = event.sender;
        match self.route(event).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.report(sender, e).await;
                Ok(())
            }
        }
    }

    /// Drop drafts older than the configured TTL. The embedder calls this on
    /// whatever schedule it likes; a zero TTL disables eviction.
    pub fn evict_stale_drafts(&self) -> usize {
        if self.config.draft_ttl_secs == 0 {
            return 0;
        }
        self.drafts.evict_stale(Duration::from_secs(self.config.draft_ttl_secs))
    }

    async fn route(&self, event: InboundEvent) -> DeskResult<()> {
        let user = event.sender;
        match event.payload {
            EventPayload::Action(token) => self.route_action(user, token, event.source).await,
            EventPayload::Text(text) => self.route_text(user, &text).await,
            EventPayload::Media(media) => {
                if self.intake.on_media(user, &media).await? {
                    return Ok(());
                }
                if self.equipment.on_media(user, &media).await? {
                    return Ok(());
                }
                tracing::debug!(%user, "media with no workflow waiting for it");
                Ok(())
            }
        }
    }

    async fn route_action(
        &self,
        user: UserId,
        token: ActionToken,
        source: Option<MessageRef>,
    ) -> DeskResult<()> {
        match &token {
            ActionToken::Menu(MenuAction::NewRequest) => self.intake.start(user).await,
            ActionToken::Menu(MenuAction::Equipment) => self.equipment.start(user).await,
            ActionToken::Menu(MenuAction::EquipmentList) => {
                self.equipment.list_view(user, 0, source).await
            }
            ActionToken::Menu(MenuAction::Support) => {
                self.support.dashboard(user, 0, source).await
            }
            ActionToken::EquipPage(n) => self.equipment.list_view(user, *n, source).await,
            ActionToken::RequestPage(n) => self.support.dashboard(user, *n, source).await,
            ActionToken::CloseView => {
                if let Some(msg) = source {
                    if let Err(e) = self.notifier.clear_buttons(msg).await {
                        tracing::warn!(%user, error = %e, "failed to close a view");
                    }
                }
                Ok(())
            }
            ActionToken::RequestCard(id) => self.support.card(user, *id, source).await,
            ActionToken::AskQuestion(id) => self.support.ask(user, *id).await,
            ActionToken::AnswerQuestion(id) => self.support.answer_prompt(user, *id).await,
            ActionToken::Category(_)
            | ActionToken::Priority(_)
            | ActionToken::Subcategory(_)
            | ActionToken::PhotoSkip
            | ActionToken::PhotoConfirm
            | ActionToken::IntakeCancel => self.intake.on_action(user, &token, source).await,
            ActionToken::EquipChoice(_)
            | ActionToken::EquipSkipPhoto
            | ActionToken::EquipCancel => self.equipment.on_action(user, &token, source).await,
            ActionToken::Malformed(raw) => {
                tracing::warn!(%user, raw, "malformed action token ignored");
                Ok(())
            }
        }
    }

    async fn route_text(&self, user: UserId, text: &str) -> DeskResult<()> {
        if let Some(command) = text.trim().strip_prefix('/') {
            return self.route_command(user, command).await;
        }
        // Offer the text to the engines in a fixed order; the armed support
        // half-flows outrank in-flight drafts.
        if self.support.on_text(user, text).await? {
            return Ok(());
        }
        if self.intake.on_text(user, text).await? {
            return Ok(());
        }
        if self.equipment.on_text(user, text).await? {
            return Ok(());
        }
        // Nothing is waiting for text; fall back to the menu.
        self.top_menu(user).await
    }

    async fn route_command(&self, user: UserId, command: &str) -> DeskResult<()> {
        let mut words = command.split_whitespace();
        match words.next() {
            Some("start") | Some("help") => {
                self.repo.ensure_user(user, "").await?;
                self.top_menu(user).await
            }
            Some("add_equipment") => {
                let Some(eq_id) = words.next() else {
                    send_best_effort(
                        self.notifier.as_ref(),
                        user,
                        "Usage: /add_equipment <id> [type]",
                        vec![],
                    )
                    .await;
                    return Ok(());
                };
                let type_label = words.next().unwrap_or("unknown");
                let eq = self.equipment.add_equipment(user, eq_id, type_label).await?;
                send_best_effort(
                    self.notifier.as_ref(),
                    user,
                    &format!("✅ Equipment {} registered.", eq.eq_id),
                    vec![],
                )
                .await;
                Ok(())
            }
            other => {
                tracing::debug!(%user, command = ?other, "unknown command");
                self.top_menu(user).await
            }
        }
    }

    async fn top_menu(&self, user: UserId) -> DeskResult<()> {
        let mut buttons = vec![
            Button::new("📝 New request", ActionToken::Menu(MenuAction::NewRequest)),
            Button::new("🚲 Equipment actions", ActionToken::Menu(MenuAction::Equipment)),
            Button::new("📋 Equipment list", ActionToken::Menu(MenuAction::EquipmentList)),
        ];
        if self.config.is_support(user) {
            buttons.push(Button::new("🛟 Support dashboard", ActionToken::Menu(MenuAction::Support)));
        }
        send_best_effort(self.notifier.as_ref(), user, "What would you like to do?", buttons)
            .await;
        Ok(())
    }

    /// Translate a routing error into a message the sender can act on.
    async fn report(&self, user: UserId, error: DeskError) {
        let text = match &error {
            e if e.is_infrastructure() => {
                tracing::error!(%user, error = %e, "storage unavailable");
                "⚠️ Temporary failure, please try again.".to_string()
            }
            e if e.is_stale_draft() => "This menu has expired.".to_string(),
            DeskError::PermissionDenied(_) => {
                tracing::warn!(%user, error = %error, "denied");
                "⛔ You are not allowed to do that.".to_string()
            }
            DeskError::DuplicateEquipment(eq_id) => {
                format!("⚠️ Equipment {eq_id} already exists.")
            }
            DeskError::NotFound { entity, key } => {
                format!("Not found: {entity} {key}.")
            }
            e => {
                tracing::warn!(%user, error = %e, "unhandled routing error");
                return;
            }
        };
        send_best_effort(self.notifier.as_ref(), user, &text, vec![]).await;
    }
}
