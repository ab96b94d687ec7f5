//! Support threads
//!
//! Not a step machine: two one-shot half-flows over a shared dashboard.
//! A support admin asks the owner of a request a question (request moves to
//! NeedInfo), the owner answers back to every support admin (request moves
//! to InProgress). Each half-flow is armed by a single per-actor marker;
//! arming again before the text arrives retargets the marker, last write
//! wins.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use futures::future::join_all;

use crate::config::DeskConfig;
use crate::entities::{Request, RequestId, RequestStatus, UserId};
use crate::errors::{DeskError, DeskResult};
use crate::events::ActionToken;
use crate::notifier::{edit_or_send, send_best_effort, Button, MessageRef, Notifier};
use crate::pagination::{nav_buttons, render};
use crate::repository::EntityRepository;

// Category labels longer than this are shortened in dashboard buttons
const CATEGORY_WIDTH: usize = 18;
const CATEGORY_TRUNC: usize = 15;

/// Support dashboard and question/answer threads
pub struct SupportEngine {
    repo: Arc<dyn EntityRepository>,
    notifier: Arc<dyn Notifier>,
    config: Arc<DeskConfig>,
    pending_question: RwLock<HashMap<UserId, RequestId>>,
    pending_answer: RwLock<HashMap<UserId, RequestId>>,
}

impl SupportEngine {
    /// Wire up the engine
    pub fn new(
        repo: Arc<dyn EntityRepository>,
        notifier: Arc<dyn Notifier>,
        config: Arc<DeskConfig>,
    ) -> Self {
        Self {
            repo,
            notifier,
            config,
            pending_question: RwLock::new(HashMap::new()),
            pending_answer: RwLock::new(HashMap::new()),
        }
    }

    fn require_support(&self, user: UserId) -> DeskResult<()> {
        if self.config.is_support(user) {
            Ok(())
        } else {
            Err(DeskError::PermissionDenied(format!(
                "user {user} is not on the support list"
            )))
        }
    }

    /// Render one page of the active-request dashboard, editing `source`
    /// in place on navigation presses.
    pub async fn dashboard(
        &self,
        user: UserId,
        page: usize,
        source: Option<MessageRef>,
    ) -> DeskResult<()> {
        self.require_support(user)?;
        let items = self.repo.list_active_requests().await?;
        let (visible, page) = render(&items, page, self.config.page_size);

        let text = if items.is_empty() {
            "No active requests.".to_string()
        } else {
            format!("Active requests (page {}/{})", page.page + 1, page.total_pages)
        };
        let mut buttons: Vec<Button> = visible
            .iter()
            .map(|r| Button::new(dashboard_line(r), ActionToken::RequestCard(r.id)))
            .collect();
        buttons.extend(nav_buttons(&page, ActionToken::RequestPage));

        edit_or_send(self.notifier.as_ref(), user, source, &text, buttons).await;
        Ok(())
    }

    /// Show one request in full, with the ask-question entry point
    pub async fn card(
        &self,
        user: UserId,
        request_id: RequestId,
        source: Option<MessageRef>,
    ) -> DeskResult<()> {
        self.require_support(user)?;
        let Some(request) = self.repo.request(request_id).await? else {
            edit_or_send(
                self.notifier.as_ref(),
                user,
                source,
                &format!("Request #{request_id} no longer exists."),
                vec![],
            )
            .await;
            return Ok(());
        };

        let text = card_text(&request);
        let buttons = vec![
            Button::new("Ask the requester", ActionToken::AskQuestion(request.id)),
            Button::new("✖ Close", ActionToken::CloseView),
        ];
        edit_or_send(self.notifier.as_ref(), user, source, &text, buttons).await;
        Ok(())
    }

    /// Arm the question half-flow: the admin's next text goes to the owner
    /// of this request. Arming again retargets the marker.
    pub async fn ask(&self, admin: UserId, request_id: RequestId) -> DeskResult<()> {
        self.require_support(admin)?;
        if self.repo.request(request_id).await?.is_none() {
            return Err(DeskError::NotFound {
                entity: "request",
                key: request_id.to_string(),
            });
        }
        self.pending_question.write().unwrap().insert(admin, request_id);
        send_best_effort(
            self.notifier.as_ref(),
            admin,
            &format!("Type your question about request #{request_id}:"),
            vec![],
        )
        .await;
        Ok(())
    }

    /// Arm the answer half-flow: the owner's next text fans out to every
    /// support admin. Only the owner of the request may answer.
    pub async fn answer_prompt(&self, user: UserId, request_id: RequestId) -> DeskResult<()> {
        let Some(request) = self.repo.request(request_id).await? else {
            return Err(DeskError::NotFound {
                entity: "request",
                key: request_id.to_string(),
            });
        };
        if request.user_id != user {
            return Err(DeskError::PermissionDenied(format!(
                "user {user} does not own request #{request_id}"
            )));
        }
        self.pending_answer.write().unwrap().insert(user, request_id);
        send_best_effort(
            self.notifier.as_ref(),
            user,
            &format!("Type your answer for request #{request_id}:"),
            vec![],
        )
        .await;
        Ok(())
    }

    /// Handle typed text. Returns `false` when neither half-flow is armed
    /// for this user.
    pub async fn on_text(&self, user: UserId, text: &str) -> DeskResult<bool> {
        // Peek without removing: the marker survives empty input and
        // repository outages so the sender can retry.
        let question = self.pending_question.read().unwrap().get(&user).copied();
        if let Some(request_id) = question {
            self.deliver_question(user, request_id, text).await?;
            return Ok(true);
        }
        let answer = self.pending_answer.read().unwrap().get(&user).copied();
        if let Some(request_id) = answer {
            self.deliver_answer(user, request_id, text).await?;
            return Ok(true);
        }
        Ok(false)
    }

    async fn deliver_question(
        &self,
        admin: UserId,
        request_id: RequestId,
        text: &str,
    ) -> DeskResult<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            send_best_effort(
                self.notifier.as_ref(),
                admin,
                "The question cannot be empty. Type your question:",
                vec![],
            )
            .await;
            return Ok(());
        }
        let Some(request) = self.repo.request(request_id).await? else {
            self.pending_question.write().unwrap().remove(&admin);
            send_best_effort(
                self.notifier.as_ref(),
                admin,
                &format!("Request #{request_id} no longer exists."),
                vec![],
            )
            .await;
            return Ok(());
        };

        self.repo
            .record_thread(request_id, admin, &[request.user_id], trimmed, RequestStatus::NeedInfo)
            .await?;
        self.pending_question.write().unwrap().remove(&admin);
        tracing::info!(%admin, request = %request_id, "question recorded");

        send_best_effort(
            self.notifier.as_ref(),
            request.user_id,
            &format!("❓ Question about your request #{request_id}:\n{trimmed}"),
            vec![Button::new("Reply", ActionToken::AnswerQuestion(request_id))],
        )
        .await;
        send_best_effort(
            self.notifier.as_ref(),
            admin,
            &format!("✅ Question sent for request #{request_id}."),
            vec![],
        )
        .await;
        Ok(())
    }

    async fn deliver_answer(
        &self,
        owner: UserId,
        request_id: RequestId,
        text: &str,
    ) -> DeskResult<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            send_best_effort(
                self.notifier.as_ref(),
                owner,
                "The answer cannot be empty. Type your answer:",
                vec![],
            )
            .await;
            return Ok(());
        }
        if self.repo.request(request_id).await?.is_none() {
            self.pending_answer.write().unwrap().remove(&owner);
            send_best_effort(
                self.notifier.as_ref(),
                owner,
                &format!("Request #{request_id} no longer exists."),
                vec![],
            )
            .await;
            return Ok(());
        }

        self.repo
            .record_thread(
                request_id,
                owner,
                &self.config.support_admins,
                trimmed,
                RequestStatus::InProgress,
            )
            .await?;
        self.pending_answer.write().unwrap().remove(&owner);
        tracing::info!(%owner, request = %request_id, "answer recorded");

        let body = format!("💬 Answer on request #{request_id}:\n{trimmed}");
        join_all(self.config.support_admins.iter().map(|&admin| {
            send_best_effort(self.notifier.as_ref(), admin, &body, vec![])
        }))
        .await;
        send_best_effort(
            self.notifier.as_ref(),
            owner,
            &format!("✅ Answer sent for request #{request_id}."),
            vec![],
        )
        .await;
        Ok(())
    }
}

fn dashboard_line(request: &Request) -> String {
    let category = if request.category.chars().count() > CATEGORY_WIDTH {
        let head: String = request.category.chars().take(CATEGORY_TRUNC).collect();
        format!("{head}…")
    } else {
        request.category.clone()
    };
    format!("#{} • {} • {}", request.id, category, request.status.label())
}

fn card_text(request: &Request) -> String {
    let mut text = format!(
        "Request #{}\nCategory: {}",
        request.id, request.category
    );
    if let Some(sub) = &request.subcategory {
        text.push_str(&format!("\nSubcategory: {sub}"));
    }
    text.push_str(&format!(
        "\nTitle: {}\nPriority: {}\nStatus: {}\nFrom: #{}\nPhotos: {}\n\n{}",
        request.title,
        request.priority,
        request.status.label(),
        request.user_id,
        request.photos.len(),
        request.description,
    ));
    text
}
