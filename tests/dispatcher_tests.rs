//! Routing behavior of the dispatcher itself

use std::sync::Arc;

use opsdesk::{
    DeskConfig, Dispatcher, EntityRepository, InMemoryRepository, InboundEvent, RecordingNotifier,
    UserId,
};

const ADMIN: UserId = UserId(900);

fn desk() -> (Dispatcher, InMemoryRepository, RecordingNotifier) {
    let repo = InMemoryRepository::new();
    let notifier = RecordingNotifier::new();
    let dispatcher = Dispatcher::new(
        Arc::new(repo.clone()),
        Arc::new(notifier.clone()),
        Arc::new(DeskConfig {
            admin_id: ADMIN,
            support_admins: vec![ADMIN],
            ..DeskConfig::default()
        }),
    );
    (dispatcher, repo, notifier)
}

#[tokio::test]
async fn test_start_registers_user_and_shows_menu() {
    let (desk, repo, notifier) = desk();
    let user = UserId(5);

    assert!(repo.user(user).await.unwrap().is_none());
    desk.dispatch(InboundEvent::text(user, "/start")).await.unwrap();

    assert!(repo.user(user).await.unwrap().is_some());
    let menu = notifier.last().unwrap();
    assert!(menu.text.contains("What would you like to do?"));
    // Plain users do not see the support entry
    assert_eq!(menu.buttons.len(), 3);
}

#[tokio::test]
async fn test_support_users_see_the_dashboard_entry() {
    let (desk, _repo, notifier) = desk();
    desk.dispatch(InboundEvent::text(ADMIN, "/start")).await.unwrap();
    let menu = notifier.last().unwrap();
    assert_eq!(menu.buttons.len(), 4);
    assert!(menu.buttons.iter().any(|b| b.label.contains("Support")));
}

#[tokio::test]
async fn test_malformed_tokens_are_silently_dropped() {
    let (desk, repo, notifier) = desk();

    for raw in ["bogus", "cat:many", "page:eq:x", "menu:nothing", ""] {
        desk.dispatch(InboundEvent::action(UserId(5), raw)).await.unwrap();
    }
    assert_eq!(notifier.count(), 0);
    assert_eq!(repo.request_count(), 0);
}

#[tokio::test]
async fn test_unarmed_text_and_media_fall_through() {
    let (desk, _repo, notifier) = desk();
    let user = UserId(5);

    desk.dispatch(InboundEvent::text(user, "hello there")).await.unwrap();
    assert!(notifier.last().unwrap().text.contains("What would you like to do?"));

    let before = notifier.count();
    desk.dispatch(InboundEvent::media(user, "stray-photo")).await.unwrap();
    assert_eq!(notifier.count(), before, "stray media produces no output");
}

#[tokio::test]
async fn test_close_view_clears_buttons() {
    let (desk, repo, notifier) = desk();
    repo.insert_equipment("0001", "bike").await.unwrap();

    desk.dispatch(InboundEvent::action(UserId(5), "menu:list")).await.unwrap();
    let listing = notifier.last().unwrap();
    assert!(!listing.buttons.is_empty());

    desk.dispatch(InboundEvent::action_on(UserId(5), "close", listing.msg_ref)).await.unwrap();
    let closed = notifier
        .sent()
        .into_iter()
        .find(|m| m.msg_ref == listing.msg_ref)
        .unwrap();
    assert!(closed.buttons.is_empty());
}

#[tokio::test]
async fn test_navigation_press_edits_in_place() {
    let (desk, repo, notifier) = desk();
    for i in 0..12 {
        repo.insert_equipment(&format!("{i:04}"), "bike").await.unwrap();
    }

    desk.dispatch(InboundEvent::action(UserId(5), "menu:list")).await.unwrap();
    let listing = notifier.last().unwrap();
    assert!(listing.text.contains("page 1/2"));
    let count_after_first = notifier.count();

    desk.dispatch(InboundEvent::action_on(UserId(5), "page:eq:1", listing.msg_ref))
        .await
        .unwrap();
    // Same message rewritten, no new message sent
    assert_eq!(notifier.count(), count_after_first);
    let edited = notifier
        .sent()
        .into_iter()
        .find(|m| m.msg_ref == listing.msg_ref)
        .unwrap();
    assert!(edited.text.contains("page 2/2"));
}

#[tokio::test]
async fn test_users_run_independent_drafts() {
    let (desk, repo, notifier) = desk();
    let alice = UserId(5);
    let bob = UserId(6);

    desk.dispatch(InboundEvent::action(alice, "menu:intake")).await.unwrap();
    desk.dispatch(InboundEvent::action(alice, "cat:0")).await.unwrap();

    // Bob's text must not land in Alice's draft
    desk.dispatch(InboundEvent::text(bob, "this is not a title")).await.unwrap();
    assert!(notifier
        .sent_to(bob)
        .last()
        .unwrap()
        .text
        .contains("What would you like to do?"));

    desk.dispatch(InboundEvent::text(alice, "Broken lamp")).await.unwrap();
    desk.dispatch(InboundEvent::action(alice, "prio:0")).await.unwrap();
    desk.dispatch(InboundEvent::text(alice, "flickers")).await.unwrap();
    desk.dispatch(InboundEvent::action(alice, "sub:0")).await.unwrap();
    desk.dispatch(InboundEvent::action(alice, "photo:skip")).await.unwrap();

    assert_eq!(repo.request_count(), 1);
    let req = repo.list_active_requests().await.unwrap().remove(0);
    assert_eq!(req.user_id, alice);
    assert_eq!(req.title, "Broken lamp");
}

#[tokio::test]
async fn test_concurrent_drafts_of_different_kinds() {
    let (desk, repo, _notifier) = desk();
    repo.insert_equipment("0001", "bike").await.unwrap();
    let user = UserId(5);

    // An intake draft and an equipment draft coexist for the same user;
    // text goes to whichever step is waiting for it, intake first.
    desk.dispatch(InboundEvent::action(user, "menu:equipment")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "eq:return")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "menu:intake")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "cat:0")).await.unwrap();

    desk.dispatch(InboundEvent::text(user, "Broken lamp")).await.unwrap();
    // The intake draft consumed the title; the equipment draft still waits
    desk.dispatch(InboundEvent::action(user, "intake:cancel")).await.unwrap();
    desk.dispatch(InboundEvent::text(user, "0001")).await.unwrap();

    let eq = repo.equipment_by_eq_id("0001").await.unwrap().unwrap();
    assert_eq!(
        eq.status,
        opsdesk::EquipmentStatus::InStock,
        "return on in-stock equipment stays in stock"
    );
    assert_eq!(repo.request_count(), 0);
}

#[tokio::test]
async fn test_stale_draft_eviction() {
    let (desk, repo, notifier) = desk();
    let user = UserId(5);

    desk.dispatch(InboundEvent::action(user, "menu:intake")).await.unwrap();
    // Default config has no TTL, so nothing is evicted
    assert_eq!(desk.evict_stale_drafts(), 0);

    desk.dispatch(InboundEvent::action(user, "cat:0")).await.unwrap();
    assert!(notifier.last().unwrap().text.contains("Enter a title"));
    assert_eq!(repo.request_count(), 0);
}
