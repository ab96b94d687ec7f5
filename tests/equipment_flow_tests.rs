//! End-to-end equipment flows over the dispatcher

use std::sync::Arc;

use opsdesk::{
    DeskConfig, Dispatcher, EntityRepository, EquipmentStatus, InMemoryRepository, InboundEvent,
    RecordingNotifier, UserId,
};

const ADMIN: UserId = UserId(900);

fn desk_with(config: DeskConfig) -> (Dispatcher, InMemoryRepository, RecordingNotifier) {
    let repo = InMemoryRepository::new();
    let notifier = RecordingNotifier::new();
    let dispatcher = Dispatcher::new(
        Arc::new(repo.clone()),
        Arc::new(notifier.clone()),
        Arc::new(config),
    );
    (dispatcher, repo, notifier)
}

fn desk() -> (Dispatcher, InMemoryRepository, RecordingNotifier) {
    desk_with(DeskConfig {
        admin_id: ADMIN,
        support_admins: vec![ADMIN],
        ..DeskConfig::default()
    })
}

#[tokio::test]
async fn test_add_equipment_is_admin_only() {
    let (desk, repo, notifier) = desk();

    desk.dispatch(InboundEvent::text(UserId(5), "/add_equipment 0001 bike")).await.unwrap();
    assert!(notifier.last().unwrap().text.contains("not allowed"));
    assert!(repo.equipment_by_eq_id("0001").await.unwrap().is_none());

    desk.dispatch(InboundEvent::text(ADMIN, "/add_equipment 0001 bike")).await.unwrap();
    assert!(notifier.last().unwrap().text.contains("0001 registered"));
    let eq = repo.equipment_by_eq_id("0001").await.unwrap().unwrap();
    assert_eq!(eq.status, EquipmentStatus::InStock);
    assert_eq!(eq.type_label, "bike");
}

#[tokio::test]
async fn test_add_equipment_duplicate_and_usage() {
    let (desk, _repo, notifier) = desk();

    desk.dispatch(InboundEvent::text(ADMIN, "/add_equipment")).await.unwrap();
    assert!(notifier.last().unwrap().text.contains("Usage:"));

    desk.dispatch(InboundEvent::text(ADMIN, "/add_equipment 0001")).await.unwrap();
    assert!(notifier.last().unwrap().text.contains("registered"));

    desk.dispatch(InboundEvent::text(ADMIN, "/add_equipment 0001 scooter")).await.unwrap();
    assert!(notifier.last().unwrap().text.contains("already exists"));
}

#[tokio::test]
async fn test_assign_and_return_round_trip() {
    let (desk, repo, notifier) = desk();
    repo.insert_equipment("0001", "bike").await.unwrap();
    let user = UserId(5);

    desk.dispatch(InboundEvent::action(user, "menu:equipment")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "eq:assign")).await.unwrap();
    desk.dispatch(InboundEvent::text(user, "0001")).await.unwrap();
    desk.dispatch(InboundEvent::text(user, "42")).await.unwrap();

    let eq = repo.equipment_by_eq_id("0001").await.unwrap().unwrap();
    assert_eq!(eq.status, EquipmentStatus::WithCourier);
    assert_eq!(eq.assigned_to, Some(UserId(42)));
    assert!(notifier.last().unwrap().text.contains("handed to courier #42"));

    desk.dispatch(InboundEvent::action(user, "menu:equipment")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "eq:return")).await.unwrap();
    desk.dispatch(InboundEvent::text(user, "0001")).await.unwrap();

    let eq = repo.equipment_by_eq_id("0001").await.unwrap().unwrap();
    assert_eq!(eq.status, EquipmentStatus::InStock);
    assert_eq!(eq.assigned_to, None);
}

#[tokio::test]
async fn test_unknown_equipment_id_reprompts() {
    let (desk, repo, notifier) = desk();
    repo.insert_equipment("0001", "bike").await.unwrap();
    let user = UserId(5);

    desk.dispatch(InboundEvent::action(user, "menu:equipment")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "eq:return")).await.unwrap();
    desk.dispatch(InboundEvent::text(user, "9999")).await.unwrap();
    assert!(notifier.last().unwrap().text.contains("not found"));

    // The draft survives the miss
    desk.dispatch(InboundEvent::text(user, "0001")).await.unwrap();
    assert!(notifier.last().unwrap().text.contains("returned to stock"));
}

#[tokio::test]
async fn test_non_numeric_courier_id_reprompts() {
    let (desk, repo, notifier) = desk();
    repo.insert_equipment("0001", "bike").await.unwrap();
    let user = UserId(5);

    desk.dispatch(InboundEvent::action(user, "menu:equipment")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "eq:assign")).await.unwrap();
    desk.dispatch(InboundEvent::text(user, "0001")).await.unwrap();
    desk.dispatch(InboundEvent::text(user, "not a number")).await.unwrap();
    assert!(notifier.last().unwrap().text.contains("must be a number"));

    desk.dispatch(InboundEvent::text(user, "42")).await.unwrap();
    let eq = repo.equipment_by_eq_id("0001").await.unwrap().unwrap();
    assert_eq!(eq.assigned_to, Some(UserId(42)));
}

#[tokio::test]
async fn test_repair_files_ticket_without_touching_status() {
    let (desk, repo, notifier) = desk();
    repo.insert_equipment("0001", "bike").await.unwrap();
    let user = UserId(5);

    desk.dispatch(InboundEvent::action(user, "menu:equipment")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "eq:repair")).await.unwrap();
    desk.dispatch(InboundEvent::text(user, "0001")).await.unwrap();
    desk.dispatch(InboundEvent::text(user, "front wheel bent")).await.unwrap();
    desk.dispatch(InboundEvent::media(user, "photo-ref-1")).await.unwrap();

    assert_eq!(repo.request_count(), 1);
    let req = repo.list_active_requests().await.unwrap().remove(0);
    assert_eq!(req.category, "Equipment repair");
    assert_eq!(req.subcategory.as_deref(), Some("0001"));
    assert_eq!(req.title, "Repair 0001");
    assert_eq!(req.priority, "medium");
    assert_eq!(req.description, "front wheel bent");
    assert_eq!(req.photos, vec!["photo-ref-1"]);

    // Filing the ticket does not mutate the equipment row
    let eq = repo.equipment_by_eq_id("0001").await.unwrap().unwrap();
    assert_eq!(eq.status, EquipmentStatus::InStock);
    assert!(notifier.sent_to(user).iter().any(|m| m.text.contains("Repair ticket #1")));
}

#[tokio::test]
async fn test_repair_photo_can_be_skipped() {
    let (desk, repo, _notifier) = desk();
    repo.insert_equipment("0001", "bike").await.unwrap();
    let user = UserId(5);

    desk.dispatch(InboundEvent::action(user, "menu:equipment")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "eq:repair")).await.unwrap();
    desk.dispatch(InboundEvent::text(user, "0001")).await.unwrap();
    desk.dispatch(InboundEvent::text(user, "chain slipping")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "eq:skip_photo")).await.unwrap();

    let req = repo.list_active_requests().await.unwrap().remove(0);
    assert!(req.photos.is_empty());
}

#[tokio::test]
async fn test_repair_marks_equipment_when_policy_enabled() {
    let (desk, repo, _notifier) = desk_with(DeskConfig {
        admin_id: ADMIN,
        repair_marks_equipment: true,
        ..DeskConfig::default()
    });
    repo.insert_equipment("0001", "bike").await.unwrap();
    let user = UserId(5);

    desk.dispatch(InboundEvent::action(user, "menu:equipment")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "eq:repair")).await.unwrap();
    desk.dispatch(InboundEvent::text(user, "0001")).await.unwrap();
    desk.dispatch(InboundEvent::text(user, "brakes gone")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "eq:skip_photo")).await.unwrap();

    let eq = repo.equipment_by_eq_id("0001").await.unwrap().unwrap();
    assert_eq!(eq.status, EquipmentStatus::NeedRepair);
}

#[tokio::test]
async fn test_cancel_mid_flow() {
    let (desk, repo, notifier) = desk();
    repo.insert_equipment("0001", "bike").await.unwrap();
    let user = UserId(5);

    desk.dispatch(InboundEvent::action(user, "menu:equipment")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "eq:assign")).await.unwrap();
    desk.dispatch(InboundEvent::action(user, "eq:cancel")).await.unwrap();
    assert!(notifier.last().unwrap().text.contains("cancelled"));

    // Equipment untouched, no draft left
    let eq = repo.equipment_by_eq_id("0001").await.unwrap().unwrap();
    assert_eq!(eq.status, EquipmentStatus::InStock);
    desk.dispatch(InboundEvent::text(user, "0001")).await.unwrap();
    assert!(notifier.last().unwrap().text.contains("What would you like to do?"));
}

#[tokio::test]
async fn test_list_view_pages_with_navigation() {
    let (desk, repo, notifier) = desk_with(DeskConfig {
        admin_id: ADMIN,
        page_size: 2,
        ..DeskConfig::default()
    });
    for i in 1..=3 {
        repo.insert_equipment(&format!("000{i}"), "bike").await.unwrap();
    }
    repo.assign_equipment(2, UserId(42)).await.unwrap();

    desk.dispatch(InboundEvent::action(UserId(5), "menu:list")).await.unwrap();
    let first = notifier.last().unwrap();
    assert!(first.text.contains("page 1/2"));
    assert!(first.text.contains("🟢 0001"));
    assert!(first.text.contains("🚴 0002"));
    assert!(first.buttons.iter().any(|b| b.label == "▶"));

    desk.dispatch(InboundEvent::action(UserId(5), "page:eq:1")).await.unwrap();
    let second = notifier.last().unwrap();
    assert!(second.text.contains("page 2/2"));
    assert!(second.text.contains("0003"));
    assert!(second.buttons.iter().any(|b| b.label == "◀"));
}
