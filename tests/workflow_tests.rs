use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::broadcast;

use fleetd::db::Store;
use fleetd::domain::events::NotificationEvent;
use fleetd::domain::{ApprovalStatus, BookingInterval, BookingStatus, Decision, Role, VehicleStatus};
use fleetd::entities::{locations, users, vehicle_types, vehicles};
use fleetd::services::{
    ApprovalChainBuilder, AvailabilityService, BookingChanges, BookingWorkflow, CreateBooking,
    MaintenanceService, SeaOrmBookingWorkflow, SeaOrmDirectory, WorkflowError,
};

// Single connection so the whole test shares one in-memory database.
async fn test_store() -> Store {
    Store::with_pool_options("sqlite::memory:", 1, 1)
        .await
        .expect("Failed to create in-memory store")
}

fn build_workflow(
    store: &Store,
) -> (SeaOrmBookingWorkflow, broadcast::Receiver<NotificationEvent>) {
    let (tx, rx) = broadcast::channel(16);
    let directory = Arc::new(SeaOrmDirectory::new(store.clone()));
    let workflow =
        SeaOrmBookingWorkflow::new(store.clone(), ApprovalChainBuilder::new(directory), tx);
    (workflow, rx)
}

async fn add_user(store: &Store, name: &str, role: Role, supervisor_id: Option<i32>) -> i32 {
    let now = Utc::now();
    let user = users::ActiveModel {
        name: Set(name.to_string()),
        email: Set(format!("{name}@example.com")),
        password_hash: Set("unused".to_string()),
        api_key: Set(format!("key-{name}")),
        role: Set(role),
        department: Set(None),
        location_id: Set(None),
        supervisor_id: Set(supervisor_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&store.conn)
    .await
    .expect("Failed to insert user");

    user.id
}

async fn add_vehicle(store: &Store, registration: &str) -> i32 {
    let now = Utc::now();

    let location = locations::ActiveModel {
        name: Set(format!("Depot {registration}")),
        address: Set(None),
        ..Default::default()
    }
    .insert(&store.conn)
    .await
    .expect("Failed to insert location");

    let vehicle_type = vehicle_types::ActiveModel {
        name: Set(format!("Type {registration}")),
        capacity: Set(5),
        ..Default::default()
    }
    .insert(&store.conn)
    .await
    .expect("Failed to insert vehicle type");

    let vehicle = vehicles::ActiveModel {
        registration_no: Set(registration.to_string()),
        vehicle_type_id: Set(vehicle_type.id),
        location_id: Set(location.id),
        status: Set(VehicleStatus::Available),
        is_rented: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&store.conn)
    .await
    .expect("Failed to insert vehicle");

    vehicle.id
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, day, hour, 0, 0).unwrap()
}

fn interval(start_day: u32, end_day: u32) -> BookingInterval {
    BookingInterval::new(at(start_day, 9), at(end_day, 17)).unwrap()
}

fn request(requester_id: i32, vehicle_id: i32, iv: BookingInterval) -> CreateBooking {
    CreateBooking {
        requester_id,
        vehicle_id,
        interval: iv,
        purpose: "Site visit".to_string(),
        passengers: Some(2),
        notes: None,
    }
}

#[tokio::test]
async fn create_assigns_chain_and_books_vehicle() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);

    let senior = add_user(&store, "senior", Role::Approver, None).await;
    let supervisor = add_user(&store, "supervisor", Role::Approver, Some(senior)).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-100").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    assert_eq!(aggregate.booking.status, BookingStatus::Pending);
    assert_eq!(aggregate.approvals.len(), 2);
    assert_eq!(aggregate.approvals[0].approver_id, supervisor);
    assert_eq!(aggregate.approvals[0].level, 1);
    assert_eq!(aggregate.approvals[1].approver_id, senior);
    assert_eq!(aggregate.approvals[1].level, 2);
    assert!(
        aggregate
            .approvals
            .iter()
            .all(|a| a.status == ApprovalStatus::Pending)
    );

    let vehicle = store.get_vehicle(vehicle_id).await.unwrap().unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Booked);
}

#[tokio::test]
async fn create_emits_notification_with_approvers() {
    let store = test_store().await;
    let (workflow, mut rx) = build_workflow(&store);

    let supervisor = add_user(&store, "supervisor", Role::Approver, None).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-101").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    match rx.try_recv().unwrap() {
        NotificationEvent::BookingCreated {
            booking_id,
            approver_ids,
            ..
        } => {
            assert_eq!(booking_id, aggregate.booking.id);
            assert!(approver_ids.contains(&supervisor));
        }
        other => panic!("Unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn second_booking_on_busy_vehicle_conflicts() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);

    let supervisor = add_user(&store, "supervisor", Role::Approver, None).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let other = add_user(&store, "other", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-102").await;

    workflow
        .create(request(requester, vehicle_id, interval(1, 3)))
        .await
        .unwrap();

    let err = workflow
        .create(request(other, vehicle_id, interval(2, 4)))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Conflict(_)));
}

#[tokio::test]
async fn concurrent_creates_admit_exactly_one() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);
    let workflow = Arc::new(workflow);

    let supervisor = add_user(&store, "supervisor", Role::Approver, None).await;
    let alice = add_user(&store, "alice", Role::User, Some(supervisor)).await;
    let bob = add_user(&store, "bob", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-103").await;

    let (a, b) = tokio::join!(
        workflow.create(request(alice, vehicle_id, interval(1, 2))),
        workflow.create(request(bob, vehicle_id, interval(1, 2))),
    );

    assert_eq!(
        usize::from(a.is_ok()) + usize::from(b.is_ok()),
        1,
        "exactly one of two racing bookings must win"
    );
}

#[tokio::test]
async fn approvals_in_sequence_approve_the_booking() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);

    let senior = add_user(&store, "senior", Role::Approver, None).await;
    let supervisor = add_user(&store, "supervisor", Role::Approver, Some(senior)).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-104").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    let after_first = workflow
        .decide(aggregate.approvals[0].id, Decision::Approve, supervisor, None)
        .await
        .unwrap();
    assert_eq!(after_first.booking.status, BookingStatus::Pending);

    let after_second = workflow
        .decide(aggregate.approvals[1].id, Decision::Approve, senior, None)
        .await
        .unwrap();
    assert_eq!(after_second.booking.status, BookingStatus::Approved);

    // Vehicle stays claimed through the approved period.
    let vehicle = store.get_vehicle(vehicle_id).await.unwrap().unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Booked);
}

#[tokio::test]
async fn rejection_short_circuits_and_releases_vehicle() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);

    let senior = add_user(&store, "senior", Role::Approver, None).await;
    let supervisor = add_user(&store, "supervisor", Role::Approver, Some(senior)).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-105").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    let after = workflow
        .decide(
            aggregate.approvals[0].id,
            Decision::Reject,
            supervisor,
            Some("No justification given".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(after.booking.status, BookingStatus::Rejected);
    assert_eq!(after.approvals[0].status, ApprovalStatus::Rejected);
    // The sibling assignment is left untouched.
    assert_eq!(after.approvals[1].status, ApprovalStatus::Pending);

    let vehicle = store.get_vehicle(vehicle_id).await.unwrap().unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Available);
}

#[tokio::test]
async fn second_decision_on_same_approval_is_rejected() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);

    let senior = add_user(&store, "senior", Role::Approver, None).await;
    let supervisor = add_user(&store, "supervisor", Role::Approver, Some(senior)).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-106").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    workflow
        .decide(aggregate.approvals[0].id, Decision::Approve, supervisor, None)
        .await
        .unwrap();

    let err = workflow
        .decide(aggregate.approvals[0].id, Decision::Approve, supervisor, None)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::InvalidState(_)));
}

#[tokio::test]
async fn replayed_decision_cannot_flip_the_outcome() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);

    let senior = add_user(&store, "senior", Role::Approver, None).await;
    let supervisor = add_user(&store, "supervisor", Role::Approver, Some(senior)).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-118").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    workflow
        .decide(aggregate.approvals[0].id, Decision::Approve, supervisor, None)
        .await
        .unwrap();

    let err = workflow
        .decide(aggregate.approvals[0].id, Decision::Reject, supervisor, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState(_)));

    // The first decision stands and the booking is untouched.
    let approval = store
        .get_approval(aggregate.approvals[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(approval.status, ApprovalStatus::Approved);

    let booking = store.get_booking(aggregate.booking.id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
}

#[tokio::test]
async fn stranger_cannot_decide() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);

    let supervisor = add_user(&store, "supervisor", Role::Approver, None).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let stranger = add_user(&store, "stranger", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-107").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    let err = workflow
        .decide(aggregate.approvals[0].id, Decision::Approve, stranger, None)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[tokio::test]
async fn admin_may_decide_any_assignment() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);

    // User id 1 is the seeded administrator.
    let supervisor = add_user(&store, "supervisor", Role::Approver, None).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-108").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    let after = workflow
        .decide(aggregate.approvals[0].id, Decision::Approve, 1, None)
        .await
        .unwrap();

    assert_eq!(after.approvals[0].status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn requester_cancels_pending_booking() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);

    let supervisor = add_user(&store, "supervisor", Role::Approver, None).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-109").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    let after = workflow.cancel(aggregate.booking.id, requester).await.unwrap();
    assert_eq!(after.booking.status, BookingStatus::Cancelled);

    let vehicle = store.get_vehicle(vehicle_id).await.unwrap().unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Available);

    let err = workflow
        .cancel(aggregate.booking.id, requester)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState(_)));
}

#[tokio::test]
async fn requester_cannot_cancel_someone_elses_booking() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);

    let supervisor = add_user(&store, "supervisor", Role::Approver, None).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let stranger = add_user(&store, "stranger", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-110").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    let err = workflow
        .cancel(aggregate.booking.id, stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[tokio::test]
async fn complete_releases_the_vehicle() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);

    let supervisor = add_user(&store, "supervisor", Role::Approver, None).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-111").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    let after = workflow
        .complete(aggregate.booking.id, requester)
        .await
        .unwrap();
    assert_eq!(after.booking.status, BookingStatus::Completed);

    let vehicle = store.get_vehicle(vehicle_id).await.unwrap().unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Available);

    let err = workflow
        .complete(aggregate.booking.id, requester)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState(_)));
}

#[tokio::test]
async fn booking_auto_approves_without_any_approver() {
    let store = test_store().await;
    let (workflow, mut rx) = build_workflow(&store);

    // Demote the seeded administrator so no admin fallback exists.
    let admin = store.get_user(1).await.unwrap().unwrap();
    let mut active: users::ActiveModel = admin.into();
    active.role = Set(Role::User);
    active.update(&store.conn).await.unwrap();

    let requester = add_user(&store, "requester", Role::User, None).await;
    let vehicle_id = add_vehicle(&store, "FL-112").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    assert_eq!(aggregate.booking.status, BookingStatus::Approved);
    assert!(aggregate.approvals.is_empty());

    assert!(matches!(
        rx.try_recv().unwrap(),
        NotificationEvent::BookingApproved { .. }
    ));
}

#[tokio::test]
async fn vehicle_change_rebuilds_approval_chain() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);

    let senior = add_user(&store, "senior", Role::Approver, None).await;
    let supervisor = add_user(&store, "supervisor", Role::Approver, Some(senior)).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let first_vehicle = add_vehicle(&store, "FL-113").await;
    let second_vehicle = add_vehicle(&store, "FL-114").await;

    let aggregate = workflow
        .create(request(requester, first_vehicle, interval(1, 2)))
        .await
        .unwrap();

    workflow
        .decide(aggregate.approvals[0].id, Decision::Approve, supervisor, None)
        .await
        .unwrap();

    let after = workflow
        .update(
            aggregate.booking.id,
            requester,
            BookingChanges {
                vehicle_id: Some(second_vehicle),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(after.booking.vehicle_id, second_vehicle);
    assert_eq!(after.approvals.len(), 2);
    // The earlier partial approval is gone; the chain starts over.
    assert!(
        after
            .approvals
            .iter()
            .all(|a| a.status == ApprovalStatus::Pending)
    );

    let old = store.get_vehicle(first_vehicle).await.unwrap().unwrap();
    assert_eq!(old.status, VehicleStatus::Available);
    let new = store.get_vehicle(second_vehicle).await.unwrap().unwrap();
    assert_eq!(new.status, VehicleStatus::Booked);
}

#[tokio::test]
async fn shrinking_the_interval_keeps_the_chain() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);

    let supervisor = add_user(&store, "supervisor", Role::Approver, None).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-115").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 5)))
        .await
        .unwrap();

    let after = workflow
        .update(
            aggregate.booking.id,
            requester,
            BookingChanges {
                interval: Some(interval(1, 2)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(after.booking.end_date, at(2, 17));
    assert_eq!(after.approvals.len(), aggregate.approvals.len());
    assert_eq!(after.approvals[0].id, aggregate.approvals[0].id);
}

#[tokio::test]
async fn booked_vehicle_is_unavailable_even_for_a_free_window() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);
    let availability = AvailabilityService::new(store.clone());

    let supervisor = add_user(&store, "supervisor", Role::Approver, None).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-119").await;

    let aggregate = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    // A Booked vehicle cannot take a booking in any window; create would
    // refuse a disjoint interval just the same.
    assert!(
        !availability
            .is_available(vehicle_id, interval(3, 4))
            .await
            .unwrap()
    );
    assert!(
        !availability
            .is_available(vehicle_id, interval(1, 2))
            .await
            .unwrap()
    );

    workflow.cancel(aggregate.booking.id, requester).await.unwrap();

    assert!(
        availability
            .is_available(vehicle_id, interval(3, 4))
            .await
            .unwrap()
    );

    // Unknown vehicles are never available.
    assert!(!availability.is_available(9999, interval(3, 4)).await.unwrap());
}

#[tokio::test]
async fn maintenance_blocks_and_releases_vehicle() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);
    let maintenance = MaintenanceService::new(store.clone());

    let supervisor = add_user(&store, "supervisor", Role::Approver, None).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-116").await;

    let record = maintenance
        .open(vehicle_id, "Brake inspection".to_string())
        .await
        .unwrap();

    let vehicle = store.get_vehicle(vehicle_id).await.unwrap().unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Maintenance);

    // The workshop has the vehicle, so bookings must bounce.
    let err = workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict(_)));

    let closed = maintenance.close(record.id, Some(120.0)).await.unwrap();
    assert!(closed.completed_at.is_some());

    let vehicle = store.get_vehicle(vehicle_id).await.unwrap().unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Available);

    let err = maintenance.close(record.id, None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState(_)));
}

#[tokio::test]
async fn maintenance_refused_while_vehicle_is_booked() {
    let store = test_store().await;
    let (workflow, _rx) = build_workflow(&store);
    let maintenance = MaintenanceService::new(store.clone());

    let supervisor = add_user(&store, "supervisor", Role::Approver, None).await;
    let requester = add_user(&store, "requester", Role::User, Some(supervisor)).await;
    let vehicle_id = add_vehicle(&store, "FL-117").await;

    workflow
        .create(request(requester, vehicle_id, interval(1, 2)))
        .await
        .unwrap();

    let err = maintenance
        .open(vehicle_id, "Oil change".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict(_)));
}
