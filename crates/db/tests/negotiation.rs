//! Integration tests for the swap negotiation engine.
//!
//! Exercises create/respond against a real database:
//! - Accept exchanges owners and leaves both slots BUSY
//! - Reject releases both slots
//! - Accepting one request voids competing requests
//! - Failed preconditions leave no trace
//! - Concurrent offers and answers on shared slots serialize

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use slotswap_core::notice::SwapEventKind;
use slotswap_core::slot::SlotStatus;
use slotswap_core::swap::{InvalidSlotReason, NegotiationError, SwapDecision, SwapStatus};
use slotswap_core::types::DbId;
use slotswap_db::models::slot::{CreateSlot, Slot, UpdateSlot};
use slotswap_db::models::user::CreateUser;
use slotswap_db::repositories::{SlotRepo, SwapRequestRepo, UserRepo};
use slotswap_db::{EngineError, NegotiationEngine};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn user(pool: &PgPool, name: &str) -> DbId {
    let input = CreateUser {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
    };
    UserRepo::create(pool, &input).await.unwrap().id
}

async fn slot(pool: &PgPool, owner_id: DbId, title: &str, status: SlotStatus) -> DbId {
    let start = Utc::now() + Duration::days(1);
    let input = CreateSlot {
        title: title.to_string(),
        start_time: start,
        end_time: start + Duration::hours(1),
    };
    let created = SlotRepo::create(pool, owner_id, &input).await.unwrap();
    if status != SlotStatus::Busy {
        let patch = UpdateSlot {
            status: Some(status),
            ..Default::default()
        };
        SlotRepo::update_unlocked(pool, created.id, owner_id, &patch)
            .await
            .unwrap()
            .unwrap();
    }
    created.id
}

async fn fetch_slot(pool: &PgPool, id: DbId) -> Slot {
    SlotRepo::find_by_id(pool, id).await.unwrap().unwrap()
}

async fn request_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM swap_requests")
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Slots whose SWAP_PENDING status disagrees with the pending requests
/// referring to them. Must always be zero.
async fn lock_invariant_violations(pool: &PgPool) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM slots s
         WHERE (s.status = 'SWAP_PENDING') <> EXISTS (
             SELECT 1 FROM swap_requests r
             WHERE r.status = 'PENDING'
               AND (r.requester_slot_id = s.id OR r.responder_slot_id = s.id)
         )",
    )
    .fetch_one(pool)
    .await
    .unwrap()
}

/// U1 owns swappable A, U2 owns swappable B.
struct Pair {
    u1: DbId,
    u2: DbId,
    a: DbId,
    b: DbId,
}

async fn pair(pool: &PgPool) -> Pair {
    let u1 = user(pool, "Alice").await;
    let u2 = user(pool, "Bob").await;
    let a = slot(pool, u1, "Team standup", SlotStatus::Swappable).await;
    let b = slot(pool, u2, "Focus block", SlotStatus::Swappable).await;
    Pair { u1, u2, a, b }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_freezes_both_slots_and_notifies_responder(pool: PgPool) {
    let p = pair(&pool).await;
    let engine = NegotiationEngine::new(pool.clone());

    let created = engine.create(p.u1, p.a, p.b).await.unwrap();

    let request = &created.value;
    assert_eq!(request.status, SwapStatus::Pending);
    assert_eq!(request.requester_id, p.u1);
    assert_eq!(request.responder_id, p.u2);
    assert_eq!(fetch_slot(&pool, p.a).await.status, SlotStatus::SwapPending);
    assert_eq!(fetch_slot(&pool, p.b).await.status, SlotStatus::SwapPending);

    assert_eq!(created.notices.len(), 1);
    assert_eq!(created.notices[0].user_id, p.u2);
    assert_eq!(created.notices[0].kind, SwapEventKind::RequestReceived);
    assert_eq!(created.notices[0].request_id, request.id);
    assert_eq!(lock_invariant_violations(&pool).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_against_busy_slot_changes_nothing(pool: PgPool) {
    let u1 = user(&pool, "Alice").await;
    let u2 = user(&pool, "Bob").await;
    let a = slot(&pool, u1, "Team standup", SlotStatus::Swappable).await;
    let b = slot(&pool, u2, "Dentist", SlotStatus::Busy).await;
    let engine = NegotiationEngine::new(pool.clone());

    let result = engine.create(u1, a, b).await;

    assert_matches!(
        result,
        Err(EngineError::Rejected(NegotiationError::InvalidSlot {
            slot_id,
            reason: InvalidSlotReason::NotSwappable(SlotStatus::Busy),
        })) if slot_id == b
    );
    assert_eq!(request_count(&pool).await, 0);
    assert_eq!(fetch_slot(&pool, a).await.status, SlotStatus::Swappable);
    assert_eq!(fetch_slot(&pool, b).await.status, SlotStatus::Busy);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_with_someone_elses_slot_is_not_owned(pool: PgPool) {
    let p = pair(&pool).await;
    let u3 = user(&pool, "Carol").await;
    let engine = NegotiationEngine::new(pool.clone());

    let result = engine.create(u3, p.a, p.b).await;

    assert_matches!(
        result,
        Err(EngineError::Rejected(NegotiationError::InvalidSlot {
            reason: InvalidSlotReason::NotOwned,
            ..
        }))
    );
    assert_eq!(request_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_with_missing_slot_fails(pool: PgPool) {
    let p = pair(&pool).await;
    let engine = NegotiationEngine::new(pool.clone());

    let result = engine.create(p.u1, p.a, 999_999).await;

    assert_matches!(
        result,
        Err(EngineError::Rejected(NegotiationError::InvalidSlot {
            slot_id: 999_999,
            reason: InvalidSlotReason::Missing,
        }))
    );
    assert_eq!(fetch_slot(&pool, p.a).await.status, SlotStatus::Swappable);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_between_own_slots_is_self_swap(pool: PgPool) {
    let u1 = user(&pool, "Alice").await;
    let a = slot(&pool, u1, "Morning", SlotStatus::Swappable).await;
    let b = slot(&pool, u1, "Evening", SlotStatus::Swappable).await;
    let engine = NegotiationEngine::new(pool.clone());

    assert_matches!(
        engine.create(u1, a, b).await,
        Err(EngineError::Rejected(NegotiationError::SelfSwap))
    );
    assert_matches!(
        engine.create(u1, a, a).await,
        Err(EngineError::Rejected(NegotiationError::SelfSwap))
    );
    assert_eq!(request_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn repeating_a_pending_offer_is_refused(pool: PgPool) {
    let p = pair(&pool).await;
    let engine = NegotiationEngine::new(pool.clone());
    engine.create(p.u1, p.a, p.b).await.unwrap();

    let result = engine.create(p.u1, p.a, p.b).await;

    assert_matches!(
        result,
        Err(EngineError::Rejected(NegotiationError::InvalidSlot {
            reason: InvalidSlotReason::NotSwappable(SlotStatus::SwapPending),
            ..
        }))
    );
    assert_eq!(request_count(&pool).await, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn open_request_for_same_pair_is_duplicate(pool: PgPool) {
    let p = pair(&pool).await;
    // An open request whose slots were left SWAPPABLE, so only the pair
    // index stands between it and a second one.
    let mut conn = pool.acquire().await.unwrap();
    SwapRequestRepo::insert(&mut conn, p.u1, p.u2, p.a, p.b)
        .await
        .unwrap();
    drop(conn);
    let engine = NegotiationEngine::new(pool.clone());

    let result = engine.create(p.u1, p.a, p.b).await;

    assert_matches!(
        result,
        Err(EngineError::Rejected(NegotiationError::DuplicateRequest {
            requester_slot_id,
            responder_slot_id,
        })) if requester_slot_id == p.a && responder_slot_id == p.b
    );
    assert_eq!(request_count(&pool).await, 1);
    assert_eq!(fetch_slot(&pool, p.a).await.status, SlotStatus::Swappable);
    assert_eq!(fetch_slot(&pool, p.b).await.status, SlotStatus::Swappable);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_offers_for_one_slot_admit_exactly_one(pool: PgPool) {
    let p = pair(&pool).await;
    let u3 = user(&pool, "Carol").await;
    let c = slot(&pool, u3, "Lunch", SlotStatus::Swappable).await;
    let engine = NegotiationEngine::new(pool.clone());

    let (first, second) = tokio::join!(engine.create(p.u1, p.a, p.b), engine.create(u3, c, p.b));

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.into_iter().find_map(Result::err).unwrap();
    assert_matches!(
        loser,
        EngineError::Rejected(NegotiationError::InvalidSlot {
            slot_id,
            reason: InvalidSlotReason::NotSwappable(SlotStatus::SwapPending),
        }) if slot_id == p.b
    );
    assert_eq!(request_count(&pool).await, 1);
    assert_eq!(lock_invariant_violations(&pool).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn pending_pair_index_rejects_second_open_request(pool: PgPool) {
    let p = pair(&pool).await;
    let mut tx = pool.begin().await.unwrap();
    SwapRequestRepo::insert(&mut *tx, p.u1, p.u2, p.a, p.b)
        .await
        .unwrap();

    let err = SwapRequestRepo::insert(&mut *tx, p.u1, p.u2, p.a, p.b)
        .await
        .unwrap_err();

    let db_err = err.as_database_error().expect("expected a database error");
    assert_eq!(db_err.constraint(), Some("uq_swap_requests_pending_pair"));
}

// ---------------------------------------------------------------------------
// Respond
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn accept_exchanges_owners(pool: PgPool) {
    let p = pair(&pool).await;
    let engine = NegotiationEngine::new(pool.clone());
    let request_id = engine.create(p.u1, p.a, p.b).await.unwrap().value.id;

    let answered = engine
        .respond(request_id, p.u2, SwapDecision::Accept)
        .await
        .unwrap();

    assert_eq!(answered.value.status, SwapStatus::Accepted);
    let a = fetch_slot(&pool, p.a).await;
    let b = fetch_slot(&pool, p.b).await;
    assert_eq!(a.owner_id, p.u2);
    assert_eq!(b.owner_id, p.u1);
    assert_eq!(a.status, SlotStatus::Busy);
    assert_eq!(b.status, SlotStatus::Busy);

    assert_eq!(answered.notices.len(), 1);
    assert_eq!(answered.notices[0].user_id, p.u1);
    assert_eq!(answered.notices[0].kind, SwapEventKind::RequestAccepted);
    assert_eq!(lock_invariant_violations(&pool).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reject_releases_both_slots(pool: PgPool) {
    let p = pair(&pool).await;
    let engine = NegotiationEngine::new(pool.clone());
    let request_id = engine.create(p.u1, p.a, p.b).await.unwrap().value.id;

    let answered = engine
        .respond(request_id, p.u2, SwapDecision::Reject)
        .await
        .unwrap();

    assert_eq!(answered.value.status, SwapStatus::Rejected);
    let a = fetch_slot(&pool, p.a).await;
    let b = fetch_slot(&pool, p.b).await;
    assert_eq!((a.owner_id, a.status), (p.u1, SlotStatus::Swappable));
    assert_eq!((b.owner_id, b.status), (p.u2, SlotStatus::Swappable));

    assert_eq!(answered.notices.len(), 1);
    assert_eq!(answered.notices[0].user_id, p.u1);
    assert_eq!(answered.notices[0].kind, SwapEventKind::RequestRejected);
    assert_eq!(lock_invariant_violations(&pool).await, 0);
}

/// Seeds a second pending request R2 (A for C) next to R1 (A for B), the
/// state left behind by clients racing on the same slot.
#[sqlx::test(migrations = "../../db/migrations")]
async fn accepting_one_request_rejects_competitors(pool: PgPool) {
    let p = pair(&pool).await;
    let u3 = user(&pool, "Carol").await;
    let c = slot(&pool, u3, "Lunch", SlotStatus::Swappable).await;
    let engine = NegotiationEngine::new(pool.clone());
    let r1 = engine.create(p.u1, p.a, p.b).await.unwrap().value.id;

    let mut tx = pool.begin().await.unwrap();
    let r2 = SwapRequestRepo::insert(&mut *tx, p.u1, u3, p.a, c)
        .await
        .unwrap()
        .id;
    SlotRepo::set_status(&mut *tx, &[c], SlotStatus::SwapPending)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let answered = engine.respond(r1, p.u2, SwapDecision::Accept).await.unwrap();

    let r2_row = SwapRequestRepo::find_by_id(&pool, r2).await.unwrap().unwrap();
    assert_eq!(r2_row.status, SwapStatus::Rejected);

    let c_row = fetch_slot(&pool, c).await;
    assert_eq!((c_row.owner_id, c_row.status), (u3, SlotStatus::Swappable));
    let a_row = fetch_slot(&pool, p.a).await;
    assert_eq!((a_row.owner_id, a_row.status), (p.u2, SlotStatus::Busy));

    let kinds: Vec<(DbId, SwapEventKind, DbId)> = answered
        .notices
        .iter()
        .map(|n| (n.user_id, n.kind, n.request_id))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (p.u1, SwapEventKind::RequestAccepted, r1),
            (p.u1, SwapEventKind::RequestRejected, r2),
        ]
    );
    assert_eq!(lock_invariant_violations(&pool).await, 0);
}

/// Rejecting R1 must not release A while R2 still holds it.
#[sqlx::test(migrations = "../../db/migrations")]
async fn reject_keeps_slot_frozen_for_other_pending_request(pool: PgPool) {
    let p = pair(&pool).await;
    let u3 = user(&pool, "Carol").await;
    let c = slot(&pool, u3, "Lunch", SlotStatus::Swappable).await;
    let engine = NegotiationEngine::new(pool.clone());
    let r1 = engine.create(p.u1, p.a, p.b).await.unwrap().value.id;

    let mut tx = pool.begin().await.unwrap();
    SwapRequestRepo::insert(&mut *tx, p.u1, u3, p.a, c)
        .await
        .unwrap();
    SlotRepo::set_status(&mut *tx, &[c], SlotStatus::SwapPending)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    engine.respond(r1, p.u2, SwapDecision::Reject).await.unwrap();

    assert_eq!(fetch_slot(&pool, p.a).await.status, SlotStatus::SwapPending);
    assert_eq!(fetch_slot(&pool, p.b).await.status, SlotStatus::Swappable);
    assert_eq!(lock_invariant_violations(&pool).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn answering_twice_reports_already_processed(pool: PgPool) {
    let p = pair(&pool).await;
    let engine = NegotiationEngine::new(pool.clone());
    let request_id = engine.create(p.u1, p.a, p.b).await.unwrap().value.id;
    engine
        .respond(request_id, p.u2, SwapDecision::Accept)
        .await
        .unwrap();

    let again = engine.respond(request_id, p.u2, SwapDecision::Reject).await;

    assert_matches!(
        again,
        Err(EngineError::Rejected(NegotiationError::AlreadyProcessed {
            status: SwapStatus::Accepted,
            ..
        }))
    );
    assert_eq!(fetch_slot(&pool, p.a).await.owner_id, p.u2);
    assert_eq!(fetch_slot(&pool, p.b).await.owner_id, p.u1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn only_the_responder_may_answer(pool: PgPool) {
    let p = pair(&pool).await;
    let engine = NegotiationEngine::new(pool.clone());
    let request_id = engine.create(p.u1, p.a, p.b).await.unwrap().value.id;

    for outsider in [p.u1, user(&pool, "Mallory").await] {
        let result = engine
            .respond(request_id, outsider, SwapDecision::Accept)
            .await;
        assert_matches!(
            result,
            Err(EngineError::Rejected(NegotiationError::Forbidden { .. }))
        );
    }

    let row = SwapRequestRepo::find_by_id(&pool, request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, SwapStatus::Pending);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn answering_unknown_request_is_not_found(pool: PgPool) {
    let p = pair(&pool).await;
    let engine = NegotiationEngine::new(pool.clone());

    assert_matches!(
        engine.respond(424_242, p.u2, SwapDecision::Accept).await,
        Err(EngineError::Rejected(NegotiationError::NotFound {
            request_id: 424_242
        }))
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_answers_serialize(pool: PgPool) {
    let p = pair(&pool).await;
    let engine = NegotiationEngine::new(pool.clone());
    let request_id = engine.create(p.u1, p.a, p.b).await.unwrap().value.id;

    let (accept, reject) = tokio::join!(
        engine.respond(request_id, p.u2, SwapDecision::Accept),
        engine.respond(request_id, p.u2, SwapDecision::Reject),
    );

    let successes = [accept.is_ok(), reject.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(successes, 1, "exactly one answer should win");
    for result in [accept, reject] {
        if let Err(err) = result {
            assert_matches!(
                err,
                EngineError::Rejected(NegotiationError::AlreadyProcessed { .. })
            );
        }
    }
    assert_eq!(lock_invariant_violations(&pool).await, 0);
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_requests_splits_incoming_and_outgoing(pool: PgPool) {
    let p = pair(&pool).await;
    let engine = NegotiationEngine::new(pool.clone());
    let request_id = engine.create(p.u1, p.a, p.b).await.unwrap().value.id;

    let bob = engine.list_requests(p.u2).await.unwrap();
    assert_eq!(bob.incoming.len(), 1);
    assert!(bob.outgoing.is_empty());
    let view = &bob.incoming[0];
    assert_eq!(view.request.id, request_id);
    assert_eq!(view.requester_name, "Alice");
    assert_eq!(view.responder_name, "Bob");
    assert_eq!(view.requester_slot_title, "Team standup");
    assert_eq!(view.responder_slot_title, "Focus block");

    let alice = engine.list_requests(p.u1).await.unwrap();
    assert!(alice.incoming.is_empty());
    assert_eq!(alice.outgoing.len(), 1);

    // Answered requests leave the incoming list but stay in the outgoing one.
    engine
        .respond(request_id, p.u2, SwapDecision::Reject)
        .await
        .unwrap();
    assert!(engine.list_requests(p.u2).await.unwrap().incoming.is_empty());
    let alice = engine.list_requests(p.u1).await.unwrap();
    assert_eq!(alice.outgoing[0].request.status, SwapStatus::Rejected);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_swappable_hides_own_and_unavailable_slots(pool: PgPool) {
    let p = pair(&pool).await;
    let u3 = user(&pool, "Carol").await;
    let later = slot(&pool, u3, "Retro", SlotStatus::Swappable).await;
    slot(&pool, u3, "Dentist", SlotStatus::Busy).await;
    let engine = NegotiationEngine::new(pool.clone());

    let listed = engine.list_swappable(p.u1).await.unwrap();
    let ids: Vec<DbId> = listed.iter().map(|s| s.slot.id).collect();
    assert_eq!(ids, vec![p.b, later]);
    assert_eq!(listed[0].owner_name, "Bob");
    assert_eq!(listed[1].owner_name, "Carol");
    assert_eq!(listed[1].owner_email, "carol@example.com");
}
