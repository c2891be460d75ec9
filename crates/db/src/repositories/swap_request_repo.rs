//! Repository for the `swap_requests` table.

use slotswap_core::swap::SwapStatus;
use slotswap_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::swap_request::{SwapRequest, SwapRequestView};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, requester_id, responder_id, requester_slot_id, responder_slot_id, \
                       status, created_at, updated_at";

/// Joined projection used by the incoming/outgoing listings.
const VIEW_SELECT: &str = "SELECT r.id, r.requester_id, r.responder_id, r.requester_slot_id, \
                                  r.responder_slot_id, r.status, r.created_at, r.updated_at, \
                                  rq.name AS requester_name, rs.name AS responder_name, \
                                  sq.title AS requester_slot_title, ss.title AS responder_slot_title
                           FROM swap_requests r
                           JOIN users rq ON rq.id = r.requester_id
                           JOIN users rs ON rs.id = r.responder_id
                           JOIN slots sq ON sq.id = r.requester_slot_id
                           JOIN slots ss ON ss.id = r.responder_slot_id";

/// Unique index guarding one pending request per ordered slot pair.
pub const PENDING_PAIR_CONSTRAINT: &str = "uq_swap_requests_pending_pair";

/// Provides persistence for swap requests.
pub struct SwapRequestRepo;

impl SwapRequestRepo {
    /// Insert a new `PENDING` request, returning the created row.
    pub async fn insert(
        conn: &mut PgConnection,
        requester_id: DbId,
        responder_id: DbId,
        requester_slot_id: DbId,
        responder_slot_id: DbId,
    ) -> Result<SwapRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO swap_requests
                (requester_id, responder_id, requester_slot_id, responder_slot_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SwapRequest>(&query)
            .bind(requester_id)
            .bind(responder_id)
            .bind(requester_slot_id)
            .bind(responder_slot_id)
            .fetch_one(conn)
            .await
    }

    /// Find a request by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SwapRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM swap_requests WHERE id = $1");
        sqlx::query_as::<_, SwapRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Read a request inside a transaction without locking it.
    pub async fn peek(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<SwapRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM swap_requests WHERE id = $1");
        sqlx::query_as::<_, SwapRequest>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Lock a request `FOR UPDATE`. Callers lock its slots first.
    pub async fn lock(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<SwapRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM swap_requests WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, SwapRequest>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Set a request's status, returning the updated row.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: DbId,
        status: SwapStatus,
    ) -> Result<SwapRequest, sqlx::Error> {
        let query = format!(
            "UPDATE swap_requests SET status = $2
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SwapRequest>(&query)
            .bind(id)
            .bind(status.as_str())
            .fetch_one(conn)
            .await
    }

    /// Lock every other pending request that refers to any of `slot_ids`.
    pub async fn lock_pending_touching(
        conn: &mut PgConnection,
        slot_ids: &[DbId],
        excluding_id: DbId,
    ) -> Result<Vec<SwapRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM swap_requests
             WHERE status = 'PENDING'
               AND id <> $2
               AND (requester_slot_id = ANY($1) OR responder_slot_id = ANY($1))
             ORDER BY id ASC
             FOR UPDATE"
        );
        sqlx::query_as::<_, SwapRequest>(&query)
            .bind(slot_ids)
            .bind(excluding_id)
            .fetch_all(conn)
            .await
    }

    /// Slot ids referenced by pending requests that touch `slot_ids`, read
    /// without locks. Used to widen the slot lock set before accepting.
    pub async fn pending_neighbour_slot_ids(
        conn: &mut PgConnection,
        slot_ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT DISTINCT unnest(ARRAY[requester_slot_id, responder_slot_id])
             FROM swap_requests
             WHERE status = 'PENDING'
               AND (requester_slot_id = ANY($1) OR responder_slot_id = ANY($1))",
        )
        .bind(slot_ids)
        .fetch_all(conn)
        .await
    }

    /// Mark the listed requests `REJECTED`.
    pub async fn reject_many(conn: &mut PgConnection, ids: &[DbId]) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE swap_requests SET status = 'REJECTED' WHERE id = ANY($1)")
            .bind(ids)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Pending requests addressed to `user_id`, newest first.
    pub async fn list_incoming(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<SwapRequestView>, sqlx::Error> {
        let query = format!(
            "{VIEW_SELECT}
             WHERE r.responder_id = $1 AND r.status = 'PENDING'
             ORDER BY r.created_at DESC, r.id DESC"
        );
        sqlx::query_as::<_, SwapRequestView>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Every request made by `user_id`, newest first.
    pub async fn list_outgoing(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<SwapRequestView>, sqlx::Error> {
        let query = format!(
            "{VIEW_SELECT}
             WHERE r.requester_id = $1
             ORDER BY r.created_at DESC, r.id DESC"
        );
        sqlx::query_as::<_, SwapRequestView>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

}
