//! Repository for the `slots` table.
//!
//! Owner-facing writes are guarded with `status <> 'SWAP_PENDING'` in the
//! statement itself, so a slot that became engaged between the handler's read
//! and its write is never modified.

use slotswap_core::slot::SlotStatus;
use slotswap_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::slot::{CreateSlot, Slot, SwappableSlot, UpdateSlot};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, title, start_time, end_time, status, created_at, updated_at";

/// Same columns qualified with the `s` alias for joined queries.
const QUALIFIED_COLUMNS: &str = "s.id, s.owner_id, s.title, s.start_time, s.end_time, \
                                 s.status, s.created_at, s.updated_at";

/// Provides CRUD operations and negotiation-time locking for slots.
pub struct SlotRepo;

impl SlotRepo {
    /* ---------------------------------------------------------------------
       Owner-facing CRUD
       --------------------------------------------------------------------- */

    /// Insert a new `BUSY` slot, returning the created row.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateSlot,
    ) -> Result<Slot, sqlx::Error> {
        let query = format!(
            "INSERT INTO slots (owner_id, title, start_time, end_time)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Slot>(&query)
            .bind(owner_id)
            .bind(input.title.trim())
            .bind(input.start_time)
            .bind(input.end_time)
            .fetch_one(pool)
            .await
    }

    /// Find a slot by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Slot>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM slots WHERE id = $1");
        sqlx::query_as::<_, Slot>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a slot only if it belongs to `owner_id`.
    pub async fn find_owned(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
    ) -> Result<Option<Slot>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM slots WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, Slot>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's slots in calendar order.
    pub async fn list_by_owner(pool: &PgPool, owner_id: DbId) -> Result<Vec<Slot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM slots
             WHERE owner_id = $1
             ORDER BY start_time ASC, id ASC"
        );
        sqlx::query_as::<_, Slot>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Apply the non-`None` fields of `input` to an unlocked slot owned by
    /// `owner_id`.
    ///
    /// Returns `None` when the slot does not exist, belongs to someone else,
    /// or is `SWAP_PENDING`.
    pub async fn update_unlocked(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
        input: &UpdateSlot,
    ) -> Result<Option<Slot>, sqlx::Error> {
        let query = format!(
            "UPDATE slots SET
                title = COALESCE($3, title),
                start_time = COALESCE($4, start_time),
                end_time = COALESCE($5, end_time),
                status = COALESCE($6, status)
             WHERE id = $1 AND owner_id = $2 AND status <> 'SWAP_PENDING'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Slot>(&query)
            .bind(id)
            .bind(owner_id)
            .bind(input.title.as_deref().map(str::trim))
            .bind(input.start_time)
            .bind(input.end_time)
            .bind(input.status.map(SlotStatus::as_str))
            .fetch_optional(pool)
            .await
    }

    /// Delete an unlocked slot owned by `owner_id`.
    ///
    /// Returns `true` if a row was removed.
    pub async fn delete_unlocked(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM slots
             WHERE id = $1 AND owner_id = $2 AND status <> 'SWAP_PENDING'",
        )
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /* ---------------------------------------------------------------------
       Marketplace
       --------------------------------------------------------------------- */

    /// Every `SWAPPABLE` slot not owned by `viewer_id`, with its owner's name
    /// and email, ordered by start time.
    pub async fn list_swappable(
        pool: &PgPool,
        viewer_id: DbId,
    ) -> Result<Vec<SwappableSlot>, sqlx::Error> {
        let query = format!(
            "SELECT {QUALIFIED_COLUMNS}, u.name AS owner_name, u.email AS owner_email
             FROM slots s
             JOIN users u ON u.id = s.owner_id
             WHERE s.status = 'SWAPPABLE' AND s.owner_id <> $1
             ORDER BY s.start_time ASC, s.id ASC"
        );
        sqlx::query_as::<_, SwappableSlot>(&query)
            .bind(viewer_id)
            .fetch_all(pool)
            .await
    }

    /* ---------------------------------------------------------------------
       Negotiation (transaction-scoped)
       --------------------------------------------------------------------- */

    /// Lock the given slots `FOR UPDATE` in ascending id order.
    ///
    /// Every negotiation locks slots before requests, always in id order, so
    /// two transactions touching overlapping slots queue instead of
    /// deadlocking. Missing ids are simply absent from the result.
    pub async fn lock_many(
        conn: &mut PgConnection,
        ids: &[DbId],
    ) -> Result<Vec<Slot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM slots
             WHERE id = ANY($1)
             ORDER BY id ASC
             FOR UPDATE"
        );
        sqlx::query_as::<_, Slot>(&query)
            .bind(ids)
            .fetch_all(conn)
            .await
    }

    /// Set the status of every listed slot.
    pub async fn set_status(
        conn: &mut PgConnection,
        ids: &[DbId],
        status: SlotStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE slots SET status = $2 WHERE id = ANY($1)")
            .bind(ids)
            .bind(status.as_str())
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Hand a slot to `new_owner_id` and take it off the market.
    pub async fn transfer(
        conn: &mut PgConnection,
        id: DbId,
        new_owner_id: DbId,
    ) -> Result<Slot, sqlx::Error> {
        let query = format!(
            "UPDATE slots SET owner_id = $2, status = 'BUSY'
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Slot>(&query)
            .bind(id)
            .bind(new_owner_id)
            .fetch_one(conn)
            .await
    }

    /// Return `SWAP_PENDING` slots among `ids` to `SWAPPABLE` unless another
    /// pending request still refers to them.
    pub async fn release_unreferenced(
        conn: &mut PgConnection,
        ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE slots SET status = 'SWAPPABLE'
             WHERE id = ANY($1)
               AND status = 'SWAP_PENDING'
               AND NOT EXISTS (
                   SELECT 1 FROM swap_requests r
                   WHERE r.status = 'PENDING'
                     AND (r.requester_slot_id = slots.id OR r.responder_slot_id = slots.id)
               )",
        )
        .bind(ids)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}
