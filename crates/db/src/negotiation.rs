//! Transactional swap negotiation.
//!
//! [`NegotiationEngine`] owns every state change that touches more than one
//! row: creating a request freezes two slots, accepting one exchanges owners
//! and voids competing requests, rejecting one releases the slots.
//!
//! Each operation runs in a single transaction. Rows are locked in a fixed
//! order (slots in ascending id, then requests) and every precondition is
//! checked again once the locks are held, so concurrent calls serialize on
//! the rows they share and never observe a half-applied negotiation.
//!
//! The engine does not publish anything itself. Operations return the
//! [`SwapNotice`]s for the affected users alongside the result, and the
//! caller hands them to its notification gateway after the commit.

use slotswap_core::notice::{SwapEventKind, SwapNotice};
use slotswap_core::slot::SlotStatus;
use slotswap_core::swap::{self, InvalidSlotReason, NegotiationError, SwapDecision};
use slotswap_core::types::DbId;

use crate::models::slot::{Slot, SwappableSlot};
use crate::models::swap_request::{SwapRequest, SwapRequestLists};
use crate::repositories::swap_request_repo::PENDING_PAIR_CONSTRAINT;
use crate::repositories::{SlotRepo, SwapRequestRepo};
use crate::DbPool;

/// Failure of a negotiation operation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A domain precondition did not hold. Nothing was written.
    #[error(transparent)]
    Rejected(#[from] NegotiationError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The result of a committed operation plus the notices it produced.
#[derive(Debug)]
pub struct Negotiated<T> {
    pub value: T,
    pub notices: Vec<SwapNotice>,
}

/// Coordinates swap requests over a connection pool.
#[derive(Debug, Clone)]
pub struct NegotiationEngine {
    pool: DbPool,
}

impl NegotiationEngine {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /* ---------------------------------------------------------------------
       Queries
       --------------------------------------------------------------------- */

    /// Marketplace listing for `viewer_id`: every swappable slot owned by
    /// someone else.
    pub async fn list_swappable(&self, viewer_id: DbId) -> Result<Vec<SwappableSlot>, sqlx::Error> {
        SlotRepo::list_swappable(&self.pool, viewer_id).await
    }

    /// Incoming pending requests and all outgoing requests for `user_id`.
    pub async fn list_requests(&self, user_id: DbId) -> Result<SwapRequestLists, sqlx::Error> {
        let incoming = SwapRequestRepo::list_incoming(&self.pool, user_id).await?;
        let outgoing = SwapRequestRepo::list_outgoing(&self.pool, user_id).await?;
        Ok(SwapRequestLists { incoming, outgoing })
    }

    /* ---------------------------------------------------------------------
       Create
       --------------------------------------------------------------------- */

    /// Offer `requester_slot_id` in exchange for `responder_slot_id`.
    ///
    /// Both slots must be `SWAPPABLE`; on success both become `SWAP_PENDING`
    /// and the responder is notified.
    pub async fn create(
        &self,
        requester_id: DbId,
        requester_slot_id: DbId,
        responder_slot_id: DbId,
    ) -> Result<Negotiated<SwapRequest>, EngineError> {
        let mut tx = self.pool.begin().await?;

        let locked = SlotRepo::lock_many(&mut *tx, &[requester_slot_id, responder_slot_id]).await?;
        let snapshot = |id: DbId| locked.iter().find(|s| s.id == id).map(Slot::snapshot);

        let responder_id = swap::check_create(
            requester_id,
            requester_slot_id,
            snapshot(requester_slot_id),
            responder_slot_id,
            snapshot(responder_slot_id),
        )?;

        // The partial unique index on pending pairs is the authority on
        // duplicates.
        let request = match SwapRequestRepo::insert(
            &mut *tx,
            requester_id,
            responder_id,
            requester_slot_id,
            responder_slot_id,
        )
        .await
        {
            Ok(request) => request,
            Err(e) if is_pending_pair_violation(&e) => {
                return Err(NegotiationError::DuplicateRequest {
                    requester_slot_id,
                    responder_slot_id,
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };

        SlotRepo::set_status(
            &mut *tx,
            &request.slot_ids(),
            SlotStatus::SwapPending,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = request.id,
            requester_id,
            responder_id,
            requester_slot_id,
            responder_slot_id,
            "Swap request created",
        );

        let notices = vec![SwapNotice::new(
            responder_id,
            SwapEventKind::RequestReceived,
            request.id,
        )];
        Ok(Negotiated {
            value: request,
            notices,
        })
    }

    /* ---------------------------------------------------------------------
       Respond
       --------------------------------------------------------------------- */

    /// Accept or reject a pending request addressed to `responder_id`.
    ///
    /// Accepting exchanges the two slots' owners, leaves both `BUSY`, rejects
    /// every other pending request involving either slot and releases the
    /// slots those requests had frozen. Rejecting releases both slots unless
    /// another pending request still holds them.
    pub async fn respond(
        &self,
        request_id: DbId,
        responder_id: DbId,
        decision: SwapDecision,
    ) -> Result<Negotiated<SwapRequest>, EngineError> {
        let mut tx = self.pool.begin().await?;

        // Unlocked read to learn which slots to lock.
        let peeked = SwapRequestRepo::peek(&mut *tx, request_id)
            .await?
            .ok_or(NegotiationError::NotFound { request_id })?;
        swap::check_respond(&peeked.snapshot(), responder_id)?;

        let pair = peeked.slot_ids();
        let mut lock_set = pair.to_vec();
        if decision == SwapDecision::Accept {
            lock_set.extend(SwapRequestRepo::pending_neighbour_slot_ids(&mut *tx, &pair).await?);
        }
        lock_set.sort_unstable();
        lock_set.dedup();

        let slots = SlotRepo::lock_many(&mut *tx, &lock_set).await?;

        let request = SwapRequestRepo::lock(&mut *tx, request_id)
            .await?
            .ok_or(NegotiationError::NotFound { request_id })?;
        swap::check_respond(&request.snapshot(), responder_id)?;
        let next = request
            .status
            .apply(decision)
            .map_err(|status| NegotiationError::AlreadyProcessed { request_id, status })?;

        let mut notices = Vec::new();
        let updated = match decision {
            SwapDecision::Accept => {
                ensure_engaged(&slots, &request)?;

                SlotRepo::transfer(&mut *tx, request.requester_slot_id, request.responder_id)
                    .await?;
                SlotRepo::transfer(&mut *tx, request.responder_slot_id, request.requester_id)
                    .await?;
                let updated = SwapRequestRepo::set_status(&mut *tx, request_id, next).await?;

                let superseded =
                    SwapRequestRepo::lock_pending_touching(&mut *tx, &pair, request_id).await?;
                if !superseded.is_empty() {
                    let ids: Vec<DbId> = superseded.iter().map(|r| r.id).collect();
                    SwapRequestRepo::reject_many(&mut *tx, &ids).await?;

                    let mut freed: Vec<DbId> = superseded
                        .iter()
                        .flat_map(SwapRequest::slot_ids)
                        .filter(|id| !pair.contains(id))
                        .collect();
                    freed.sort_unstable();
                    freed.dedup();
                    SlotRepo::release_unreferenced(&mut *tx, &freed).await?;

                    tracing::info!(
                        request_id,
                        superseded = ?ids,
                        "Competing swap requests rejected",
                    );
                }

                notices.push(SwapNotice::new(
                    request.requester_id,
                    SwapEventKind::RequestAccepted,
                    request_id,
                ));
                notices.extend(superseded.iter().map(|r| {
                    SwapNotice::new(r.requester_id, SwapEventKind::RequestRejected, r.id)
                }));
                updated
            }
            SwapDecision::Reject => {
                let updated = SwapRequestRepo::set_status(&mut *tx, request_id, next).await?;
                SlotRepo::release_unreferenced(&mut *tx, &pair).await?;

                notices.push(SwapNotice::new(
                    request.requester_id,
                    SwapEventKind::RequestRejected,
                    request_id,
                ));
                updated
            }
        };

        tx.commit().await?;

        tracing::info!(
            request_id,
            responder_id,
            status = %updated.status,
            "Swap request answered",
        );

        Ok(Negotiated {
            value: updated,
            notices,
        })
    }
}

/// Both slots of a pending request must still exist with their original
/// owners before ownership is exchanged.
fn ensure_engaged(slots: &[Slot], request: &SwapRequest) -> Result<(), NegotiationError> {
    let sides = [
        (request.requester_slot_id, request.requester_id),
        (request.responder_slot_id, request.responder_id),
    ];
    for (slot_id, owner_id) in sides {
        match slots.iter().find(|s| s.id == slot_id) {
            None => {
                return Err(NegotiationError::InvalidSlot {
                    slot_id,
                    reason: InvalidSlotReason::Missing,
                })
            }
            Some(slot) if slot.owner_id != owner_id => {
                return Err(NegotiationError::InvalidSlot {
                    slot_id,
                    reason: InvalidSlotReason::NotOwned,
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Whether an insert lost the race on the pending-pair unique index.
fn is_pending_pair_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505")
                && db_err.constraint() == Some(PENDING_PAIR_CONSTRAINT)
        }
        _ => false,
    }
}
