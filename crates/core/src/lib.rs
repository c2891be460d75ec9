//! Domain types and rules for the slot swap marketplace.
//!
//! Nothing in this crate touches the database or the network. The store and
//! the HTTP boundary both lean on these definitions so the status vocabulary,
//! the negotiation state machine and the error taxonomy live in one place.

pub mod error;
pub mod notice;
pub mod slot;
pub mod swap;
pub mod types;
