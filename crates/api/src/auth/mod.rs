//! Authentication primitives.
//!
//! - [`jwt`] -- JWT access-token generation and validation.
//!
//! Accounts and sign-in live with the identity provider that shares the
//! signing secret; this server only verifies the tokens it is handed.

pub mod jwt;
