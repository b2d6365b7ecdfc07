//! Local username/password authentication.
//!
//! A login attempt looks the user up by username, recomputes the Argon2 hash
//! with the stored salt, and compares in constant time. Success yields an
//! [`Identity`](crate::store::Identity) carrying only the user id, which the
//! session layer persists; the full user is resolved from the store whenever a
//! handler needs it.

pub mod credentials;
pub mod service;

pub use service::{Authenticator, LoginOutcome, RegisterOutcome};
