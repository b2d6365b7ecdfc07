//! # Keyhole
//!
//! Session-based username/password authentication over HTTP.
//!
//! ## Request lifecycle
//!
//! Every request passes through the session middleware, which resolves the
//! signed `keyhole.sid` cookie to a server-side record in Postgres. Handlers
//! read or mutate that session; the middleware persists it afterwards and
//! refreshes its expiry. A background task sweeps expired records.
//!
//! ## Credentials
//!
//! Passwords are hashed with Argon2id and a per-user random salt. Login
//! attempts that fail for any reason redirect to `/login-failure`; successful
//! ones regenerate the session id and attach the user id to the session.
//!
//! ## Storage
//!
//! Handlers depend on the [`store::UserStore`] and [`store::SessionStore`]
//! traits. The binary wires in [`store::PgStore`]; tests use
//! [`store::MemoryStore`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod session;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
