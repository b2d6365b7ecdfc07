//! Persistence seams for users and sessions.
//!
//! Handlers and the session layer only see the [`UserStore`] and
//! [`SessionStore`] traits. [`PgStore`] backs both with Postgres; [`MemoryStore`]
//! keeps everything in process and is what the HTTP tests run against.
//!
//! Session records are addressed by the SHA-256 digest of the session id, so
//! a store never sees the raw value carried by the cookie.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use models::{Identity, NewUser, SessionPayload, User};
pub use postgres::PgStore;

/// Largest session TTL in seconds. Postgres interval arithmetic and the cookie
/// `Max-Age` both stay within 32 bits.
pub const MAX_SESSION_TTL_SECONDS: u64 = 2_147_483_647;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write (duplicate username).
    #[error("record already exists")]
    Conflict,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user, returning [`StoreError::Conflict`] when the username is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Round trip to the backing store, used by `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a live session; expired records are reported as missing.
    async fn load(&self, key: &[u8]) -> Result<Option<SessionPayload>, StoreError>;

    /// Upsert a session and push its expiry to now + `ttl` (last writer wins).
    async fn save(
        &self,
        key: &[u8],
        payload: &SessionPayload,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Push the expiry of a live session to now + `ttl` without rewriting it.
    async fn touch(&self, key: &[u8], ttl: Duration) -> Result<(), StoreError>;

    async fn destroy(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Delete every expired record and return how many were removed.
    async fn delete_expired(&self) -> Result<u64, StoreError>;
}
