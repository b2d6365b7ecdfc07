//! In-process store. Expiry is measured with `tokio::time::Instant`, so tests
//! can drive it with a paused clock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::{
    NewUser, SessionPayload, SessionStore, StoreError, User, UserStore, MAX_SESSION_TTL_SECONDS,
};

fn expiry(now: Instant, ttl: Duration) -> Instant {
    let ttl = ttl.min(Duration::from_secs(MAX_SESSION_TTL_SECONDS));
    now.checked_add(ttl).unwrap_or(now)
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Vec<u8>, (SessionPayload, Instant)>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    /// Number of session records held, expired ones included until swept.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.lock();
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict);
        }
        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            username: user.username,
            password: user.password,
            salt: user.salt,
        };
        inner.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, key: &[u8]) -> Result<Option<SessionPayload>, StoreError> {
        let now = Instant::now();
        Ok(self
            .lock()
            .sessions
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(payload, _)| payload.clone()))
    }

    async fn save(
        &self,
        key: &[u8],
        payload: &SessionPayload,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = expiry(Instant::now(), ttl);
        self.lock()
            .sessions
            .insert(key.to_vec(), (payload.clone(), expires_at));
        Ok(())
    }

    async fn touch(&self, key: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        if let Some((_, expires_at)) = self.lock().sessions.get_mut(key) {
            if *expires_at > now {
                *expires_at = expiry(now, ttl);
            }
        }
        Ok(())
    }

    async fn destroy(&self, key: &[u8]) -> Result<(), StoreError> {
        self.lock().sessions.remove(key);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut inner = self.lock();
        let before = inner.sessions.len();
        inner.sessions.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - inner.sessions.len()) as u64)
    }
}
