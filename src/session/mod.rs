//! Server-side sessions addressed by a signed cookie.
//!
//! Flow Overview:
//! - [`layer::manage`] reads the `keyhole.sid` cookie, checks its HMAC and loads
//!   the record from the [`SessionStore`]. Missing, forged, or expired cookies
//!   get a fresh anonymous [`Session`].
//! - Handlers read and mutate the [`Session`] through request extensions.
//! - After the handler returns, modified sessions are saved and the cookie is
//!   (re)issued; untouched sessions have their expiry pushed forward; destroyed
//!   sessions are deleted and the cookie is cleared.
//!
//! Anonymous sessions are created lazily: nothing is written to the store and
//! no cookie is sent until a handler modifies the session.
//!
//! Concurrent requests for the same session are not coordinated; the last save
//! wins.

pub mod cookie;
pub mod layer;
pub mod sweeper;

use anyhow::{Context, Result};
use axum::http::{header::SET_COOKIE, HeaderMap};
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error};

use self::cookie::{
    clear_session_cookie, generate_session_id, read_cookie, session_cookie, session_key,
    CookieSigner,
};
use crate::store::{Identity, SessionPayload, SessionStore, MAX_SESSION_TTL_SECONDS};

pub use self::layer::manage;
pub use self::sweeper::spawn_sweeper;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 14 * 24 * 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    ttl: Duration,
    sweep_interval: Duration,
    cookie_secure: bool,
}

impl SessionConfig {
    /// Defaults: 14 day TTL, sweep every minute, cookie without `Secure`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECONDS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECONDS),
            cookie_secure: false,
        }
    }

    #[must_use]
    pub const fn with_ttl_seconds(mut self, seconds: u64) -> Self {
        self.ttl = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub const fn with_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.sweep_interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub const fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    /// Replace zero durations, which would expire every session immediately or
    /// spin the sweeper, with one second. The TTL is capped at
    /// [`MAX_SESSION_TTL_SECONDS`] so the cookie and the store agree on expiry.
    #[must_use]
    pub fn normalize(self) -> Self {
        let floor = |d: Duration| {
            if d.is_zero() {
                Duration::from_secs(1)
            } else {
                d
            }
        };
        Self {
            ttl: floor(self.ttl).min(Duration::from_secs(MAX_SESSION_TTL_SECONDS)),
            sweep_interval: floor(self.sweep_interval),
            cookie_secure: self.cookie_secure,
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    #[must_use]
    pub const fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct SessionInner {
    id: String,
    payload: SessionPayload,
    persisted: bool,
    modified: bool,
    destroyed: bool,
    // Id replaced by `regenerate`, deleted on commit.
    stale_id: Option<String>,
}

/// Per-request handle to the current session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

enum Commit {
    Nothing,
    Touch(String),
    Save {
        id: String,
        payload: SessionPayload,
        stale_id: Option<String>,
    },
    Destroy(Vec<String>),
}

impl Session {
    fn from_parts(id: String, payload: SessionPayload, persisted: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                id,
                payload,
                persisted,
                modified: false,
                destroyed: false,
                stale_id: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        let inner = self.lock();
        if inner.destroyed {
            None
        } else {
            inner.payload.identity
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity().is_some()
    }

    /// True until the session has been read back from the store.
    #[must_use]
    pub fn is_new(&self) -> bool {
        !self.lock().persisted
    }

    /// Attach an identity under a freshly generated id.
    ///
    /// # Errors
    /// Returns an error if a new session id cannot be generated.
    pub fn login(&self, identity: Identity) -> Result<()> {
        self.regenerate()?;
        let mut inner = self.lock();
        inner.payload.identity = Some(identity);
        inner.modified = true;
        Ok(())
    }

    /// Drop the identity but keep the session.
    pub fn logout(&self) {
        let mut inner = self.lock();
        if inner.payload.identity.take().is_some() {
            inner.modified = true;
        }
    }

    /// Delete the session record and clear the cookie on commit.
    pub fn destroy(&self) {
        self.lock().destroyed = true;
    }

    /// Swap the session id, keeping the payload; the old record is deleted on commit.
    ///
    /// # Errors
    /// Returns an error if a new session id cannot be generated.
    pub fn regenerate(&self) -> Result<()> {
        let new_id = generate_session_id()?;
        let mut inner = self.lock();
        let old_id = std::mem::replace(&mut inner.id, new_id);
        if inner.persisted && inner.stale_id.is_none() {
            inner.stale_id = Some(old_id);
        }
        inner.persisted = false;
        inner.modified = true;
        Ok(())
    }

    fn commit_plan(&self) -> Commit {
        let inner = self.lock();
        if inner.destroyed {
            let mut ids: Vec<String> = inner.stale_id.iter().cloned().collect();
            if inner.persisted {
                ids.push(inner.id.clone());
            }
            Commit::Destroy(ids)
        } else if inner.modified {
            Commit::Save {
                id: inner.id.clone(),
                payload: inner.payload.clone(),
                stale_id: inner.stale_id.clone(),
            }
        } else if inner.persisted {
            Commit::Touch(inner.id.clone())
        } else {
            Commit::Nothing
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Session")
            .field("new", &!inner.persisted)
            .field("identity", &inner.payload.identity)
            .finish()
    }
}

/// Loads sessions for incoming requests and persists them afterwards.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    signer: CookieSigner,
    config: SessionConfig,
}

impl SessionManager {
    /// # Errors
    /// Returns an error if the signing secret is empty.
    pub fn new(
        store: Arc<dyn SessionStore>,
        secret: &SecretString,
        config: SessionConfig,
    ) -> Result<Self> {
        let signer = CookieSigner::new(secret.expose_secret().as_bytes())?;
        Ok(Self {
            store,
            signer,
            config: config.normalize(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    /// Resolve the request's session, falling back to a new anonymous one.
    ///
    /// # Errors
    /// Returns an error if the store lookup fails or no session id can be generated.
    pub async fn load(&self, headers: &HeaderMap) -> Result<Session> {
        let id = read_cookie(headers).and_then(|value| self.signer.unsign(&value));

        if let Some(id) = id {
            let payload = self
                .store
                .load(&session_key(&id))
                .await
                .context("failed to load session")?;
            if let Some(payload) = payload {
                return Ok(Session::from_parts(id, payload, true));
            }
            debug!("session cookie did not match a live session");
        }

        Ok(Session::from_parts(
            generate_session_id()?,
            SessionPayload::default(),
            false,
        ))
    }

    /// Persist the outcome of a request and set the matching cookie headers.
    /// Store failures are logged; the response is still returned.
    pub async fn commit(&self, session: &Session, headers: &mut HeaderMap) {
        let ttl = self.config.ttl();
        let secure = self.config.cookie_secure();

        match session.commit_plan() {
            Commit::Nothing => {}
            Commit::Touch(id) => {
                if let Err(err) = self.store.touch(&session_key(&id), ttl).await {
                    error!("Failed to touch session: {err}");
                    return;
                }
                self.set_cookie(headers, &id);
            }
            Commit::Save {
                id,
                payload,
                stale_id,
            } => {
                if let Some(stale_id) = stale_id {
                    if let Err(err) = self.store.destroy(&session_key(&stale_id)).await {
                        error!("Failed to delete regenerated session: {err}");
                    }
                }
                if let Err(err) = self.store.save(&session_key(&id), &payload, ttl).await {
                    error!("Failed to save session: {err}");
                    return;
                }
                self.set_cookie(headers, &id);
            }
            Commit::Destroy(ids) => {
                for id in ids {
                    if let Err(err) = self.store.destroy(&session_key(&id)).await {
                        error!("Failed to delete session: {err}");
                    }
                }
                match clear_session_cookie(secure) {
                    Ok(cookie) => {
                        headers.append(SET_COOKIE, cookie);
                    }
                    Err(err) => error!("Failed to build session cookie: {err}"),
                }
            }
        }
    }

    fn set_cookie(&self, headers: &mut HeaderMap, id: &str) {
        let signed = self.signer.sign(id);
        match session_cookie(&signed, self.config.ttl(), self.config.cookie_secure()) {
            Ok(cookie) => {
                headers.append(SET_COOKIE, cookie);
            }
            Err(err) => error!("Failed to build session cookie: {err}"),
        }
    }
}
