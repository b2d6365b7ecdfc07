use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, instrument};

use super::credentials::{hash_password, verify_password};
use crate::store::{Identity, NewUser, StoreError, User, UserStore};

/// Result of a registration attempt.
#[derive(Debug)]
pub enum RegisterOutcome {
    Created(User),
    UsernameTaken,
}

/// Result of a single login attempt. Failure is an outcome, not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    Success(Identity),
    Failure,
}

/// Local username/password strategy over a [`UserStore`].
///
/// Built once at startup and shared with the router; there is no global
/// strategy registry.
#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserStore>,
}

impl Authenticator {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Hash the password and create the user.
    ///
    /// # Errors
    /// Returns an error if hashing fails or the store is unavailable.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<RegisterOutcome> {
        let password = password.to_string();
        // Argon2 is CPU bound; keep it off the async workers.
        let credential = task::spawn_blocking(move || hash_password(&password))
            .await
            .context("password hashing task failed")??;

        let new_user = NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password: credential.hash,
            salt: credential.salt,
        };

        match self.users.insert_user(new_user).await {
            Ok(user) => Ok(RegisterOutcome::Created(user)),
            Err(StoreError::Conflict) => Ok(RegisterOutcome::UsernameTaken),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    /// Verify a username/password pair.
    ///
    /// # Errors
    /// Returns an error only when the store or the hashing task fails; bad
    /// credentials are reported as [`LoginOutcome::Failure`].
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let Some(user) = self
            .users
            .find_by_username(username)
            .await
            .context("failed to lookup user")?
        else {
            debug!("unknown username");
            return Ok(LoginOutcome::Failure);
        };

        let password = password.to_string();
        let User {
            id, password: hash, salt, ..
        } = user;
        let verified = task::spawn_blocking(move || verify_password(&password, &hash, &salt))
            .await
            .context("password verification task failed")?;

        if verified {
            Ok(LoginOutcome::Success(Identity::new(id)))
        } else {
            debug!("password mismatch");
            Ok(LoginOutcome::Failure)
        }
    }

    /// Resolve a session identity back to its user.
    ///
    /// # Errors
    /// Returns an error if the store lookup fails.
    pub async fn resolve(&self, identity: &Identity) -> Result<Option<User>> {
        self.users
            .find_by_id(identity.user_id)
            .await
            .context("failed to resolve session identity")
    }
}
