//! Postgres-backed [`UserStore`] and [`SessionStore`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, types::Json, Connection, PgPool, Row};
use std::time::Duration;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{
    NewUser, SessionPayload, SessionStore, StoreError, User, UserStore, MAX_SESSION_TTL_SECONDS,
};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

/// Create the `users` and `sessions` tables when they do not exist yet.
///
/// # Errors
/// Returns an error if any schema statement fails.
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    let span = info_span!("db.query", db.system = "postgresql", db.operation = "SCHEMA");
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to apply database schema")?;
    Ok(())
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        password: row.get("password"),
        salt: row.get("salt"),
    }
}

fn ttl_seconds(ttl: Duration) -> i64 {
    let max = i64::from(i32::MAX);
    i64::try_from(ttl.as_secs().min(MAX_SESSION_TTL_SECONDS)).unwrap_or(max)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let query = r"
            INSERT INTO users (email, username, password, salt)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password)
            .bind(&user.salt)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::Conflict
                } else {
                    StoreError::Database(err)
                }
            })?;

        Ok(User {
            id: row.get("id"),
            email: user.email,
            username: user.username,
            password: user.password,
            salt: user.salt,
        })
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let query = "SELECT id, email, username, password, salt FROM users WHERE username = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let query = "SELECT id, email, username, password, salt FROM users WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn load(&self, key: &[u8]) -> Result<Option<SessionPayload>, StoreError> {
        let query = "SELECT payload FROM sessions WHERE session_hash = $1 AND expires_at > NOW()";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        match row {
            Some(row) => {
                let Json(payload) = row.try_get::<Json<SessionPayload>, _>("payload")?;
                Ok(Some(payload))
            }
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        key: &[u8],
        payload: &SessionPayload,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO sessions (session_hash, payload, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
            ON CONFLICT (session_hash)
            DO UPDATE SET payload = EXCLUDED.payload, expires_at = EXCLUDED.expires_at
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(key)
            .bind(Json(payload))
            .bind(ttl_seconds(ttl))
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }

    async fn touch(&self, key: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let query = r"
            UPDATE sessions
            SET expires_at = NOW() + ($2 * INTERVAL '1 second')
            WHERE session_hash = $1 AND expires_at > NOW()
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(key)
            .bind(ttl_seconds(ttl))
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }

    async fn destroy(&self, key: &[u8]) -> Result<(), StoreError> {
        let query = "DELETE FROM sessions WHERE session_hash = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(key)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let query = "DELETE FROM sessions WHERE expires_at <= NOW()";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn ttl_seconds_clamps_large_values() {
        assert_eq!(ttl_seconds(Duration::from_secs(60)), 60);
        assert_eq!(ttl_seconds(Duration::MAX), i64::from(i32::MAX));
    }

    #[test]
    fn schema_declares_unique_username() {
        assert!(SCHEMA_SQL.contains("CREATE UNIQUE INDEX IF NOT EXISTS users_username_key"));
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS sessions"));
    }
}
