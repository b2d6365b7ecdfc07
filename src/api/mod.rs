use crate::{
    auth::Authenticator,
    session::{self, SessionConfig, SessionManager},
    store::{postgres, PgStore, SessionStore, UserStore},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer,
    timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Build the application router over the given stores.
///
/// Timeouts are applied by [`new`], so tests can drive this router with a
/// paused clock.
#[must_use]
pub fn router(users: Arc<dyn UserStore>, sessions: SessionManager) -> Router {
    let auth = Authenticator::new(users.clone());

    Router::new()
        .route("/health", get(handlers::health))
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/login-success", get(handlers::login_success))
        .route("/login-failure", get(handlers::login_failure))
        .route("/profile", get(handlers::profile))
        .route("/logout", post(handlers::logout))
        .layer(middleware::from_fn_with_state(sessions, session::manage))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(auth))
                .layer(Extension(users)),
        )
}

/// Start the server
/// # Errors
/// Return error if the database is unreachable or the listener fails
pub async fn new(
    port: u16,
    dsn: String,
    secret_key: &SecretString,
    session_config: SessionConfig,
    request_timeout: Duration,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .acquire_timeout(Duration::from_secs(10))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .inspect_err(|err| error!("Failed to connect to database: {err}"))
        .context("Failed to connect to database")?;

    postgres::apply_schema(&pool).await?;

    let store = Arc::new(PgStore::new(pool));
    let session_store: Arc<dyn SessionStore> = store.clone();
    let user_store: Arc<dyn UserStore> = store;

    let sessions = SessionManager::new(session_store.clone(), secret_key, session_config)?;
    let sweeper = session::spawn_sweeper(session_store, sessions.config().sweep_interval());

    let app = router(user_store, sessions).layer(TimeoutLayer::new(request_timeout));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.abort();

    served?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
