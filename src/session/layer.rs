use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;

use super::SessionManager;

/// Middleware that attaches a [`Session`](super::Session) to the request and
/// commits it once the handler has produced a response.
pub async fn manage(
    State(manager): State<SessionManager>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = match manager.load(request.headers()).await {
        Ok(session) => session,
        Err(err) => {
            error!("Failed to load session: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;
    manager.commit(&session, response.headers_mut()).await;
    response
}
