use crate::session::Session;
use axum::{extract::Extension, http::StatusCode};
use tracing::debug;

#[utoipa::path(
    post,
    path= "/logout",
    responses (
        (status = 204, description = "Session destroyed and cookie cleared"),
    ),
    tag= "auth"
)]
pub async fn logout(session: Extension<Session>) -> StatusCode {
    debug!(authenticated = session.is_authenticated(), "logout");
    session.destroy();
    StatusCode::NO_CONTENT
}
