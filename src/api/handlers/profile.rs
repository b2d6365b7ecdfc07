use super::{message, Message};
use crate::auth::Authenticator;
use crate::session::Session;
use axum::{extract::Extension, http::StatusCode, response::IntoResponse};
use tracing::{debug, error};

pub const PROFILE_AUTHENTICATED: &str = "You made it to the secured profie";
pub const PROFILE_ANONYMOUS: &str = "You are not authenticated";

/// Protected resource. Anonymous callers still get a 200 with a different message.
#[utoipa::path(
    get,
    path= "/profile",
    responses (
        (status = 200, description = "Authentication status", body = Message),
        (status = 500, description = "Credential store unavailable", body = Message),
    ),
    tag= "auth"
)]
pub async fn profile(
    auth: Extension<Authenticator>,
    session: Extension<Session>,
) -> impl IntoResponse {
    debug!(session = ?session.0, "profile");

    let Some(identity) = session.identity() else {
        return message(StatusCode::OK, PROFILE_ANONYMOUS);
    };

    match auth.resolve(&identity).await {
        Ok(Some(_user)) => message(StatusCode::OK, PROFILE_AUTHENTICATED),
        Ok(None) => {
            debug!(user_id = %identity.user_id, "session identity no longer resolves");
            session.logout();
            message(StatusCode::OK, PROFILE_ANONYMOUS)
        }
        Err(err) => {
            error!("Failed to resolve session identity: {err:#}");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load profile")
        }
    }
}
