use super::{message, Message};
use crate::auth::{Authenticator, RegisterOutcome};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Form};
use serde::Deserialize;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct RegisterForm {
    email: String,
    username: String,
    password: String,
}

impl std::fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterForm")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[utoipa::path(
    post,
    path= "/register",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses (
        (status = 200, description = "User created", body = Message),
        (status = 400, description = "Missing email, username or password", body = Message),
        (status = 409, description = "Username already taken", body = Message),
        (status = 500, description = "Registration failed", body = Message),
    ),
    tag= "auth"
)]
#[instrument(skip(auth))]
pub async fn register(
    auth: Extension<Authenticator>,
    payload: Option<Form<RegisterForm>>,
) -> impl IntoResponse {
    let form = match payload {
        Some(Form(form))
            if !form.email.is_empty()
                && !form.username.is_empty()
                && !form.password.is_empty() =>
        {
            form
        }
        _ => return message(StatusCode::BAD_REQUEST, "Missing credentials"),
    };

    match auth
        .register(&form.email, &form.username, &form.password)
        .await
    {
        Ok(RegisterOutcome::Created(user)) => {
            info!(user_id = %user.id, "user registered");
            message(StatusCode::OK, "Successful")
        }
        Ok(RegisterOutcome::UsernameTaken) => {
            info!("username already taken");
            message(StatusCode::CONFLICT, "Username already taken")
        }
        Err(err) => {
            error!("Failed to register user: {err:#}");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed")
        }
    }
}
