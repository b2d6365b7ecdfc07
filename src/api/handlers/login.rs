use super::message;
use crate::auth::{Authenticator, LoginOutcome};
use crate::session::Session;
use axum::{
    extract::Extension,
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

pub const LOGIN_SUCCESS_PATH: &str = "/login-success";
pub const LOGIN_FAILURE_PATH: &str = "/login-failure";

#[derive(ToSchema, Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

fn redirect(path: &'static str) -> Response {
    (StatusCode::FOUND, [(LOCATION, path)]).into_response()
}

#[utoipa::path(
    post,
    path= "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses (
        (status = 302, description = "Redirect to /login-success or /login-failure"),
        (status = 500, description = "Credential store unavailable", body = super::Message),
    ),
    tag= "auth"
)]
#[instrument(skip(auth, session))]
pub async fn login(
    auth: Extension<Authenticator>,
    session: Extension<Session>,
    payload: Option<Form<LoginForm>>,
) -> Response {
    let Some(Form(form)) = payload else {
        debug!("missing credentials");
        return redirect(LOGIN_FAILURE_PATH);
    };

    match auth.authenticate(&form.username, &form.password).await {
        Ok(LoginOutcome::Success(identity)) => {
            if let Err(err) = session.login(identity) {
                error!("Failed to establish session: {err:#}");
                return message(StatusCode::INTERNAL_SERVER_ERROR, "Login failed").into_response();
            }
            redirect(LOGIN_SUCCESS_PATH)
        }
        Ok(LoginOutcome::Failure) => redirect(LOGIN_FAILURE_PATH),
        Err(err) => {
            error!("Failed to authenticate: {err:#}");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Login failed").into_response()
        }
    }
}

#[utoipa::path(
    get,
    path= "/login-success",
    responses (
        (status = 200, description = "Login result page", body = String, content_type = "text/plain"),
    ),
    tag= "auth"
)]
pub async fn login_success(session: Extension<Session>) -> &'static str {
    debug!(session = ?session.0, "login success page");
    "Login Attempt was successful."
}

#[utoipa::path(
    get,
    path= "/login-failure",
    responses (
        (status = 200, description = "Login result page", body = String, content_type = "text/plain"),
    ),
    tag= "auth"
)]
pub async fn login_failure(session: Extension<Session>) -> &'static str {
    debug!(session = ?session.0, "login failure page");
    "Login Attempt Failed."
}
