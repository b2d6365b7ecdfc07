pub mod health;
pub mod login;
pub mod logout;
pub mod profile;
pub mod register;

pub use self::health::health;
pub use self::login::{login, login_failure, login_success};
pub use self::logout::logout;
pub use self::profile::profile;
pub use self::register::register;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// JSON body shared by the register and profile endpoints.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message: String,
}

pub(crate) fn message(status: StatusCode, text: &str) -> impl IntoResponse {
    (
        status,
        Json(Message {
            message: text.to_string(),
        }),
    )
}
