use super::handlers;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::register::register,
        handlers::login::login,
        handlers::login::login_success,
        handlers::login::login_failure,
        handlers::profile::profile,
        handlers::logout::logout,
    ),
    components(schemas(
        handlers::Message,
        handlers::health::Health,
        handlers::register::RegisterForm,
        handlers::login::LoginForm,
    )),
    tags(
        (name = "auth", description = "Registration, login and session status"),
        (name = "health", description = "Service and database health"),
    )
)]
struct ApiDoc;

/// `OpenAPI` document for every route served by [`super::router`].
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for path in [
            "/health",
            "/register",
            "/login",
            "/login-success",
            "/login-failure",
            "/profile",
            "/logout",
        ] {
            assert!(paths.contains(&path), "missing {path}");
        }
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
    }
}
