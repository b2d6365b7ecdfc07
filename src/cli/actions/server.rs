use crate::{api, session::SessionConfig};
use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub request_timeout_seconds: u64,
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: SecretString,
    pub secret_key: SecretString,
    pub session_ttl_seconds: u64,
    pub session_sweep_interval_seconds: u64,
    pub session_cookie_secure: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the DSN cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let dsn = build_dsn(&args)?;

    log_startup_args(&args, &dsn);

    let session_config = SessionConfig::new()
        .with_ttl_seconds(args.session_ttl_seconds)
        .with_sweep_interval_seconds(args.session_sweep_interval_seconds)
        .with_cookie_secure(args.session_cookie_secure);

    api::new(
        args.port,
        dsn,
        &args.secret_key,
        session_config,
        Duration::from_secs(args.request_timeout_seconds),
    )
    .await
}

fn build_dsn(args: &Args) -> Result<String> {
    let mut dsn = Url::parse(&format!(
        "postgres://{}:{}/{}",
        args.db_host, args.db_port, args.db_name
    ))
    .context("Invalid database host or name")?;

    dsn.set_username(&args.db_user)
        .map_err(|()| anyhow!("Error setting username"))?;

    dsn.set_password(Some(args.db_password.expose_secret()))
        .map_err(|()| anyhow!("Error setting password"))?;

    Ok(dsn.to_string())
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_startup_args(args: &Args, dsn: &str) {
    info!(
        listen = %format!("tcp:{}", args.port),
        dsn = %redact_dsn(dsn),
        session_ttl_seconds = args.session_ttl_seconds,
        session_sweep_interval_seconds = args.session_sweep_interval_seconds,
        session_cookie_secure = args.session_cookie_secure,
        request_timeout_seconds = args.request_timeout_seconds,
        "Startup configuration"
    );
}
