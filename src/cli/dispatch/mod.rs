//! Map validated CLI arguments to the server action.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{database, server, session};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or empty.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(server::ARG_PORT)
        .copied()
        .context("missing required argument: --port")?;
    let request_timeout_seconds = matches
        .get_one::<u64>(server::ARG_REQUEST_TIMEOUT_SECONDS)
        .copied()
        .unwrap_or(30);

    let db_opts = database::Options::parse(matches)?;
    let session_opts = session::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        request_timeout_seconds,
        db_host: db_opts.host,
        db_port: db_opts.port,
        db_name: db_opts.name,
        db_user: db_opts.user,
        db_password: db_opts.password,
        secret_key: session_opts.secret_key,
        session_ttl_seconds: session_opts.ttl_seconds,
        session_sweep_interval_seconds: session_opts.sweep_interval_seconds,
        session_cookie_secure: session_opts.cookie_secure,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn matches_from(secret: &str) -> clap::ArgMatches {
        crate::cli::commands::new().get_matches_from(vec![
            "keyhole",
            "--port",
            "3000",
            "--db-host",
            "localhost",
            "--db-port",
            "5432",
            "--db-name",
            "keyhole",
            "--db-user",
            "app",
            "--db-password",
            "pw",
            "--secret-key",
            secret,
        ])
    }

    fn without_env<F: FnOnce()>(f: F) {
        temp_env::with_vars(
            [
                ("SESSION_TTL_SECONDS", None::<&str>),
                ("SESSION_SWEEP_INTERVAL_SECONDS", None),
                ("SESSION_COOKIE_SECURE", None),
                ("REQUEST_TIMEOUT_SECONDS", None),
            ],
            f,
        );
    }

    #[test]
    fn builds_server_action() {
        without_env(|| {
            let result = handler(&matches_from("signing-key"));
            let Ok(Action::Server(args)) = result else {
                panic!("expected server action");
            };
            assert_eq!(args.port, 3000);
            assert_eq!(args.db_name, "keyhole");
            assert_eq!(args.secret_key.expose_secret(), "signing-key");
            assert_eq!(args.session_ttl_seconds, 1_209_600);
            assert_eq!(args.session_sweep_interval_seconds, 60);
            assert_eq!(args.request_timeout_seconds, 30);
            assert!(!args.session_cookie_secure);
        });
    }

    #[test]
    fn blank_secret_key_is_rejected() {
        without_env(|| {
            let result = handler(&matches_from("   "));
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err
                    .to_string()
                    .contains("missing required argument: --secret-key"));
            }
        });
    }
}
