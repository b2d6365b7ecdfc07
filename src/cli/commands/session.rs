use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

use crate::store::MAX_SESSION_TTL_SECONDS;

pub const ARG_SECRET_KEY: &str = "secret-key";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_SWEEP_INTERVAL_SECONDS: &str = "session-sweep-interval-seconds";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";

#[derive(Debug)]
pub struct Options {
    pub secret_key: SecretString,
    pub ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub cookie_secure: bool,
}

impl Options {
    /// Parse session options from CLI matches.
    ///
    /// # Errors
    /// Returns an error if the secret key is missing or blank.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let secret_key = matches
            .get_one::<String>(ARG_SECRET_KEY)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("missing required argument: --{ARG_SECRET_KEY}"))?;

        Ok(Self {
            secret_key: SecretString::from(secret_key),
            ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(1_209_600),
            sweep_interval_seconds: matches
                .get_one::<u64>(ARG_SESSION_SWEEP_INTERVAL_SECONDS)
                .copied()
                .unwrap_or(60),
            cookie_secure: matches.get_flag(ARG_SESSION_COOKIE_SECURE),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SECRET_KEY)
                .long(ARG_SECRET_KEY)
                .help("Secret used to sign session cookies")
                .env("SECRET_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session TTL in seconds, refreshed on every request")
                .env("SESSION_TTL_SECONDS")
                .default_value("1209600")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_SESSION_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SESSION_SWEEP_INTERVAL_SECONDS)
                .long(ARG_SESSION_SWEEP_INTERVAL_SECONDS)
                .help("Interval between expired session sweeps in seconds")
                .env("SESSION_SWEEP_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure (HTTPS only)")
                .env("SESSION_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}
