//! Background removal of expired session records.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info_span, Instrument};

use crate::store::SessionStore;

/// Spawn a task that deletes expired sessions every `every`.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(err) = sweep_once(store.as_ref())
                .instrument(info_span!("session.sweep"))
                .await
            {
                error!("session sweep failed: {err}");
            }
        }
    })
}

/// Run a single sweep, returning the number of records removed.
///
/// # Errors
/// Returns an error if the store rejects the delete.
pub async fn sweep_once(store: &dyn SessionStore) -> Result<u64> {
    let removed = store
        .delete_expired()
        .await
        .context("failed to delete expired sessions")?;
    if removed > 0 {
        debug!(removed, "expired sessions removed");
    }
    Ok(removed)
}
