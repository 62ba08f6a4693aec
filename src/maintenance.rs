use std::time::Duration;

use tokio::sync::watch;

use crate::db;
use crate::state::SharedState;

pub const INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Periodically purge expired credentials until shutdown is signaled.
pub async fn run(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    tracing::debug!("Maintenance task started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(INTERVAL) => {}
            _ = shutdown.changed() => {}
        }

        if *shutdown.borrow() {
            break;
        }

        if let Err(e) = sweep(&state).await {
            tracing::error!("Maintenance sweep failed: {e}");
        }
    }

    tracing::debug!("Maintenance task stopped");
}

/// One pass: expired refresh tokens, stale password resets, limiter entries.
pub async fn sweep(state: &SharedState) -> Result<(), sqlx::Error> {
    let tokens = db::refresh_tokens::delete_expired(&state.pool).await?;
    let resets = db::password_resets::purge_stale(&state.pool).await?;

    state.login_limiter.cleanup();
    state.otp_limiter.cleanup();

    if tokens > 0 || resets > 0 {
        tracing::info!("Purged {tokens} refresh token(s) and {resets} password reset(s)");
    }

    Ok(())
}
