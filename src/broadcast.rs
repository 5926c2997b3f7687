use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;

/// Seconds without a message or heartbeat before a player is shown as away.
pub const PLAYER_IDLE_SECS: i64 = 60;

const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Spawn a background task that flags idle players as inactive.
///
/// Each flip is broadcast as a `PlayerUpserted`, so lobby screens gray the
/// player out without a refresh. Players come back as soon as they send
/// anything again.
pub fn spawn_presence_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SWEEP_INTERVAL).await;

            let flagged = state.sweep_inactive(PLAYER_IDLE_SECS).await;
            if !flagged.is_empty() {
                tracing::debug!("Presence sweep flagged {} idle player(s)", flagged.len());
            }
        }
    });
}
