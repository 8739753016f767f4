//! Keeps the sync-store connection alive, flipping degraded mode while it is
//! down. Remote sync silently pauses in degraded mode; the engine keeps
//! serving local state.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{storage::StorageError, sync_store::SyncStore},
    services::events,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Connect to the sync store and keep probing it, reconnecting with
/// exponential backoff whenever connectivity is lost.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn SyncStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_sync_store(store.clone()).await;
                events::broadcast_system_status(&state, false);
                info!("sync store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => sleep(HEALTH_POLL_INTERVAL).await,
                        Err(err) => {
                            warn!(error = %err, "sync store health check failed; entering degraded mode");
                            state.clear_sync_store().await;
                            events::broadcast_system_status(&state, true);
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "sync store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}
