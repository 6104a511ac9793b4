use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::lifecycle::MediaLifecycle;

/// Background task that retries the temp→permanent re-key for members whose
/// image is still on a temporary blob key.
///
/// Runs on an interval; each pass is idempotent, so a crash between passes
/// loses nothing. A pending record always references a resolvable temp blob,
/// so sweeping is a tidiness concern, not a correctness one.
pub async fn run_reconcile_loop(lifecycle: Arc<MediaLifecycle>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match lifecycle.reconcile_pending().await {
            Ok(count) => {
                if count > 0 {
                    info!("Reconcile: committed {} pending images", count);
                }
            }
            Err(e) => {
                warn!("Reconcile pass failed: {}", e);
            }
        }
    }
}
