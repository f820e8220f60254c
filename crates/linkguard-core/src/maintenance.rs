//! Periodic store maintenance, independent of message processing.

use std::{sync::Arc, time::Duration};

use crate::store::KeywordStore;

/// Fixed-interval sweep removing auto-added link keywords past the retention
/// window. Deletions become visible to filtering reads when the keyword cache
/// is invalidated by the sweep itself.
pub async fn run_cleanup_task(store: Arc<KeywordStore>, interval: Duration) {
    let mut tick = tokio::time::interval(interval);
    // The immediate first tick would sweep at startup; skip it.
    tick.tick().await;

    loop {
        tick.tick().await;
        match store.cleanup_expired_links() {
            Ok(removed) => {
                if removed > 0 {
                    println!("[cleanup] removed {removed} expired auto-added link(s)");
                }
            }
            Err(e) => eprintln!("[cleanup] sweep failed: {e}"),
        }
    }
}
