use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use torque_db::Database;
use torque_gateway::dispatcher::Dispatcher;
use torque_types::events::LedgerEvent;

/// Background task that prunes expired announcements.
///
/// Reads already filter by expiry, so this only keeps the table from
/// accumulating dead rows. Subscribers get a change event when something
/// was actually removed.
pub async fn run_announcement_prune_loop(
    db: Arc<Database>,
    dispatcher: Dispatcher,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db = db.clone();
        let result = tokio::task::spawn_blocking(move || {
            db.prune_expired_announcements(&torque_db::sqlite_now())
        })
        .await;

        match result {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Pruned {} expired announcement(s)", count);
                    dispatcher.broadcast(LedgerEvent::AnnouncementChanged);
                }
            }
            Ok(Err(e)) => warn!("Announcement prune error: {}", e),
            Err(e) => warn!("Announcement prune join error: {}", e),
        }
    }
}
