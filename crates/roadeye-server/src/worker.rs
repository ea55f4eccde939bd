use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use roadeye_types::events::HazardNotification;

/// Topic name carried in logs so pushes can be traced back to their source.
pub const NOTIFICATION_TOPIC: &str = "hazard:notifications";

/// Background task that consumes hazard-created events.
///
/// Push delivery is not wired up yet, so each event is logged as the payload
/// that would be sent. Returns when every publisher has been dropped.
pub async fn run_notification_loop(mut rx: broadcast::Receiver<HazardNotification>) {
    info!("Notification worker started on {}", NOTIFICATION_TOPIC);

    loop {
        match rx.recv().await {
            Ok(event) => process(&event),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Notification worker lagged, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => {
                info!("Notification channel closed, worker exiting");
                break;
            }
        }
    }
}

fn process(event: &HazardNotification) {
    debug!("Processing notification for hazard {}", event.hazard_id);
    match serde_json::to_string(event) {
        Ok(payload) => info!(
            "Would send notifications for {} hazard at ({:.6}, {:.6}): {}",
            event.hazard_type, event.latitude, event.longitude, payload
        ),
        Err(e) => warn!("Failed to encode notification for {}: {}", event.hazard_id, e),
    }
}
