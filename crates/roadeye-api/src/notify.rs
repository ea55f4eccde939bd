use tokio::sync::broadcast;
use tracing::warn;

use roadeye_types::events::HazardNotification;

/// Outbound port for hazard-created events.
///
/// Called after the report has committed. Implementations must return
/// promptly and must not wait on delivery.
pub trait HazardPublisher: Send + Sync {
    fn publish(&self, event: HazardNotification);
}

/// In-process fan-out to notification workers over a broadcast channel.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<HazardNotification>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HazardNotification> {
        self.tx.subscribe()
    }
}

impl HazardPublisher for BroadcastPublisher {
    fn publish(&self, event: HazardNotification) {
        let hazard_id = event.hazard_id;
        if self.tx.send(event).is_err() {
            warn!("No notification worker subscribed; dropped event for hazard {}", hazard_id);
        }
    }
}
