use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Hazard, HazardSeverity, HazardType};

/// Published once per successfully committed hazard report.
///
/// Delivery is at-least-once; consumers must tolerate seeing the same
/// `hazard_id` more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardNotification {
    pub hazard_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "type")]
    pub hazard_type: HazardType,
    pub severity: HazardSeverity,
}

impl From<&Hazard> for HazardNotification {
    fn from(hazard: &Hazard) -> Self {
        Self {
            hazard_id: hazard.id,
            latitude: hazard.latitude,
            longitude: hazard.longitude,
            hazard_type: hazard.hazard_type,
            severity: hazard.severity,
        }
    }
}
