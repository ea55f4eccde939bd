pub mod auth;
pub mod deadline;
pub mod error;
pub mod hazards;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use roadeye_db::Database;

use crate::notify::HazardPublisher;
use crate::session::SessionIssuer;

pub use error::ApiError;
pub use routes::router;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub sessions: SessionIssuer,
    pub hazards: HazardSettings,
    pub publisher: Arc<dyn HazardPublisher>,
    /// Upper bound on any request's deadline.
    pub request_timeout: Duration,
}

/// Tunables for reporting, proximity search and verification.
#[derive(Debug, Clone)]
pub struct HazardSettings {
    /// Distinct observers needed before a hazard is confirmed. At least 1.
    pub confirm_threshold: u32,
    pub default_radius_km: f64,
    pub max_radius_km: f64,
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for HazardSettings {
    fn default() -> Self {
        Self {
            confirm_threshold: 3,
            default_radius_km: 5.0,
            max_radius_km: 50.0,
            default_limit: 100,
            max_limit: 100,
        }
    }
}
