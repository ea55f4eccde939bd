use std::time::Duration;

use axum::{extract::FromRequestParts, http::request::Parts};
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{error, warn};

use roadeye_db::CommitGate;

use crate::{ApiError, AppState};

/// Header a caller may use to ask for a shorter deadline, in milliseconds.
pub const DEADLINE_HEADER: &str = "x-request-timeout-ms";

/// Point in time by which a request's store work must finish.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    pub fn instant(&self) -> Instant {
        self.0
    }
}

impl FromRequestParts<AppState> for Deadline {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let max = state.request_timeout;

        let requested = match parts.headers.get(DEADLINE_HEADER) {
            None => None,
            Some(v) => {
                let ms: u64 = v
                    .to_str()
                    .ok()
                    .and_then(|s| s.trim().parse().ok())
                    .ok_or_else(|| ApiError::validation(format!("Invalid {} header", DEADLINE_HEADER)))?;
                Some(Duration::from_millis(ms))
            }
        };

        Ok(Deadline::after(requested.map_or(max, |d| d.min(max))))
    }
}

/// Runs blocking store or hashing work off the async runtime, giving up when
/// `deadline` passes.
///
/// The closure receives the [`CommitGate`] its store writes must go through.
/// On expiry the gate is abandoned, so a write still queued for the
/// connection, or not yet at its commit, rolls back instead of landing after
/// the caller was told it timed out. A write already committing when the
/// deadline fires is awaited and its result returned.
pub async fn run_blocking<F, T>(deadline: Deadline, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&CommitGate) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let gate = CommitGate::new();
    let task_gate = gate.clone();
    let mut task = tokio::task::spawn_blocking(move || f(&task_gate));

    match tokio::time::timeout_at(deadline.instant(), &mut task).await {
        Ok(joined) => flatten(joined),
        Err(_) if gate.abandon() => {
            warn!("Request deadline exceeded while waiting on blocking work");
            Err(ApiError::Timeout)
        }
        Err(_) => flatten(task.await),
    }
}

fn flatten<T>(joined: Result<Result<T, ApiError>, JoinError>) -> Result<T, ApiError> {
    joined.unwrap_or_else(|e| {
        error!("spawn_blocking join error: {}", e);
        Err(ApiError::Internal)
    })
}
