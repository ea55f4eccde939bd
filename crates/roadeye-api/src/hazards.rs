use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use roadeye_db::geo::GeoPoint;
use roadeye_db::models::{DeleteOutcome, NewHazard, VerifyOutcome};
use roadeye_db::{CommitGate, StoreError};
use roadeye_types::api::{
    CreateHazardRequest, HazardListResponse, HazardResponse, MessageResponse, NearbyQuery,
    VerifyResponse,
};
use roadeye_types::events::HazardNotification;
use roadeye_types::models::{Hazard, HazardSeverity, HazardType, NearbyHazard};

use crate::deadline::{Deadline, run_blocking};
use crate::middleware::Authenticated;
use crate::{ApiError, AppState, AppStateInner, HazardSettings};

const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_IMAGE_URL_LEN: usize = 2048;

/// A report that passed boundary validation.
#[derive(Debug, Clone)]
pub struct ValidReport {
    pub hazard_type: HazardType,
    pub severity: HazardSeverity,
    pub location: GeoPoint,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// A proximity query with defaults applied and bounds checked.
#[derive(Debug, Clone, Copy)]
pub struct NearbyParams {
    pub center: GeoPoint,
    pub radius_km: f64,
    pub limit: u32,
}

// -- Validation --

pub fn validate_report(req: CreateHazardRequest) -> Result<ValidReport, ApiError> {
    let hazard_type: HazardType = req
        .hazard_type
        .parse()
        .map_err(|e| ApiError::validation(format!("Invalid hazard: {}", e)))?;
    let severity: HazardSeverity = req
        .severity
        .parse()
        .map_err(|e| ApiError::validation(format!("Invalid hazard: {}", e)))?;
    let location = coordinates(req.latitude, req.longitude)?;

    let description = req
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    if description
        .as_ref()
        .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
    {
        return Err(ApiError::validation("Description must be at most 500 characters"));
    }

    if req.image_base64.as_ref().is_some_and(|b| !b.is_empty()) {
        debug!("Inline image ignored; only image_url references are stored");
    }

    let image_url = req
        .image_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    if image_url.as_ref().is_some_and(|u| u.len() > MAX_IMAGE_URL_LEN) {
        return Err(ApiError::validation("Image reference is too long"));
    }

    Ok(ValidReport {
        hazard_type,
        severity,
        location,
        description,
        image_url,
    })
}

pub fn validate_nearby(query: NearbyQuery, settings: &HazardSettings) -> Result<NearbyParams, ApiError> {
    let (Some(lat), Some(lon)) = (query.lat, query.lon) else {
        return Err(ApiError::validation("lat and lon parameters required"));
    };
    let center = coordinates(lat, lon)?;

    let radius_km = query.radius.unwrap_or(settings.default_radius_km);
    if !radius_km.is_finite() || radius_km < 0.0 || radius_km > settings.max_radius_km {
        return Err(ApiError::validation(format!(
            "radius must be between 0 and {} km",
            settings.max_radius_km
        )));
    }

    let limit = query.limit.unwrap_or(settings.default_limit);
    if limit == 0 {
        return Err(ApiError::validation("limit must be at least 1"));
    }

    Ok(NearbyParams {
        center,
        radius_km,
        limit: limit.min(settings.max_limit),
    })
}

fn coordinates(lat: f64, lon: f64) -> Result<GeoPoint, ApiError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(ApiError::validation("Invalid latitude"));
    }
    GeoPoint::new(lat, lon).ok_or_else(|| ApiError::validation("Invalid longitude"))
}

// -- Operations --

/// Persists a report and, once committed, publishes its notification event.
pub fn create_hazard(
    state: &AppStateInner,
    reporter_id: Uuid,
    report: ValidReport,
    gate: &CommitGate,
) -> Result<Hazard, ApiError> {
    let id = Uuid::new_v4().to_string();
    let reporter = reporter_id.to_string();

    let new = NewHazard {
        id: &id,
        user_id: &reporter,
        hazard_type: report.hazard_type,
        severity: report.severity,
        latitude: report.location.lat,
        longitude: report.location.lon,
        description: report.description.as_deref(),
        image_url: report.image_url.as_deref(),
    };
    let row = state.db.insert_hazard(&new, gate)?;
    let hazard = Hazard::try_from(row)?;

    info!(
        "Hazard {} ({}, {}) reported by {} at ({:.6}, {:.6})",
        hazard.id, hazard.hazard_type, hazard.severity, reporter_id, hazard.latitude, hazard.longitude
    );
    state.publisher.publish(HazardNotification::from(&hazard));

    Ok(hazard)
}

pub fn find_hazard(state: &AppStateInner, id: Uuid) -> Result<Hazard, ApiError> {
    let row = state
        .db
        .get_hazard(&id.to_string())?
        .ok_or_else(hazard_not_found)?;
    Ok(Hazard::try_from(row)?)
}

pub fn find_nearby(state: &AppStateInner, params: &NearbyParams) -> Result<Vec<NearbyHazard>, ApiError> {
    let rows = state
        .db
        .nearby_hazards(params.center, params.radius_km, params.limit as usize)?;

    rows.into_iter()
        .map(|(row, distance)| -> Result<NearbyHazard, ApiError> {
            Ok(NearbyHazard {
                hazard: Hazard::try_from(row)?,
                distance,
            })
        })
        .collect()
}

/// Records a corroborating vote. Repeat votes by the same observer succeed
/// without changing the count.
pub fn verify_hazard(
    state: &AppStateInner,
    hazard_id: Uuid,
    observer_id: Uuid,
    gate: &CommitGate,
) -> Result<VerifyOutcome, ApiError> {
    let outcome = state
        .db
        .verify_hazard(
            &hazard_id.to_string(),
            &observer_id.to_string(),
            state.hazards.confirm_threshold,
            gate,
        )
        .map_err(|e| match e {
            StoreError::NotFound => hazard_not_found(),
            other => other.into(),
        })?;

    if !outcome.recorded {
        info!("Duplicate verification of {} by {} ignored", hazard_id, observer_id);
    }
    Ok(outcome)
}

/// Deletes a hazard on behalf of its reporter.
pub fn delete_hazard(
    state: &AppStateInner,
    hazard_id: Uuid,
    requester_id: Uuid,
    gate: &CommitGate,
) -> Result<(), ApiError> {
    match state
        .db
        .delete_hazard(&hazard_id.to_string(), &requester_id.to_string(), gate)?
    {
        DeleteOutcome::Deleted => {
            info!("Hazard {} deleted by {}", hazard_id, requester_id);
            Ok(())
        }
        DeleteOutcome::NotFound => Err(hazard_not_found()),
        DeleteOutcome::NotOwner => {
            warn!("User {} tried to delete hazard {} they did not report", requester_id, hazard_id);
            Err(ApiError::Forbidden("Only the reporter may delete this hazard".into()))
        }
    }
}

fn hazard_not_found() -> ApiError {
    ApiError::NotFound("Hazard not found".into())
}

fn hazard_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::validation("Invalid hazard ID"))
}

// -- Handlers --

/// POST /hazards/report
pub async fn report(
    Authenticated(claims): Authenticated,
    State(state): State<AppState>,
    deadline: Deadline,
    payload: Result<Json<CreateHazardRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let report = validate_report(req)?;

    let hazard = run_blocking(deadline, move |gate| create_hazard(&state, claims.sub, report, gate)).await?;
    Ok((StatusCode::CREATED, Json(HazardResponse { hazard })))
}

/// GET /hazards?lat=&lon=&radius=&limit=
pub async fn nearby(
    State(state): State<AppState>,
    deadline: Deadline,
    query: Result<Query<NearbyQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let params = validate_nearby(query, &state.hazards)?;

    let hazards = run_blocking(deadline, move |_| find_nearby(&state, &params)).await?;
    Ok(Json(HazardListResponse { hazards }))
}

/// GET /hazards/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    deadline: Deadline,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = hazard_id(path)?;
    let hazard = run_blocking(deadline, move |_| find_hazard(&state, id)).await?;
    Ok(Json(HazardResponse { hazard }))
}

/// POST /hazards/{id}/verify
pub async fn verify(
    Authenticated(claims): Authenticated,
    State(state): State<AppState>,
    deadline: Deadline,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = hazard_id(path)?;
    let outcome = run_blocking(deadline, move |gate| verify_hazard(&state, id, claims.sub, gate)).await?;

    Ok(Json(VerifyResponse {
        message: "Hazard verified".into(),
        verify_count: outcome.verify_count,
        verified: outcome.verified,
    }))
}

/// DELETE /hazards/{id}
pub async fn delete(
    Authenticated(claims): Authenticated,
    State(state): State<AppState>,
    deadline: Deadline,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = hazard_id(path)?;
    run_blocking(deadline, move |gate| delete_hazard(&state, id, claims.sub, gate)).await?;

    Ok(Json(MessageResponse {
        message: "Hazard deleted".into(),
    }))
}
