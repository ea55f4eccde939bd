//! Database row types. These map directly to SQLite rows and are converted
//! into the `roadeye-types` models at the crate boundary.

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use roadeye_types::models::{Hazard, HazardSeverity, HazardType, User, VerificationRecord};

use crate::StoreError;

#[cfg_attr(test, derive(Debug))]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub points: i64,
    pub avatar: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct HazardRow {
    pub id: String,
    pub user_id: String,
    pub hazard_type: String,
    pub severity: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_verified: bool,
    pub verify_count: u32,
    /// Reporter's username, joined from `users`.
    pub reported_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct VerificationRow {
    pub hazard_id: String,
    pub user_id: String,
    pub created_at: String,
}

/// Input for [`crate::Database::insert_hazard`].
pub struct NewHazard<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub hazard_type: HazardType,
    pub severity: HazardSeverity,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<&'a str>,
    pub image_url: Option<&'a str>,
}

/// Result of a verification vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOutcome {
    /// False when this observer had already voted on the hazard.
    pub recorded: bool,
    pub verify_count: u32,
    pub verified: bool,
    /// True only for the vote that flipped the hazard to confirmed.
    pub newly_confirmed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    NotOwner,
}

/// Parses a stored timestamp. Rows written by this crate are RFC 3339; bare
/// SQLite `datetime('now')` values are accepted as naive UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

fn parse_id(field: &str, raw: &str) -> Result<Uuid, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("{} '{}': {}", field, raw, e)))
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: parse_id("user id", &row.id)?,
            points: u32::try_from(row.points)
                .map_err(|_| StoreError::Corrupt(format!("points {} on user '{}'", row.points, row.id)))?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            username: row.username,
            email: row.email,
            avatar: row.avatar,
        })
    }
}

impl TryFrom<HazardRow> for Hazard {
    type Error = StoreError;

    fn try_from(row: HazardRow) -> Result<Self, Self::Error> {
        Ok(Hazard {
            id: parse_id("hazard id", &row.id)?,
            user_id: parse_id("hazard user_id", &row.user_id)?,
            hazard_type: row
                .hazard_type
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("{} on hazard '{}'", e, row.id)))?,
            severity: row
                .severity
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("{} on hazard '{}'", e, row.id)))?,
            latitude: row.latitude,
            longitude: row.longitude,
            image_url: row.image_url,
            description: row.description,
            verified: row.is_verified,
            verify_count: row.verify_count,
            reported_by: row.reported_by,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl TryFrom<VerificationRow> for VerificationRecord {
    type Error = StoreError;

    fn try_from(row: VerificationRow) -> Result<Self, Self::Error> {
        Ok(VerificationRecord {
            hazard_id: parse_id("verification hazard_id", &row.hazard_id)?,
            user_id: parse_id("verification user_id", &row.user_id)?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}
