use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user. The password hash lives only in the store and is never
/// part of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardType {
    Pothole,
    Debris,
    Accident,
    Construction,
    Other,
}

impl HazardType {
    pub const ALL: [HazardType; 5] = [
        Self::Pothole,
        Self::Debris,
        Self::Accident,
        Self::Construction,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pothole => "pothole",
            Self::Debris => "debris",
            Self::Accident => "accident",
            Self::Construction => "construction",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardSeverity {
    Low,
    Medium,
    High,
}

impl HazardSeverity {
    pub const ALL: [HazardSeverity; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for HazardType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "hazard type",
                value: s.to_string(),
            })
    }
}

impl FromStr for HazardSeverity {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "severity",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for HazardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for HazardSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A geotagged road hazard report.
///
/// `verified` only ever moves from false to true; `verify_count` mirrors the
/// number of distinct observers in the verification ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub hazard_type: HazardType,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub severity: HazardSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub verified: bool,
    pub verify_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_by: Option<String>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A hazard returned by a proximity query, with its great-circle distance
/// from the query point in kilometres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyHazard {
    #[serde(flatten)]
    pub hazard: Hazard,
    pub distance: f64,
}

/// One observer's corroborating vote on a hazard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub hazard_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("pothole", HazardType::Pothole)]
    #[case("debris", HazardType::Debris)]
    #[case("accident", HazardType::Accident)]
    #[case("construction", HazardType::Construction)]
    #[case("other", HazardType::Other)]
    fn hazard_type_parses(#[case] raw: &str, #[case] expected: HazardType) {
        assert_eq!(raw.parse::<HazardType>().unwrap(), expected);
        assert_eq!(expected.to_string(), raw);
    }

    #[rstest]
    #[case("Pothole")]
    #[case("sinkhole")]
    #[case("")]
    fn hazard_type_rejects_unknown(#[case] raw: &str) {
        let err = raw.parse::<HazardType>().unwrap_err();
        assert_eq!(err.value, raw);
    }

    #[test]
    fn severity_rejects_unknown() {
        assert_eq!("high".parse::<HazardSeverity>().unwrap(), HazardSeverity::High);
        assert!("critical".parse::<HazardSeverity>().is_err());
    }

    #[test]
    fn nearby_hazard_flattens_distance() {
        let now = Utc::now();
        let nearby = NearbyHazard {
            hazard: Hazard {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                hazard_type: HazardType::Debris,
                latitude: 1.5,
                longitude: -2.5,
                image_url: None,
                severity: HazardSeverity::Low,
                description: None,
                verified: false,
                verify_count: 0,
                reported_by: Some("alice".into()),
                created_at: now,
                updated_at: now,
            },
            distance: 0.25,
        };

        let json = serde_json::to_value(&nearby).unwrap();
        assert_eq!(json["type"], "debris");
        assert_eq!(json["distance"], 0.25);
        assert!(json.get("description").is_none());
        assert!(json.get("timestamp").is_some());
    }
}
