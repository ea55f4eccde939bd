//! Spherical geodesy for the proximity query.
//!
//! Candidate hazards come out of the R*Tree through one or more
//! latitude/longitude boxes that fully enclose the search circle; the final
//! inclusion test and the reported distance both use [`GeoPoint::distance_km`].

use std::f64::consts::{FRAC_PI_2, PI};

/// Mean Earth radius (IUGG), kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Outward padding applied to search boxes, in degrees (roughly 1 cm).
const BOX_PADDING_DEG: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Returns `None` unless `lat` is in [-90, 90] and `lon` in [-180, 180].
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }

    /// Great-circle (haversine) distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let phi1 = self.lat.to_radians();
        let phi2 = other.lat.to_radians();
        let d_phi = phi2 - phi1;
        let d_lambda = (other.lon - self.lon).to_radians();

        let a = (d_phi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }
}

/// An axis-aligned box in degrees. Never wraps: `min_lon <= max_lon`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, p: &GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&p.lat)
            && (self.min_lon..=self.max_lon).contains(&p.lon)
    }
}

/// Boxes whose union covers every point within `radius_km` of `center`.
///
/// Yields two boxes when the circle crosses the ±180° meridian and a full
/// longitude band when it reaches a pole.
pub fn search_boxes(center: GeoPoint, radius_km: f64) -> Vec<BoundingBox> {
    let angular = radius_km.max(0.0) / EARTH_RADIUS_KM;

    if angular >= PI {
        return vec![BoundingBox {
            min_lat: -90.0,
            max_lat: 90.0,
            min_lon: -180.0,
            max_lon: 180.0,
        }];
    }

    let lat = center.lat.to_radians();
    let min_lat = lat - angular;
    let max_lat = lat + angular;

    if min_lat <= -FRAC_PI_2 || max_lat >= FRAC_PI_2 {
        return vec![BoundingBox {
            min_lat: pad_down(min_lat.max(-FRAC_PI_2).to_degrees(), -90.0),
            max_lat: pad_up(max_lat.min(FRAC_PI_2).to_degrees(), 90.0),
            min_lon: -180.0,
            max_lon: 180.0,
        }];
    }

    let ratio = angular.sin() / lat.cos();
    if ratio >= 1.0 {
        return vec![BoundingBox {
            min_lat: pad_down(min_lat.to_degrees(), -90.0),
            max_lat: pad_up(max_lat.to_degrees(), 90.0),
            min_lon: -180.0,
            max_lon: 180.0,
        }];
    }

    let d_lon = ratio.asin().to_degrees();
    let min_lat = pad_down(min_lat.to_degrees(), -90.0);
    let max_lat = pad_up(max_lat.to_degrees(), 90.0);
    let min_lon = center.lon - d_lon - BOX_PADDING_DEG;
    let max_lon = center.lon + d_lon + BOX_PADDING_DEG;

    let band = |min_lon: f64, max_lon: f64| BoundingBox {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    };

    if min_lon < -180.0 {
        vec![band(min_lon + 360.0, 180.0), band(-180.0, max_lon)]
    } else if max_lon > 180.0 {
        vec![band(min_lon, 180.0), band(-180.0, max_lon - 360.0)]
    } else {
        vec![band(min_lon, max_lon)]
    }
}

fn pad_down(deg: f64, floor: f64) -> f64 {
    (deg - BOX_PADDING_DEG).max(floor)
}

fn pad_up(deg: f64, ceil: f64) -> f64 {
    (deg + BOX_PADDING_DEG).min(ceil)
}
