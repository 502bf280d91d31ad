use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::workflows::onboarding::domain::{ActorKind, Coordinates};

/// Thresholds and service-region settings used by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub driver_face_match_threshold: f32,
    pub rider_face_match_threshold: f32,
    pub selfie_min_confidence: f32,
    pub selfie_max_angle_degrees: f32,
    pub check_timeout: Duration,
    pub region: ServiceRegion,
}

impl VerificationConfig {
    pub fn face_match_threshold(&self, kind: ActorKind) -> f32 {
        match kind {
            ActorKind::Driver => self.driver_face_match_threshold,
            ActorKind::Rider => self.rider_face_match_threshold,
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            driver_face_match_threshold: 80.0,
            rider_face_match_threshold: 75.0,
            selfie_min_confidence: 0.8,
            selfie_max_angle_degrees: 15.0,
            check_timeout: Duration::from_secs(10),
            region: ServiceRegion::default(),
        }
    }
}

/// City the platform operates in, appended to every geocoded address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRegion {
    pub city: String,
    pub region: String,
    pub country: String,
    pub bounds: BoundingBox,
}

impl Default for ServiceRegion {
    fn default() -> Self {
        Self {
            city: "Maracaibo".to_string(),
            region: "Zulia".to_string(),
            country: "Venezuela".to_string(),
            bounds: BoundingBox {
                north: 10.8,
                south: 10.4,
                east: -71.4,
                west: -71.8,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: Coordinates) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lng >= self.west
            && point.lng <= self.east
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_cover_maracaibo() {
        let bounds = ServiceRegion::default().bounds;
        assert!(bounds.contains(Coordinates {
            lat: 10.6427,
            lng: -71.6125,
        }));
        assert!(!bounds.contains(Coordinates {
            lat: 10.4806,
            lng: -66.9036,
        }));
        assert!(!bounds.contains(Coordinates {
            lat: f64::NAN,
            lng: -71.6,
        }));
    }
}
