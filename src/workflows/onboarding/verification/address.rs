use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::config::ServiceRegion;
use crate::workflows::onboarding::ports::{GeocodeResult, Geocoder};

/// Result of locating an applicant's address.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AddressVerification {
    pub(crate) in_service_area: bool,
    pub(crate) geocoded: Option<GeocodeResult>,
}

/// `street, sector, city, region, country`, skipping a missing sector.
pub(crate) fn compose_address(street: &str, sector: Option<&str>, region: &ServiceRegion) -> String {
    let mut parts = vec![street.trim()];
    if let Some(sector) = sector.map(str::trim).filter(|sector| !sector.is_empty()) {
        parts.push(sector);
    }
    parts.push(&region.city);
    parts.push(&region.region);
    parts.push(&region.country);
    parts.join(", ")
}

/// Try each geocoder in order, stop at the first hit, then test it against the region.
pub(crate) async fn verify_address(
    geocoders: &[Arc<dyn Geocoder>],
    address: &str,
    region: &ServiceRegion,
    timeout: Duration,
) -> AddressVerification {
    for geocoder in geocoders {
        let attempt = tokio::time::timeout(timeout, geocoder.geocode(address)).await;
        match attempt {
            Ok(Ok(Some(result))) => {
                let in_service_area = region.bounds.contains(result.coordinates);
                debug!(
                    provider = geocoder.name(),
                    in_service_area, "address geocoded"
                );
                return AddressVerification {
                    in_service_area,
                    geocoded: Some(result),
                };
            }
            Ok(Ok(None)) => {
                debug!(provider = geocoder.name(), "geocoder found no match");
            }
            Ok(Err(err)) => {
                warn!(provider = geocoder.name(), error = %err, "geocoder failed");
            }
            Err(_) => {
                warn!(provider = geocoder.name(), "geocoder timed out");
            }
        }
    }

    AddressVerification {
        in_service_area: false,
        geocoded: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::onboarding::domain::Coordinates;
    use crate::workflows::onboarding::ports::ProviderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGeocoder {
        name: &'static str,
        answer: Result<Option<Coordinates>, ProviderError>,
        calls: AtomicUsize,
    }

    impl FixedGeocoder {
        fn new(name: &'static str, answer: Result<Option<Coordinates>, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                name,
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        fn name(&self) -> &str {
            self.name
        }

        async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone().map(|found| {
                found.map(|coordinates| GeocodeResult {
                    coordinates,
                    formatted_address: address.to_string(),
                    confidence: 0.9,
                })
            })
        }
    }

    const MARACAIBO: Coordinates = Coordinates {
        lat: 10.65,
        lng: -71.64,
    };
    const CARACAS: Coordinates = Coordinates {
        lat: 10.48,
        lng: -66.90,
    };

    #[test]
    fn composes_address_with_region() {
        let region = ServiceRegion::default();
        assert_eq!(
            compose_address("Calle 72 #3-45", Some("Tierra Negra"), &region),
            "Calle 72 #3-45, Tierra Negra, Maracaibo, Zulia, Venezuela"
        );
        assert_eq!(
            compose_address("Calle 72", Some("  "), &region),
            "Calle 72, Maracaibo, Zulia, Venezuela"
        );
    }

    #[tokio::test]
    async fn falls_back_until_a_provider_answers() {
        let primary = FixedGeocoder::new("primary", Err(ProviderError::Unavailable("down".into())));
        let second = FixedGeocoder::new("second", Ok(None));
        let third = FixedGeocoder::new("third", Ok(Some(MARACAIBO)));
        let geocoders: Vec<Arc<dyn Geocoder>> = vec![primary.clone(), second.clone(), third.clone()];

        let result = verify_address(
            &geocoders,
            "Calle 72, Maracaibo",
            &ServiceRegion::default(),
            Duration::from_secs(1),
        )
        .await;

        assert!(result.in_service_area);
        assert_eq!(third.calls.load(Ordering::SeqCst), 1);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_at_first_success_even_outside_the_region() {
        let primary = FixedGeocoder::new("primary", Ok(Some(CARACAS)));
        let second = FixedGeocoder::new("second", Ok(Some(MARACAIBO)));
        let geocoders: Vec<Arc<dyn Geocoder>> = vec![primary, second.clone()];

        let result = verify_address(
            &geocoders,
            "Av. Urdaneta",
            &ServiceRegion::default(),
            Duration::from_secs(1),
        )
        .await;

        assert!(!result.in_service_area);
        assert!(result.geocoded.is_some());
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_providers_failing_is_a_plain_failure() {
        let geocoders: Vec<Arc<dyn Geocoder>> = vec![
            FixedGeocoder::new("a", Ok(None)),
            FixedGeocoder::new("b", Err(ProviderError::Rejected("quota".into()))),
        ];

        let result = verify_address(
            &geocoders,
            "nowhere",
            &ServiceRegion::default(),
            Duration::from_secs(1),
        )
        .await;

        assert!(!result.in_service_area);
        assert!(result.geocoded.is_none());
    }
}
