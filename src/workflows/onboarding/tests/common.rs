use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::workflows::onboarding::domain::{
    ActorRecord, AddressDetails, ContactDetails, Coordinates, DocumentSet, DriverApplication,
    DriverCredentials, DriverRecord, DriverStatus, IdentityCode, IdentityDetails,
    RiderApplication, VerificationInputs, VerificationSummary,
};
use crate::workflows::onboarding::ports::{
    ActorRepository, CheckProviders, DocumentKind, DocumentOcr, EmailVerification, FaceAnalysis,
    FaceAngles, FaceDetection, GeocodeResult, Geocoder, IdentityRegistry, OcrExtraction,
    OtpService, ProviderError, RegistryEntry,
};
use crate::workflows::onboarding::{
    InMemoryActorRepository, NumberingPolicy, OnboardingEngine, VerificationConfig,
};

pub(super) const MARACAIBO: Coordinates = Coordinates {
    lat: 10.6427,
    lng: -71.6125,
};

/// Scripted answers for every collaborator.
#[derive(Clone)]
pub(super) struct Scenario {
    pub(super) otp_valid: bool,
    pub(super) email_valid: bool,
    pub(super) ocr_national_id: Option<String>,
    pub(super) ocr_license: Option<String>,
    pub(super) ocr_tax_id: Option<String>,
    pub(super) detection: Option<FaceDetection>,
    pub(super) face_score: Result<f32, ProviderError>,
    pub(super) location: Option<Coordinates>,
    pub(super) registry: Option<RegistryEntry>,
    pub(super) registry_delay: Option<Duration>,
    pub(super) provider_calls: Arc<AtomicUsize>,
}

impl Scenario {
    pub(super) fn all_passing() -> Self {
        Self {
            otp_valid: true,
            email_valid: true,
            ocr_national_id: Some("12345678".to_string()),
            ocr_license: Some("12345678".to_string()),
            ocr_tax_id: Some("V123456780".to_string()),
            detection: Some(FaceDetection {
                face_count: 1,
                confidence: 0.97,
                angles: FaceAngles {
                    roll: 2.0,
                    pan: -4.5,
                    tilt: 6.0,
                },
            }),
            face_score: Ok(91.0),
            location: Some(MARACAIBO),
            registry: Some(RegistryEntry {
                first_names: "MARIA JOSE".to_string(),
                last_names: "MARTINEZ PEREZ".to_string(),
            }),
            registry_delay: None,
            provider_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.provider_calls.load(Ordering::SeqCst)
    }

    pub(super) fn bundle(&self) -> CheckProviders {
        let fake = Arc::new(self.clone());
        CheckProviders {
            otp: fake.clone(),
            email: fake.clone(),
            ocr: fake.clone(),
            faces: fake.clone(),
            geocoders: vec![fake.clone()],
            registry: fake,
        }
    }

    fn touch(&self) {
        self.provider_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl OtpService for Scenario {
    async fn send_otp(&self, _phone: &str) -> Result<bool, ProviderError> {
        self.touch();
        Ok(true)
    }

    async fn verify_otp(&self, _phone: &str, _code: &str) -> Result<bool, ProviderError> {
        self.touch();
        Ok(self.otp_valid)
    }
}

#[async_trait]
impl EmailVerification for Scenario {
    async fn send_token(&self, _email: &str) -> Result<bool, ProviderError> {
        self.touch();
        Ok(true)
    }

    async fn verify_token(&self, _email: &str, _token: &str) -> Result<bool, ProviderError> {
        self.touch();
        Ok(self.email_valid)
    }
}

#[async_trait]
impl DocumentOcr for Scenario {
    async fn extract(
        &self,
        kind: DocumentKind,
        _image: &[u8],
    ) -> Result<Option<OcrExtraction>, ProviderError> {
        self.touch();
        let extraction = match kind {
            DocumentKind::IdCard => OcrExtraction::IdCard {
                national_id: self.ocr_national_id.clone(),
                first_name: Some("MARIA JOSE".to_string()),
                last_name: Some("MARTINEZ".to_string()),
                confidence: 0.93,
            },
            DocumentKind::License => OcrExtraction::License {
                license_number: self.ocr_license.clone(),
                category: Some("5".to_string()),
                expires_on: Some("2029-04-30".to_string()),
                confidence: 0.9,
            },
            DocumentKind::TaxRegistry => OcrExtraction::TaxRegistry {
                tax_id: self.ocr_tax_id.clone(),
                holder_name: Some("MARIA JOSE MARTINEZ".to_string()),
                confidence: 0.88,
            },
        };
        Ok(Some(extraction))
    }
}

#[async_trait]
impl FaceAnalysis for Scenario {
    async fn detect_face(&self, _image: &[u8]) -> Result<Option<FaceDetection>, ProviderError> {
        self.touch();
        Ok(self.detection)
    }

    async fn compare_faces(&self, _first: &[u8], _second: &[u8]) -> Result<f32, ProviderError> {
        self.touch();
        self.face_score.clone()
    }
}

#[async_trait]
impl Geocoder for Scenario {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>, ProviderError> {
        self.touch();
        Ok(self.location.map(|coordinates| GeocodeResult {
            coordinates,
            formatted_address: address.to_string(),
            confidence: 0.8,
        }))
    }
}

#[async_trait]
impl IdentityRegistry for Scenario {
    async fn lookup(&self, _national_id: &str) -> Result<Option<RegistryEntry>, ProviderError> {
        self.touch();
        if let Some(delay) = self.registry_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.registry.clone())
    }
}

pub(super) fn verification_config() -> VerificationConfig {
    VerificationConfig {
        check_timeout: Duration::from_millis(500),
        ..VerificationConfig::default()
    }
}

pub(super) fn build_engine(
    scenario: &Scenario,
    numbering: NumberingPolicy,
) -> (
    OnboardingEngine<InMemoryActorRepository>,
    Arc<InMemoryActorRepository>,
) {
    let repository = Arc::new(InMemoryActorRepository::new());
    let engine = OnboardingEngine::new(
        repository.clone(),
        scenario.bundle(),
        numbering,
        verification_config(),
    );
    (engine, repository)
}

pub(super) fn contact() -> ContactDetails {
    ContactDetails {
        phone: Some("+58 414 555 0101".to_string()),
        phone_verified: false,
        email: Some("maria.martinez@example.com".to_string()),
        email_verified: false,
    }
}

pub(super) fn identity() -> IdentityDetails {
    IdentityDetails {
        national_id: Some("V-12.345.678".to_string()),
        first_name: Some("María José".to_string()),
        last_name: Some("Martínez Pérez".to_string()),
    }
}

pub(super) fn address() -> AddressDetails {
    AddressDetails {
        street: Some("Calle 72".to_string()),
        house_number: Some("3-45".to_string()),
        sector: Some("Tierra Negra".to_string()),
        line: None,
    }
}

pub(super) fn inputs() -> VerificationInputs {
    VerificationInputs {
        otp_code: Some("482913".to_string()),
        email_token: Some("9f2c".to_string()),
    }
}

pub(super) fn driver_documents() -> DocumentSet {
    DocumentSet {
        id_photo: Some(vec![1, 2, 3]),
        selfie: Some(vec![4, 5, 6]),
        selfie_with_id: Some(vec![7]),
        tax_registry_photo: Some(vec![8]),
        license_photo: Some(vec![9]),
        vehicle_title: Some(vec![10]),
        bill_of_sale: None,
    }
}

pub(super) fn driver_application() -> DriverApplication {
    DriverApplication {
        contact: contact(),
        identity: identity(),
        address: address(),
        documents: driver_documents(),
        credentials: DriverCredentials {
            tax_id: Some("V-12345678-0".to_string()),
            license_number: Some("12.345.678".to_string()),
            license_category: Some("5".to_string()),
            license_expiry: NaiveDate::from_ymd_opt(2029, 4, 30),
            plate: Some("AB123CD".to_string()),
        },
        inputs: inputs(),
    }
}

pub(super) fn rider_application() -> RiderApplication {
    RiderApplication {
        contact: contact(),
        identity: identity(),
        address: address(),
        documents: DocumentSet {
            id_photo: Some(vec![1, 2, 3]),
            selfie: Some(vec![4, 5, 6]),
            ..DocumentSet::default()
        },
        inputs: inputs(),
        requested_code: None,
        origin: Default::default(),
    }
}

pub(super) async fn store_driver(
    repository: &InMemoryActorRepository,
    code: &str,
    status: DriverStatus,
) -> IdentityCode {
    let code = IdentityCode::parse(code).expect("valid driver code");
    let application = driver_application();
    let record = DriverRecord {
        code,
        contact: application.contact,
        identity: application.identity,
        address: application.address,
        documents: application.documents,
        credentials: application.credentials,
        status,
        registered_at: Utc::now(),
        inspection: None,
        verification: Some(VerificationSummary {
            checks_passed: true,
            ..VerificationSummary::default()
        }),
    };
    repository
        .persist_actor(&ActorRecord::Driver(record))
        .await
        .expect("store driver");
    code
}
