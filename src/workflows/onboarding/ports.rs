//! Capability contracts for the collaborators the engine calls out to.
//!
//! None of these are implemented against a real service here; adapters for SMS, mail,
//! OCR, face analysis, geocoding, the national identity registry and the database live
//! outside this crate.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::codes::ExistingCodes;
use super::domain::{ActorKind, ActorRecord, Coordinates, DriverRecord, IdentityCode, MigrationRecord};

/// Fault raised by an external collaborator. Always downgraded to a failed check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait OtpService: Send + Sync {
    async fn send_otp(&self, phone: &str) -> Result<bool, ProviderError>;
    async fn verify_otp(&self, phone: &str, code: &str) -> Result<bool, ProviderError>;
}

#[async_trait]
pub trait EmailVerification: Send + Sync {
    async fn send_token(&self, email: &str) -> Result<bool, ProviderError>;
    async fn verify_token(&self, email: &str, token: &str) -> Result<bool, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    IdCard,
    License,
    TaxRegistry,
}

/// Structured OCR output, one shape per document kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "document", rename_all = "snake_case")]
pub enum OcrExtraction {
    IdCard {
        national_id: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
        confidence: f32,
    },
    License {
        license_number: Option<String>,
        category: Option<String>,
        expires_on: Option<String>,
        confidence: f32,
    },
    TaxRegistry {
        tax_id: Option<String>,
        holder_name: Option<String>,
        confidence: f32,
    },
}

impl OcrExtraction {
    pub fn document_kind(&self) -> DocumentKind {
        match self {
            OcrExtraction::IdCard { .. } => DocumentKind::IdCard,
            OcrExtraction::License { .. } => DocumentKind::License,
            OcrExtraction::TaxRegistry { .. } => DocumentKind::TaxRegistry,
        }
    }

    /// The identifier compared against what the applicant typed.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            OcrExtraction::IdCard { national_id, .. } => national_id.as_deref(),
            OcrExtraction::License { license_number, .. } => license_number.as_deref(),
            OcrExtraction::TaxRegistry { tax_id, .. } => tax_id.as_deref(),
        }
    }
}

#[async_trait]
pub trait DocumentOcr: Send + Sync {
    async fn extract(
        &self,
        kind: DocumentKind,
        image: &[u8],
    ) -> Result<Option<OcrExtraction>, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceAngles {
    pub roll: f32,
    pub pan: f32,
    pub tilt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub face_count: u32,
    /// Detection confidence of the primary face, 0.0 to 1.0.
    pub confidence: f32,
    pub angles: FaceAngles,
}

#[async_trait]
pub trait FaceAnalysis: Send + Sync {
    async fn detect_face(&self, image: &[u8]) -> Result<Option<FaceDetection>, ProviderError>;
    /// Similarity between two faces, 0 to 100.
    async fn compare_faces(&self, first: &[u8], second: &[u8]) -> Result<f32, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub coordinates: Coordinates,
    pub formatted_address: String,
    pub confidence: f32,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &str;
    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>, ProviderError>;
}

/// Names the registry holds for a national id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub first_names: String,
    pub last_names: String,
}

#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    async fn lookup(&self, national_id: &str) -> Result<Option<RegistryEntry>, ProviderError>;
}

/// Every collaborator the aggregator needs, bundled for injection.
#[derive(Clone)]
pub struct CheckProviders {
    pub otp: Arc<dyn OtpService>,
    pub email: Arc<dyn EmailVerification>,
    pub ocr: Arc<dyn DocumentOcr>,
    pub faces: Arc<dyn FaceAnalysis>,
    /// Tried in order; the first successful geocode wins.
    pub geocoders: Vec<Arc<dyn Geocoder>>,
    pub registry: Arc<dyn IdentityRegistry>,
}

/// Persistence boundary. Serializing `list_existing_codes` -> allocate -> `persist_actor`
/// per actor kind is this collaborator's job; the engine does not lock.
#[async_trait]
pub trait ActorRepository: Send + Sync {
    async fn list_existing_codes(&self, kind: ActorKind) -> Result<ExistingCodes, RepositoryError>;
    async fn existing_emails(&self, kind: ActorKind) -> Result<Vec<String>, RepositoryError>;
    async fn persist_actor(&self, record: &ActorRecord) -> Result<(), RepositoryError>;
    async fn fetch_driver(&self, code: &IdentityCode) -> Result<Option<DriverRecord>, RepositoryError>;
    /// Return a code to the free pool so gap-fill can reissue it.
    async fn release_code(&self, code: &IdentityCode) -> Result<(), RepositoryError>;
    async fn record_migration(&self, record: &MigrationRecord) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Stand-in used when no real integrations are wired, e.g. by the offline CLI.
#[derive(Debug, Clone, Default)]
pub struct UnavailableProviders;

impl UnavailableProviders {
    pub fn bundle() -> CheckProviders {
        let provider = Arc::new(UnavailableProviders);
        CheckProviders {
            otp: provider.clone(),
            email: provider.clone(),
            ocr: provider.clone(),
            faces: provider.clone(),
            geocoders: vec![provider.clone()],
            registry: provider,
        }
    }

    fn fault() -> ProviderError {
        ProviderError::Unavailable("no integration configured".to_string())
    }
}

#[async_trait]
impl OtpService for UnavailableProviders {
    async fn send_otp(&self, _phone: &str) -> Result<bool, ProviderError> {
        Err(Self::fault())
    }

    async fn verify_otp(&self, _phone: &str, _code: &str) -> Result<bool, ProviderError> {
        Err(Self::fault())
    }
}

#[async_trait]
impl EmailVerification for UnavailableProviders {
    async fn send_token(&self, _email: &str) -> Result<bool, ProviderError> {
        Err(Self::fault())
    }

    async fn verify_token(&self, _email: &str, _token: &str) -> Result<bool, ProviderError> {
        Err(Self::fault())
    }
}

#[async_trait]
impl DocumentOcr for UnavailableProviders {
    async fn extract(
        &self,
        _kind: DocumentKind,
        _image: &[u8],
    ) -> Result<Option<OcrExtraction>, ProviderError> {
        Err(Self::fault())
    }
}

#[async_trait]
impl FaceAnalysis for UnavailableProviders {
    async fn detect_face(&self, _image: &[u8]) -> Result<Option<FaceDetection>, ProviderError> {
        Err(Self::fault())
    }

    async fn compare_faces(&self, _first: &[u8], _second: &[u8]) -> Result<f32, ProviderError> {
        Err(Self::fault())
    }
}

#[async_trait]
impl Geocoder for UnavailableProviders {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn geocode(&self, _address: &str) -> Result<Option<GeocodeResult>, ProviderError> {
        Err(Self::fault())
    }
}

#[async_trait]
impl IdentityRegistry for UnavailableProviders {
    async fn lookup(&self, _national_id: &str) -> Result<Option<RegistryEntry>, ProviderError> {
        Err(Self::fault())
    }
}
