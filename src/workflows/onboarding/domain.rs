use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Number of digits in the numeric part of an identity code.
pub const CODE_DIGITS: usize = 4;

/// Highest number that still fits in [`CODE_DIGITS`] digits.
pub const MAX_CODE_NUMBER: u32 = 9999;

/// The two onboarding namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Rider,
    Driver,
}

impl ActorKind {
    pub const fn prefix(self) -> char {
        match self {
            ActorKind::Rider => 'p',
            ActorKind::Driver => 'c',
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ActorKind::Rider => "cliente",
            ActorKind::Driver => "conductor",
        }
    }

    fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'p' => Some(ActorKind::Rider),
            'c' => Some(ActorKind::Driver),
            _ => None,
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ActorKind {
    type Err = UnknownActorKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rider" | "cliente" => Ok(ActorKind::Rider),
            "driver" | "conductor" => Ok(ActorKind::Driver),
            _ => Err(UnknownActorKind(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown actor kind '{0}' (expected rider/cliente or driver/conductor)")]
pub struct UnknownActorKind(pub String);

/// Human-facing sequential code such as `p0001` or `c0110`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityCode {
    kind: ActorKind,
    number: u32,
}

impl IdentityCode {
    pub const fn new(kind: ActorKind, number: u32) -> Self {
        Self { kind, number }
    }

    pub const fn kind(&self) -> ActorKind {
        self.kind
    }

    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Strict parse: a known prefix followed by exactly four ASCII digits.
    pub fn parse(value: &str) -> Option<Self> {
        let mut chars = value.chars();
        let kind = ActorKind::from_prefix(chars.next()?)?;
        let digits = chars.as_str();
        if digits.len() != CODE_DIGITS || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }

        let number = digits.parse().ok()?;
        Some(Self { kind, number })
    }

    pub fn parse_for(kind: ActorKind, value: &str) -> Option<Self> {
        Self::parse(value).filter(|code| code.kind == kind)
    }
}

impl fmt::Display for IdentityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:0width$}",
            self.kind.prefix(),
            self.number,
            width = CODE_DIGITS
        )
    }
}

impl TryFrom<String> for IdentityCode {
    type Error = InvalidIdentityCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(InvalidIdentityCode(value))
    }
}

impl From<IdentityCode> for String {
    fn from(code: IdentityCode) -> Self {
        code.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid identity code (expected p0000 or c0000)")]
pub struct InvalidIdentityCode(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub phone: Option<String>,
    #[serde(default)]
    pub phone_verified: bool,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDetails {
    pub national_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl IdentityDetails {
    pub fn full_name(&self) -> String {
        [filled(&self.first_name), filled(&self.last_name)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDetails {
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub sector: Option<String>,
    /// Free-form line used when the street was not captured separately.
    pub line: Option<String>,
}

impl AddressDetails {
    /// Street portion used for geocoding, if any was supplied.
    pub fn street_line(&self) -> Option<String> {
        if let Some(street) = filled(&self.street) {
            return Some(match filled(&self.house_number) {
                Some(number) => format!("{street} {number}"),
                None => street.to_string(),
            });
        }

        filled(&self.line).map(str::to_string)
    }
}

/// Raw document images submitted during registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_photo: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selfie: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selfie_with_id: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_registry_photo: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_photo: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_title: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_of_sale: Option<Vec<u8>>,
}

/// Driver-only declarations checked against OCR output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverCredentials {
    pub tax_id: Option<String>,
    pub license_number: Option<String>,
    pub license_category: Option<String>,
    pub license_expiry: Option<NaiveDate>,
    pub plate: Option<String>,
}

/// Secrets the applicant typed back during registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationInputs {
    pub otp_code: Option<String>,
    pub email_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    PendingInspection,
    Approved,
    Rejected,
}

impl DriverStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DriverStatus::PendingInspection => "pending_inspection",
            DriverStatus::Approved => "approved",
            DriverStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiderStatus {
    Approved,
    Inactive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationOrigin {
    #[default]
    Manual,
    ContactImport,
    DriverMigration,
}

/// Result of the physical inspection performed at the office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum InspectionVerdict {
    Approved,
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionRecord {
    pub inspector_id: String,
    pub inspected_at: DateTime<Utc>,
    pub approved: bool,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Facts worth keeping from an evaluation once the outcome set is discarded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationSummary {
    /// Every required check passed at intake.
    #[serde(default)]
    pub checks_passed: bool,
    pub face_match_score: Option<f32>,
    pub coordinates: Option<Coordinates>,
    pub formatted_address: Option<String>,
    pub registry_confirmed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverRecord {
    pub code: IdentityCode,
    pub contact: ContactDetails,
    pub identity: IdentityDetails,
    pub address: AddressDetails,
    pub documents: DocumentSet,
    pub credentials: DriverCredentials,
    pub status: DriverStatus,
    pub registered_at: DateTime<Utc>,
    pub inspection: Option<InspectionRecord>,
    pub verification: Option<VerificationSummary>,
}

impl DriverRecord {
    /// Record the physical inspection outcome. Automated checks are not re-run.
    pub fn apply_inspection(
        mut self,
        verdict: InspectionVerdict,
        inspector_id: &str,
        inspected_at: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        if self.status != DriverStatus::PendingInspection {
            return Err(TransitionError::NotPendingInspection {
                code: self.code,
                status: self.status,
            });
        }

        let inspector_id = inspector_id.trim();
        if inspector_id.is_empty() {
            return Err(TransitionError::MissingInspector);
        }

        let (status, rejection_reason) = match verdict {
            InspectionVerdict::Approved => {
                if !self.checks_passed() {
                    return Err(TransitionError::ChecksNotPassed(self.code));
                }
                (DriverStatus::Approved, None)
            }
            InspectionVerdict::Rejected { reason } => {
                let reason = reason.trim().to_string();
                if reason.is_empty() {
                    return Err(TransitionError::MissingRejectionReason);
                }
                (DriverStatus::Rejected, Some(reason))
            }
        };

        self.status = status;
        self.inspection = Some(InspectionRecord {
            inspector_id: inspector_id.to_string(),
            inspected_at,
            approved: status == DriverStatus::Approved,
            rejection_reason,
        });

        Ok(self)
    }

    pub fn checks_passed(&self) -> bool {
        self.verification
            .as_ref()
            .is_some_and(|summary| summary.checks_passed)
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.inspection
            .as_ref()
            .and_then(|inspection| inspection.rejection_reason.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("driver {code} is {status}; only pending_inspection drivers can be inspected")]
    NotPendingInspection {
        code: IdentityCode,
        status: DriverStatus,
    },
    #[error("inspection requires an inspector id")]
    MissingInspector,
    #[error("rejecting a driver requires a reason")]
    MissingRejectionReason,
    #[error("driver {0} did not pass the automated checks and cannot be approved")]
    ChecksNotPassed(IdentityCode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderRecord {
    pub code: IdentityCode,
    pub contact: ContactDetails,
    pub identity: IdentityDetails,
    pub address: AddressDetails,
    pub documents: DocumentSet,
    pub status: RiderStatus,
    pub origin: RegistrationOrigin,
    pub registered_at: DateTime<Utc>,
    #[serde(rename = "es_migracion_desde_conductor", default)]
    pub migrated_from_driver: bool,
    #[serde(
        rename = "codigo_conductor_anterior",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_driver_code: Option<IdentityCode>,
    pub verification: Option<VerificationSummary>,
}

impl RiderRecord {
    /// Name shown in the rider app, code first.
    pub fn display_name(&self) -> String {
        let name = self.identity.full_name();
        if name.is_empty() {
            self.code.to_string()
        } else {
            format!("{} - {}", self.code, name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActorRecord {
    Driver(DriverRecord),
    Rider(RiderRecord),
}

impl ActorRecord {
    pub fn code(&self) -> IdentityCode {
        match self {
            ActorRecord::Driver(record) => record.code,
            ActorRecord::Rider(record) => record.code,
        }
    }

    pub fn kind(&self) -> ActorKind {
        self.code().kind()
    }

    pub fn email(&self) -> Option<&str> {
        let contact = match self {
            ActorRecord::Driver(record) => &record.contact,
            ActorRecord::Rider(record) => &record.contact,
        };
        filled(&contact.email)
    }
}

/// Links a released driver code to the rider code issued in its place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub released_driver_code: IdentityCode,
    pub rider_code: IdentityCode,
    pub rejection_reason: Option<String>,
    pub migrated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverApplication {
    pub contact: ContactDetails,
    pub identity: IdentityDetails,
    #[serde(default)]
    pub address: AddressDetails,
    #[serde(default)]
    pub documents: DocumentSet,
    #[serde(default)]
    pub credentials: DriverCredentials,
    #[serde(default)]
    pub inputs: VerificationInputs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderApplication {
    pub contact: ContactDetails,
    pub identity: IdentityDetails,
    #[serde(default)]
    pub address: AddressDetails,
    #[serde(default)]
    pub documents: DocumentSet,
    #[serde(default)]
    pub inputs: VerificationInputs,
    /// Legacy code the rider asked to recover.
    #[serde(default)]
    pub requested_code: Option<String>,
    #[serde(default)]
    pub origin: RegistrationOrigin,
}

/// Fields carried over when a rejected driver becomes a rider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderBasics {
    pub contact: ContactDetails,
    pub identity: IdentityDetails,
    #[serde(default)]
    pub address: AddressDetails,
}

/// Trimmed, non-empty view of an optional text field.
pub(crate) fn filled(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Loose `local@domain.tld` shape check applied to every captured email.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
        .is_match(value.trim())
}
