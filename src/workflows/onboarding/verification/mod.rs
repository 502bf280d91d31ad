//! Verification aggregation: run every applicable check for one registration attempt
//! and fold the outcomes into a single decision.
//!
//! Checks run concurrently and each collaborator call carries its own timeout. A
//! provider fault, timeout, or empty answer fails that check only.

mod address;
mod checks;
mod config;
mod names;
mod policy;

pub use checks::{CheckName, CheckOutcome, CheckOutcomeSet, CheckPlan};
pub use config::{BoundingBox, ServiceRegion, VerificationConfig};
pub use names::names_match;
pub use policy::{decide, required_checks, Decision};

use std::collections::BTreeSet;
use std::future::Future;

use tracing::{debug, info, warn};

use super::domain::{
    filled, ActorKind, AddressDetails, ContactDetails, DocumentSet, DriverCredentials,
    IdentityDetails, VerificationInputs, VerificationSummary,
};
use super::ports::{CheckProviders, DocumentKind, FaceDetection, GeocodeResult, ProviderError};

/// Borrowed view of everything an applicant submitted.
#[derive(Debug, Clone, Copy)]
pub struct VerificationSubject<'a> {
    pub kind: ActorKind,
    pub contact: &'a ContactDetails,
    pub identity: &'a IdentityDetails,
    pub address: &'a AddressDetails,
    pub documents: &'a DocumentSet,
    pub credentials: Option<&'a DriverCredentials>,
    pub inputs: &'a VerificationInputs,
}

/// Outcome set plus the facts worth keeping on the record.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub kind: ActorKind,
    pub outcomes: CheckOutcomeSet,
    pub required: BTreeSet<CheckName>,
    pub summary: VerificationSummary,
}

impl Evaluation {
    pub fn decision(&self) -> Decision {
        decide(self.kind, &self.outcomes, &self.required)
    }
}

pub struct VerificationAggregator {
    providers: CheckProviders,
    config: VerificationConfig,
}

impl VerificationAggregator {
    pub fn new(providers: CheckProviders, config: VerificationConfig) -> Self {
        Self { providers, config }
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    pub async fn evaluate(&self, subject: &VerificationSubject<'_>, plan: &CheckPlan) -> Evaluation {
        let credentials = subject.credentials;

        let (otp, email, id_ocr, license_ocr, tax_ocr, selfie, face, address, registry) = tokio::join!(
            unless_waived(plan, CheckName::Otp, self.check_otp(subject)),
            unless_waived(plan, CheckName::Email, self.check_email(subject)),
            unless_waived(
                plan,
                CheckName::IdDocumentOcr,
                self.check_document(
                    CheckName::IdDocumentOcr,
                    DocumentKind::IdCard,
                    subject.documents.id_photo.as_deref(),
                    filled(&subject.identity.national_id),
                ),
            ),
            unless_waived(
                plan,
                CheckName::LicenseOcr,
                self.check_document(
                    CheckName::LicenseOcr,
                    DocumentKind::License,
                    subject.documents.license_photo.as_deref(),
                    credentials.and_then(|c| filled(&c.license_number)),
                ),
            ),
            unless_waived(
                plan,
                CheckName::TaxRegistryOcr,
                self.check_document(
                    CheckName::TaxRegistryOcr,
                    DocumentKind::TaxRegistry,
                    subject.documents.tax_registry_photo.as_deref(),
                    credentials.and_then(|c| filled(&c.tax_id)),
                ),
            ),
            unless_waived(plan, CheckName::SelfieLiveness, self.check_selfie(subject)),
            unless_waived(plan, CheckName::FaceMatch, self.check_face_match(subject)),
            unless_waived(plan, CheckName::ServiceArea, self.check_address(subject)),
            unless_waived(plan, CheckName::IdentityRegistry, self.check_registry(subject)),
        );

        let mut outcomes = CheckOutcomeSet::default();
        for (check, outcome) in [
            (CheckName::Otp, otp.0),
            (CheckName::Email, email.0),
            (CheckName::IdDocumentOcr, id_ocr.0),
            (CheckName::LicenseOcr, license_ocr.0),
            (CheckName::TaxRegistryOcr, tax_ocr.0),
            (CheckName::SelfieLiveness, selfie.0),
            (CheckName::FaceMatch, face.0),
            (CheckName::ServiceArea, address.0),
            (CheckName::IdentityRegistry, registry.0),
        ] {
            outcomes.record(check, outcome);
        }
        outcomes.set_face_match_score(face.1);

        let required = required_checks(subject.kind, plan);
        let geocoded = address.1;
        let summary = VerificationSummary {
            checks_passed: decide(subject.kind, &outcomes, &required).passed,
            face_match_score: face.1,
            coordinates: geocoded.as_ref().map(|result| result.coordinates),
            formatted_address: geocoded.map(|result| result.formatted_address),
            registry_confirmed: match registry.0 {
                CheckOutcome::Passed => Some(true),
                CheckOutcome::Failed => Some(false),
                CheckOutcome::NotAttempted | CheckOutcome::Waived => None,
            },
        };

        let passed = outcomes.iter().filter(|(_, outcome)| outcome.passed()).count();
        info!(
            kind = subject.kind.label(),
            passed,
            required = required.len(),
            "verification checks completed"
        );

        Evaluation {
            kind: subject.kind,
            outcomes,
            required,
            summary,
        }
    }

    /// Composite registry check: clean the id, look it up, compare both names.
    pub async fn lookup_identity_registry(
        &self,
        national_id: &str,
        first_name: &str,
        last_name: &str,
    ) -> bool {
        let cleaned = digits_only(national_id);
        if !(7..=9).contains(&cleaned.len()) {
            debug!(length = cleaned.len(), "national id has an invalid format");
            return false;
        }

        let entry = self
            .call(
                CheckName::IdentityRegistry,
                self.providers.registry.lookup(&cleaned),
            )
            .await
            .flatten();

        match entry {
            Some(entry) => {
                names_match(first_name, &entry.first_names)
                    && names_match(last_name, &entry.last_names)
            }
            None => {
                debug!("national id not found in registry");
                false
            }
        }
    }

    pub async fn send_otp(&self, phone: &str) -> bool {
        self.call(CheckName::Otp, self.providers.otp.send_otp(phone))
            .await
            .unwrap_or(false)
    }

    pub async fn send_email_token(&self, email: &str) -> bool {
        self.call(CheckName::Email, self.providers.email.send_token(email))
            .await
            .unwrap_or(false)
    }

    async fn check_otp(&self, subject: &VerificationSubject<'_>) -> (CheckOutcome, ()) {
        let Some(phone) = filled(&subject.contact.phone) else {
            return (CheckOutcome::NotAttempted, ());
        };
        if subject.contact.phone_verified {
            return (CheckOutcome::Passed, ());
        }
        let Some(code) = filled(&subject.inputs.otp_code) else {
            return (CheckOutcome::NotAttempted, ());
        };

        let verified = self
            .call(CheckName::Otp, self.providers.otp.verify_otp(phone, code))
            .await
            .unwrap_or(false);
        (CheckOutcome::from_bool(verified), ())
    }

    async fn check_email(&self, subject: &VerificationSubject<'_>) -> (CheckOutcome, ()) {
        let Some(email) = filled(&subject.contact.email) else {
            return (CheckOutcome::NotAttempted, ());
        };
        if subject.contact.email_verified {
            return (CheckOutcome::Passed, ());
        }
        let Some(token) = filled(&subject.inputs.email_token) else {
            return (CheckOutcome::NotAttempted, ());
        };

        let verified = self
            .call(
                CheckName::Email,
                self.providers.email.verify_token(email, token),
            )
            .await
            .unwrap_or(false);
        (CheckOutcome::from_bool(verified), ())
    }

    async fn check_document(
        &self,
        check: CheckName,
        kind: DocumentKind,
        image: Option<&[u8]>,
        declared: Option<&str>,
    ) -> (CheckOutcome, ()) {
        let (Some(image), Some(declared)) = (image, declared) else {
            return (CheckOutcome::NotAttempted, ());
        };

        let extraction = self
            .call(check, self.providers.ocr.extract(kind, image))
            .await
            .flatten();

        let matches = extraction
            .filter(|extraction| extraction.document_kind() == kind)
            .and_then(|extraction| extraction.identifier().map(digits_only))
            .map(|extracted| {
                let declared = digits_only(declared);
                !declared.is_empty() && extracted == declared
            })
            .unwrap_or(false);

        if !matches {
            debug!(check = check.label(), "document identifier did not match");
        }
        (CheckOutcome::from_bool(matches), ())
    }

    async fn check_selfie(&self, subject: &VerificationSubject<'_>) -> (CheckOutcome, ()) {
        let Some(selfie) = subject.documents.selfie.as_deref() else {
            return (CheckOutcome::NotAttempted, ());
        };

        let live = self
            .call(
                CheckName::SelfieLiveness,
                self.providers.faces.detect_face(selfie),
            )
            .await
            .flatten()
            .map(|detection| self.is_live_selfie(&detection))
            .unwrap_or(false);
        (CheckOutcome::from_bool(live), ())
    }

    fn is_live_selfie(&self, detection: &FaceDetection) -> bool {
        let max_angle = self.config.selfie_max_angle_degrees;
        let angles = [
            detection.angles.roll,
            detection.angles.pan,
            detection.angles.tilt,
        ];

        detection.face_count == 1
            && detection.confidence >= self.config.selfie_min_confidence
            && angles.iter().all(|angle| angle.abs() <= max_angle)
    }

    async fn check_face_match(
        &self,
        subject: &VerificationSubject<'_>,
    ) -> (CheckOutcome, Option<f32>) {
        let (Some(selfie), Some(id_photo)) = (
            subject.documents.selfie.as_deref(),
            subject.documents.id_photo.as_deref(),
        ) else {
            return (CheckOutcome::NotAttempted, None);
        };

        let score = self
            .call(
                CheckName::FaceMatch,
                self.providers.faces.compare_faces(selfie, id_photo),
            )
            .await
            .filter(|score| score.is_finite())
            .map(|score| score.clamp(0.0, 100.0));

        let threshold = self.config.face_match_threshold(subject.kind);
        let passed = score.map(|score| score >= threshold).unwrap_or(false);
        (CheckOutcome::from_bool(passed), score)
    }

    async fn check_address(
        &self,
        subject: &VerificationSubject<'_>,
    ) -> (CheckOutcome, Option<GeocodeResult>) {
        let Some(street) = subject.address.street_line() else {
            return (CheckOutcome::NotAttempted, None);
        };

        let composed = address::compose_address(
            &street,
            filled(&subject.address.sector),
            &self.config.region,
        );
        let verification = address::verify_address(
            &self.providers.geocoders,
            &composed,
            &self.config.region,
            self.config.check_timeout,
        )
        .await;

        (
            CheckOutcome::from_bool(verification.in_service_area),
            verification.geocoded,
        )
    }

    async fn check_registry(&self, subject: &VerificationSubject<'_>) -> (CheckOutcome, ()) {
        let identity = subject.identity;
        let (Some(national_id), Some(first_name), Some(last_name)) = (
            filled(&identity.national_id),
            filled(&identity.first_name),
            filled(&identity.last_name),
        ) else {
            return (CheckOutcome::NotAttempted, ());
        };

        let confirmed = self
            .lookup_identity_registry(national_id, first_name, last_name)
            .await;
        (CheckOutcome::from_bool(confirmed), ())
    }

    /// Await a collaborator under the configured timeout, logging and discarding faults.
    async fn call<T>(
        &self,
        check: CheckName,
        request: impl Future<Output = Result<T, ProviderError>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.config.check_timeout, request).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                warn!(check = check.label(), error = %err, "verification provider failed");
                None
            }
            Err(_) => {
                warn!(
                    check = check.label(),
                    timeout_ms = self.config.check_timeout.as_millis() as u64,
                    "verification provider timed out"
                );
                None
            }
        }
    }
}

/// Skip a check the plan waives without polling it.
async fn unless_waived<T: Default>(
    plan: &CheckPlan,
    check: CheckName,
    run: impl Future<Output = (CheckOutcome, T)>,
) -> (CheckOutcome, T) {
    if plan.is_waived(check) {
        return (CheckOutcome::Waived, T::default());
    }
    run.await
}

pub(crate) fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}
