use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Every automated check, declared in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    Otp,
    Email,
    IdDocumentOcr,
    LicenseOcr,
    TaxRegistryOcr,
    SelfieLiveness,
    FaceMatch,
    ServiceArea,
    IdentityRegistry,
}

impl CheckName {
    pub const ALL: [CheckName; 9] = [
        CheckName::Otp,
        CheckName::Email,
        CheckName::IdDocumentOcr,
        CheckName::LicenseOcr,
        CheckName::TaxRegistryOcr,
        CheckName::SelfieLiveness,
        CheckName::FaceMatch,
        CheckName::ServiceArea,
        CheckName::IdentityRegistry,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            CheckName::Otp => "otp",
            CheckName::Email => "email",
            CheckName::IdDocumentOcr => "id_document_ocr",
            CheckName::LicenseOcr => "license_ocr",
            CheckName::TaxRegistryOcr => "tax_registry_ocr",
            CheckName::SelfieLiveness => "selfie_liveness",
            CheckName::FaceMatch => "face_match",
            CheckName::ServiceArea => "service_area",
            CheckName::IdentityRegistry => "identity_registry",
        }
    }

    /// Message shown when a required check did not pass.
    pub const fn failure_message(self) -> &'static str {
        match self {
            CheckName::Otp => "OTP code is invalid",
            CheckName::Email => "email address is not verified",
            CheckName::IdDocumentOcr => "national id document could not be verified",
            CheckName::LicenseOcr => "driver license could not be verified",
            CheckName::TaxRegistryOcr => "tax registry (RIF) could not be verified",
            CheckName::SelfieLiveness => "selfie is not valid",
            CheckName::FaceMatch => "face does not match the national id photo",
            CheckName::ServiceArea => "address could not be verified inside the service area",
            CheckName::IdentityRegistry => "identity could not be confirmed with the national registry",
        }
    }

    /// Non-blocking note shown to riders when an advisory check did not pass.
    pub const fn recommendation(self) -> &'static str {
        match self {
            CheckName::Otp => "we recommend verifying your phone number",
            CheckName::Email => "we recommend verifying your email address",
            CheckName::IdDocumentOcr => "we recommend uploading a photo of your national id",
            CheckName::LicenseOcr => "we recommend uploading your driver license",
            CheckName::TaxRegistryOcr => "we recommend uploading your tax registry (RIF)",
            CheckName::SelfieLiveness => "we recommend retaking your selfie",
            CheckName::FaceMatch => "we recommend a selfie that clearly matches your id photo",
            CheckName::ServiceArea => "we recommend reviewing your address",
            CheckName::IdentityRegistry => "we recommend checking your name and national id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Passed,
    Failed,
    /// The triggering input was not supplied.
    NotAttempted,
    /// Excluded by the check plan for this registration source.
    Waived,
}

impl CheckOutcome {
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            CheckOutcome::Passed
        } else {
            CheckOutcome::Failed
        }
    }

    pub fn passed(self) -> bool {
        self == CheckOutcome::Passed
    }
}

/// Outcome of every check for one registration attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcomeSet {
    outcomes: BTreeMap<CheckName, CheckOutcome>,
    face_match_score: Option<f32>,
}

impl CheckOutcomeSet {
    pub fn record(&mut self, check: CheckName, outcome: CheckOutcome) {
        self.outcomes.insert(check, outcome);
    }

    pub fn with(mut self, check: CheckName, outcome: CheckOutcome) -> Self {
        self.record(check, outcome);
        self
    }

    /// Unrecorded checks read as not attempted.
    pub fn get(&self, check: CheckName) -> CheckOutcome {
        self.outcomes
            .get(&check)
            .copied()
            .unwrap_or(CheckOutcome::NotAttempted)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CheckName, CheckOutcome)> + '_ {
        CheckName::ALL.into_iter().map(|check| (check, self.get(check)))
    }

    pub fn face_match_score(&self) -> Option<f32> {
        self.face_match_score
    }

    pub fn set_face_match_score(&mut self, score: Option<f32>) {
        self.face_match_score = score;
    }
}

/// Checks a registration source cannot feed, removed from the required set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPlan {
    waived: BTreeSet<CheckName>,
}

impl CheckPlan {
    pub fn full() -> Self {
        Self::default()
    }

    /// Imported contacts carry no documents or photos.
    pub fn contact_import() -> Self {
        Self::full()
            .waive(CheckName::IdDocumentOcr)
            .waive(CheckName::LicenseOcr)
            .waive(CheckName::TaxRegistryOcr)
            .waive(CheckName::SelfieLiveness)
            .waive(CheckName::FaceMatch)
    }

    pub fn waive(mut self, check: CheckName) -> Self {
        self.waived.insert(check);
        self
    }

    pub fn is_waived(&self, check: CheckName) -> bool {
        self.waived.contains(&check)
    }
}
