//! Bulk onboarding of contacts exported from an address book or CRM.
//!
//! Contacts are cleaned, filtered and de-duplicated by email, then registered one at a
//! time through the rider or driver workflow with the document and face checks waived.

mod classify;
mod normalizer;
mod parser;

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::workflows::onboarding::domain::{
    ActorKind, ContactDetails, DriverApplication, IdentityCode, IdentityDetails,
    RegistrationOrigin, RiderApplication,
};
use crate::workflows::onboarding::{
    ActorRepository, CheckPlan, DriverOnboardingWorkflow, OnboardingEngine,
    RiderOnboardingWorkflow,
};

pub use classify::{ContactClassifier, HintClassifier};

use normalizer::EmailProblem;

#[derive(Debug)]
pub enum ContactImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for ContactImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactImportError::Io(err) => write!(f, "failed to read contacts file: {}", err),
            ContactImportError::Csv(err) => write!(f, "invalid contacts CSV data: {}", err),
        }
    }
}

impl std::error::Error for ContactImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContactImportError::Io(err) => Some(err),
            ContactImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ContactImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ContactImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// One externally sourced contact, as read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Cédula, when the export carries one. Required for drivers.
    pub national_id: Option<String>,
    /// Free-text actor type, e.g. `conductor` or `cliente`.
    pub kind_hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterReason {
    MissingEmail,
    InvalidEmail,
    DuplicateEmail,
    MissingName,
    /// Drivers need a phone, a national id and a last name to enter intake.
    MissingDriverIdentity,
    UnreadableRow,
}

impl FilterReason {
    pub fn describe(self) -> &'static str {
        match self {
            FilterReason::MissingEmail => "no email address",
            FilterReason::InvalidEmail => "malformed email address",
            FilterReason::DuplicateEmail => "email already registered",
            FilterReason::MissingName => "no usable name",
            FilterReason::MissingDriverIdentity => "driver without phone, national id or last name",
            FilterReason::UnreadableRow => "row could not be decoded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredContact {
    pub index: usize,
    pub reason: FilterReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactOutcome {
    pub index: usize,
    pub email: String,
    pub kind: ActorKind,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<IdentityCode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub total: usize,
    pub processed: usize,
    pub filtered: Vec<FilteredContact>,
    pub riders_approved: usize,
    pub drivers_pending_inspection: usize,
    pub failed: usize,
    pub outcomes: Vec<ContactOutcome>,
    pub errors: Vec<String>,
}

/// A contact that survived filtering.
struct Candidate {
    index: usize,
    kind: ActorKind,
    email: String,
    phone: Option<String>,
    national_id: Option<String>,
    first_name: String,
    last_name: Option<String>,
}

pub struct ContactImportWorkflow<R> {
    repository: Arc<R>,
    riders: Arc<RiderOnboardingWorkflow<R>>,
    drivers: Arc<DriverOnboardingWorkflow<R>>,
    classifier: Box<dyn ContactClassifier>,
}

impl<R> ContactImportWorkflow<R>
where
    R: ActorRepository + 'static,
{
    pub fn new(engine: &OnboardingEngine<R>) -> Self {
        Self {
            repository: engine.repository(),
            riders: engine.riders(),
            drivers: engine.drivers(),
            classifier: Box::new(HintClassifier),
        }
    }

    pub fn with_classifier(mut self, classifier: impl ContactClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub async fn import_path<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<ImportReport, ContactImportError> {
        let file = std::fs::File::open(path)?;
        self.import_reader(file).await
    }

    pub async fn import_reader<Rd: Read>(
        &self,
        reader: Rd,
    ) -> Result<ImportReport, ContactImportError> {
        let rows = parser::parse_contacts(reader)?;
        Ok(self.import_rows(rows).await)
    }

    /// Register every usable contact. Per-contact failures are reported, never raised.
    pub async fn import(&self, contacts: Vec<ImportedContact>) -> ImportReport {
        self.import_rows(contacts.into_iter().map(Ok).collect()).await
    }

    async fn import_rows(&self, rows: Vec<parser::ParsedRow>) -> ImportReport {
        let mut report = ImportReport {
            total: rows.len(),
            ..ImportReport::default()
        };

        let mut seen = self.known_emails(&mut report).await;

        for (index, row) in rows.into_iter().enumerate() {
            let contact = match row {
                Ok(contact) => contact,
                Err(err) => {
                    warn!(index, error = %err, "skipping unreadable contact row");
                    report.errors.push(format!("row {index}: {err}"));
                    report.filtered.push(FilteredContact {
                        index,
                        reason: FilterReason::UnreadableRow,
                    });
                    continue;
                }
            };
            let candidate = match self.screen(index, contact, &seen) {
                Ok(candidate) => candidate,
                Err(reason) => {
                    report.filtered.push(FilteredContact { index, reason });
                    continue;
                }
            };
            seen.insert(candidate.email.clone());
            report.processed += 1;

            let outcome = self.register(candidate, &mut report).await;
            if !outcome.success {
                report.failed += 1;
            }
            report.outcomes.push(outcome);
        }

        info!(
            total = report.total,
            processed = report.processed,
            filtered = report.filtered.len(),
            riders = report.riders_approved,
            drivers = report.drivers_pending_inspection,
            failed = report.failed,
            "contact import finished"
        );
        report
    }

    async fn known_emails(&self, report: &mut ImportReport) -> HashSet<String> {
        let mut known = HashSet::new();
        for kind in [ActorKind::Rider, ActorKind::Driver] {
            match self.repository.existing_emails(kind).await {
                Ok(emails) => {
                    known.extend(emails.into_iter().map(|email| email.trim().to_lowercase()))
                }
                Err(err) => {
                    warn!(kind = kind.label(), error = %err, "could not load existing emails");
                    report
                        .errors
                        .push(format!("could not load existing {} emails: {err}", kind.label()));
                }
            }
        }
        known
    }

    fn screen(
        &self,
        index: usize,
        contact: ImportedContact,
        seen: &HashSet<String>,
    ) -> Result<Candidate, FilterReason> {
        let email = normalizer::normalize_email(contact.email.as_deref()).map_err(|problem| {
            match problem {
                EmailProblem::Missing => FilterReason::MissingEmail,
                EmailProblem::Malformed => FilterReason::InvalidEmail,
            }
        })?;
        if seen.contains(&email) {
            return Err(FilterReason::DuplicateEmail);
        }

        let first = normalizer::clean_name(contact.first_name.as_deref());
        let last = normalizer::clean_name(contact.last_name.as_deref());
        let (first_name, last_name) = match (first, last) {
            (Some(first), last) => (first, last),
            (None, Some(last)) => (last, None),
            (None, None) => return Err(FilterReason::MissingName),
        };

        let kind = self.classifier.classify(&contact);
        let phone = normalizer::normalize_phone(contact.phone.as_deref());
        let national_id = contact
            .national_id
            .as_deref()
            .map(normalizer::clean_text)
            .filter(|id| !id.is_empty());
        if kind == ActorKind::Driver
            && (phone.is_none() || national_id.is_none() || last_name.is_none())
        {
            return Err(FilterReason::MissingDriverIdentity);
        }

        Ok(Candidate {
            index,
            kind,
            email,
            phone,
            national_id,
            first_name,
            last_name,
        })
    }

    async fn register(&self, candidate: Candidate, report: &mut ImportReport) -> ContactOutcome {
        let Candidate {
            index,
            kind,
            email,
            phone,
            national_id,
            first_name,
            last_name,
        } = candidate;

        let contact = ContactDetails {
            phone,
            phone_verified: false,
            email: Some(email.clone()),
            email_verified: true,
        };
        let identity = IdentityDetails {
            national_id,
            first_name: Some(first_name),
            last_name,
        };
        let plan = CheckPlan::contact_import();

        let mut outcome = ContactOutcome {
            index,
            email,
            kind,
            success: false,
            code: None,
            errors: Vec::new(),
        };

        let result = match kind {
            ActorKind::Rider => self
                .riders
                .register(
                    RiderApplication {
                        contact,
                        identity,
                        origin: RegistrationOrigin::ContactImport,
                        ..RiderApplication::default()
                    },
                    &plan,
                )
                .await
                .map(|response| {
                    (
                        response.success,
                        response.data.map(|registration| registration.rider.code),
                        response.errors,
                    )
                }),
            ActorKind::Driver => self
                .drivers
                .intake(
                    DriverApplication {
                        contact,
                        identity,
                        ..DriverApplication::default()
                    },
                    &plan,
                )
                .await
                .map(|response| {
                    (
                        response.success,
                        response.data.map(|driver| driver.code),
                        response.errors,
                    )
                }),
        };

        match result {
            Ok((true, code, _)) => {
                outcome.success = true;
                outcome.code = code;
                match kind {
                    ActorKind::Rider => report.riders_approved += 1,
                    ActorKind::Driver => report.drivers_pending_inspection += 1,
                }
            }
            Ok((false, code, errors)) => {
                outcome.code = code;
                outcome.errors = errors;
            }
            Err(err) => {
                warn!(index, error = %err, "contact registration failed");
                report.errors.push(format!("contact {index}: {err}"));
                outcome.errors.push(err.to_string());
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::onboarding::{
        InMemoryActorRepository, NumberingPolicy, UnavailableProviders, VerificationConfig,
    };

    fn engine() -> OnboardingEngine<InMemoryActorRepository> {
        OnboardingEngine::new(
            Arc::new(InMemoryActorRepository::new()),
            UnavailableProviders::bundle(),
            NumberingPolicy::default(),
            VerificationConfig::default(),
        )
    }

    fn contact(first: &str, email: &str) -> ImportedContact {
        ImportedContact {
            first_name: Some(first.to_string()),
            email: Some(email.to_string()),
            ..ImportedContact::default()
        }
    }

    #[tokio::test]
    async fn filters_and_deduplicates_within_the_batch() {
        let engine = engine();
        let workflow = ContactImportWorkflow::new(&engine);

        let report = workflow
            .import(vec![
                contact("Ana", "ana@example.com"),
                contact("Ana B", "ANA@example.com"),
                contact("Luis", "luis@"),
                ImportedContact {
                    email: Some("anon@example.com".to_string()),
                    ..ImportedContact::default()
                },
                contact("Marta", ""),
            ])
            .await;

        assert_eq!(report.total, 5);
        assert_eq!(report.processed, 1);
        assert_eq!(
            report.filtered,
            vec![
                FilteredContact {
                    index: 1,
                    reason: FilterReason::DuplicateEmail
                },
                FilteredContact {
                    index: 2,
                    reason: FilterReason::InvalidEmail
                },
                FilteredContact {
                    index: 3,
                    reason: FilterReason::MissingName
                },
                FilteredContact {
                    index: 4,
                    reason: FilterReason::MissingEmail
                },
            ]
        );
        assert_eq!(report.riders_approved, 1);
        assert_eq!(report.outcomes[0].code.map(|c| c.to_string()).as_deref(), Some("p0001"));
    }

    #[tokio::test]
    async fn drivers_need_identity_details_to_enter_intake() {
        let engine = engine();
        let workflow = ContactImportWorkflow::new(&engine)
            .with_classifier(|contact: &ImportedContact| {
                if contact.first_name.as_deref() == Some("Pedro") {
                    ActorKind::Driver
                } else {
                    ActorKind::Rider
                }
            });

        let report = workflow
            .import(vec![
                contact("Pedro", "pedro@example.com"),
                contact("Rosa", "rosa@example.com"),
            ])
            .await;

        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(
            report.filtered,
            vec![FilteredContact {
                index: 0,
                reason: FilterReason::MissingDriverIdentity
            }]
        );
        assert_eq!(report.riders_approved, 1);
        assert_eq!(report.outcomes[0].code.map(|c| c.to_string()).as_deref(), Some("p0001"));
    }

    #[tokio::test]
    async fn imported_driver_is_stored_for_inspection_even_when_checks_fail() {
        let repository = Arc::new(InMemoryActorRepository::new());
        let engine = OnboardingEngine::new(
            repository.clone(),
            UnavailableProviders::bundle(),
            NumberingPolicy::default(),
            VerificationConfig::default(),
        );
        let driver = ImportedContact {
            last_name: Some("Parra".to_string()),
            phone: Some("0414-5550199".to_string()),
            national_id: Some("V-15.220.114".to_string()),
            kind_hint: Some("conductor".to_string()),
            ..contact("Mario", "mario.parra@example.com")
        };

        let report = ContactImportWorkflow::new(&engine).import(vec![driver]).await;

        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 1);
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.kind, ActorKind::Driver);
        assert_eq!(outcome.code.map(|c| c.to_string()).as_deref(), Some("c0001"));
        assert!(!outcome.errors.is_empty());

        let stored = repository.drivers();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].identity.national_id.as_deref(), Some("V-15.220.114"));
        assert!(!stored[0].checks_passed());
    }
}
