use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::codes::CodeAllocator;
use super::domain::{
    filled, is_valid_email, ActorKind, ActorRecord, DriverApplication, DriverRecord, DriverStatus,
    IdentityCode, InspectionVerdict,
};
use super::error::{IntakeError, OnboardingError};
use super::ports::ActorRepository;
use super::response::WorkflowResponse;
use super::verification::{CheckPlan, VerificationAggregator, VerificationSubject};

/// Driver intake and the manual inspection that follows it.
///
/// `new -> pending_inspection -> {approved, rejected}`. Automated checks run once, at
/// intake; the inspection step only records the inspector's verdict.
pub struct DriverOnboardingWorkflow<R> {
    repository: Arc<R>,
    verifier: Arc<VerificationAggregator>,
    allocator: CodeAllocator,
}

impl<R> DriverOnboardingWorkflow<R>
where
    R: ActorRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        verifier: Arc<VerificationAggregator>,
        allocator: CodeAllocator,
    ) -> Self {
        Self {
            repository,
            verifier,
            allocator,
        }
    }

    /// Allocate a code, run every required check and store the driver as pending
    /// inspection. The record is stored whether or not the checks passed.
    pub async fn intake(
        &self,
        application: DriverApplication,
        plan: &CheckPlan,
    ) -> Result<WorkflowResponse<DriverRecord>, OnboardingError> {
        if let Err(error) = validate(&application) {
            warn!(field = error.field(), "driver application incomplete");
            return Ok(error.into());
        }

        let DriverApplication {
            contact,
            identity,
            address,
            documents,
            credentials,
            inputs,
        } = application;

        let existing = self
            .repository
            .list_existing_codes(ActorKind::Driver)
            .await?;
        let code = match self.allocator.allocate(ActorKind::Driver, &existing) {
            Ok(code) => code,
            Err(exhausted) => {
                warn!(error = %exhausted, "driver intake refused");
                return Ok(WorkflowResponse::failure(vec![exhausted.to_string()]));
            }
        };

        let evaluation = self
            .verifier
            .evaluate(
                &VerificationSubject {
                    kind: ActorKind::Driver,
                    contact: &contact,
                    identity: &identity,
                    address: &address,
                    documents: &documents,
                    credentials: Some(&credentials),
                    inputs: &inputs,
                },
                plan,
            )
            .await;
        let decision = evaluation.decision();

        let record = DriverRecord {
            code,
            contact,
            identity,
            address,
            documents,
            credentials,
            status: DriverStatus::PendingInspection,
            registered_at: Utc::now(),
            inspection: None,
            verification: Some(evaluation.summary),
        };
        self.repository
            .persist_actor(&ActorRecord::Driver(record.clone()))
            .await?;

        if decision.passed {
            info!(%code, "driver registered, awaiting inspection");
            Ok(WorkflowResponse::success(record).with_message(inspection_instructions(code)))
        } else {
            info!(%code, failed = decision.errors.len(), "driver failed automated checks");
            Ok(WorkflowResponse::failure(decision.errors)
                .with_data(record)
                .with_message(format!(
                    "Driver registration {code} did not pass verification. Correct the listed \
                     items and resubmit."
                )))
        }
    }

    /// Apply the physical inspection verdict to a pending driver.
    pub async fn complete_inspection(
        &self,
        code: &IdentityCode,
        verdict: InspectionVerdict,
        inspector_id: &str,
    ) -> Result<WorkflowResponse<DriverRecord>, OnboardingError> {
        if code.kind() != ActorKind::Driver {
            return Err(OnboardingError::WrongActorKind(*code));
        }

        let driver = self
            .repository
            .fetch_driver(code)
            .await?
            .ok_or(OnboardingError::UnknownDriver(*code))?;

        let updated = driver.apply_inspection(verdict, inspector_id, Utc::now())?;
        self.repository
            .persist_actor(&ActorRecord::Driver(updated.clone()))
            .await?;

        let message = match updated.rejection_reason() {
            None => format!("Driver {code} approved. The account is now active."),
            Some(reason) => format!(
                "Driver {code} rejected: {reason}. The applicant may continue as a rider."
            ),
        };
        info!(%code, status = %updated.status, inspector = inspector_id.trim(), "inspection recorded");

        Ok(WorkflowResponse::success(updated).with_message(message))
    }
}

fn validate(application: &DriverApplication) -> Result<(), IntakeError> {
    let required = [
        ("phone", &application.contact.phone),
        ("email", &application.contact.email),
        ("national_id", &application.identity.national_id),
        ("first_name", &application.identity.first_name),
        ("last_name", &application.identity.last_name),
    ];
    for (field, value) in required {
        if filled(value).is_none() {
            return Err(IntakeError::MissingField(field));
        }
    }

    match filled(&application.contact.email) {
        Some(email) if !is_valid_email(email) => Err(IntakeError::InvalidField {
            field: "email",
            reason: "not a valid address".to_string(),
        }),
        _ => Ok(()),
    }
}

fn inspection_instructions(code: IdentityCode) -> String {
    format!(
        "Registration received. Your driver code is {code}. Bring your vehicle together with \
         your original national id, driver license, tax registry (RIF) and vehicle papers to \
         the inspection center and quote code {code} to complete the physical inspection."
    )
}
