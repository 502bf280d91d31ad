use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::codes::{CodeAllocator, CodesExhausted, ExistingCodes};
use super::domain::{
    filled, is_valid_email, ActorKind, ActorRecord, IdentityCode, RiderApplication, RiderRecord,
    RiderStatus,
};
use super::error::{IntakeError, OnboardingError};
use super::ports::ActorRepository;
use super::response::WorkflowResponse;
use super::verification::{CheckPlan, VerificationAggregator, VerificationSubject};

/// What happened to a rider's request to keep a legacy code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRecovery {
    pub requested: String,
    pub granted: bool,
    pub code: IdentityCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderRegistration {
    pub rider: RiderRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery: Option<CodeRecovery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

/// Single-step rider registration: approved immediately or rejected with reasons.
pub struct RiderOnboardingWorkflow<R> {
    repository: Arc<R>,
    verifier: Arc<VerificationAggregator>,
    allocator: CodeAllocator,
}

impl<R> RiderOnboardingWorkflow<R>
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

    /// Riders are stored only when every hard gate passed.
    pub async fn register(
        &self,
        application: RiderApplication,
        plan: &CheckPlan,
    ) -> Result<WorkflowResponse<RiderRegistration>, OnboardingError> {
        if let Err(error) = validate(&application) {
            warn!(field = error.field(), "rider application incomplete");
            return Ok(error.into());
        }

        let RiderApplication {
            contact,
            identity,
            address,
            documents,
            inputs,
            requested_code,
            origin,
        } = application;

        let existing = self
            .repository
            .list_existing_codes(ActorKind::Rider)
            .await?;
        let (code, recovery) =
            match assign_code(&self.allocator, filled(&requested_code), &existing) {
                Ok(assigned) => assigned,
                Err(exhausted) => {
                    warn!(error = %exhausted, "rider registration refused");
                    return Ok(WorkflowResponse::failure(vec![exhausted.to_string()]));
                }
            };

        let evaluation = self
            .verifier
            .evaluate(
                &VerificationSubject {
                    kind: ActorKind::Rider,
                    contact: &contact,
                    identity: &identity,
                    address: &address,
                    documents: &documents,
                    credentials: None,
                    inputs: &inputs,
                },
                plan,
            )
            .await;
        let decision = evaluation.decision();

        if !decision.passed {
            info!(%code, failed = decision.errors.len(), "rider failed verification");
            return Ok(WorkflowResponse::failure(decision.errors)
                .with_message("Rider registration did not pass verification."));
        }

        let rider = RiderRecord {
            code,
            contact,
            identity,
            address,
            documents,
            status: RiderStatus::Approved,
            origin,
            registered_at: Utc::now(),
            migrated_from_driver: false,
            previous_driver_code: None,
            verification: Some(evaluation.summary),
        };
        self.repository
            .persist_actor(&ActorRecord::Rider(rider.clone()))
            .await?;
        info!(%code, origin = ?rider.origin, "rider registered");

        let mut message = format!("Welcome, {}.", rider.display_name());
        if let Some(recovery) = &recovery {
            message.push(' ');
            message.push_str(&recovery.message);
        }

        Ok(WorkflowResponse::success(RiderRegistration {
            rider,
            recovery,
            recommendations: decision.recommendations,
        })
        .with_message(message))
    }
}

/// Honor a requested legacy code when it is free, otherwise take the next one.
fn assign_code(
    allocator: &CodeAllocator,
    requested: Option<&str>,
    existing: &ExistingCodes,
) -> Result<(IdentityCode, Option<CodeRecovery>), CodesExhausted> {
    let Some(requested) = requested else {
        return Ok((allocator.allocate(ActorKind::Rider, existing)?, None));
    };

    let reservation = allocator.reserve_specific(requested, ActorKind::Rider, existing)?;
    let message = if reservation.granted {
        format!("Your previous code {} was recovered.", reservation.code)
    } else {
        format!(
            "Code {requested} is not available. You were assigned {}.",
            reservation.code
        )
    };
    let recovery = CodeRecovery {
        requested: requested.to_string(),
        granted: reservation.granted,
        code: reservation.code,
        message,
    };
    Ok((reservation.code, Some(recovery)))
}

fn validate(application: &RiderApplication) -> Result<(), IntakeError> {
    let Some(email) = filled(&application.contact.email) else {
        return Err(IntakeError::MissingField("email"));
    };
    if filled(&application.identity.first_name).is_none() {
        return Err(IntakeError::MissingField("first_name"));
    }
    if !is_valid_email(email) {
        return Err(IntakeError::InvalidField {
            field: "email",
            reason: "not a valid address".to_string(),
        });
    }
    Ok(())
}
