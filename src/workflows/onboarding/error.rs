use super::codes::CodesExhausted;
use super::domain::{IdentityCode, TransitionError};
use super::ports::RepositoryError;

/// An application was rejected before any code was allocated or check run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

impl IntakeError {
    pub fn field(&self) -> &'static str {
        match self {
            IntakeError::MissingField(field) | IntakeError::InvalidField { field, .. } => *field,
        }
    }
}

/// Caller faults and infrastructure failures. Business rejections never use this type.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("driver {0} does not exist")]
    UnknownDriver(IdentityCode),
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("code {0} does not belong to the expected actor kind")]
    WrongActorKind(IdentityCode),
    #[error(transparent)]
    CodesExhausted(#[from] CodesExhausted),
}
