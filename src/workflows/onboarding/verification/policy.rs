use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::checks::{CheckName, CheckOutcome, CheckOutcomeSet, CheckPlan};
use crate::workflows::onboarding::domain::ActorKind;

/// Rider checks that block registration. Everything else is advisory for riders.
const RIDER_HARD_GATES: [CheckName; 2] = [CheckName::Email, CheckName::SelfieLiveness];

/// Rider checks whose failure is worth a recommendation.
const RIDER_ADVISORY: [CheckName; 5] = [
    CheckName::Otp,
    CheckName::IdDocumentOcr,
    CheckName::FaceMatch,
    CheckName::ServiceArea,
    CheckName::IdentityRegistry,
];

/// Checks that must pass for `kind`, minus anything the plan waives.
pub fn required_checks(kind: ActorKind, plan: &CheckPlan) -> BTreeSet<CheckName> {
    let base: &[CheckName] = match kind {
        ActorKind::Driver => &CheckName::ALL,
        ActorKind::Rider => &RIDER_HARD_GATES,
    };

    base.iter()
        .copied()
        .filter(|check| !plan.is_waived(*check))
        .collect()
}

/// Accept/reject verdict derived from an outcome set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub passed: bool,
    pub errors: Vec<String>,
    pub recommendations: Vec<String>,
}

pub fn decide(
    kind: ActorKind,
    outcomes: &CheckOutcomeSet,
    required: &BTreeSet<CheckName>,
) -> Decision {
    // BTreeSet iteration follows the declared check order.
    let blocking: Vec<String> = required
        .iter()
        .filter(|check| !outcomes.get(**check).passed())
        .map(|check| check.failure_message().to_string())
        .collect();

    let recommendations: Vec<String> = match kind {
        ActorKind::Driver => Vec::new(),
        ActorKind::Rider => RIDER_ADVISORY
            .iter()
            .filter(|check| !required.contains(*check))
            .filter(|check| outcomes.get(**check) == CheckOutcome::Failed)
            .map(|check| check.recommendation().to_string())
            .collect(),
    };

    let passed = blocking.is_empty();
    let errors = if passed {
        Vec::new()
    } else {
        blocking
            .into_iter()
            .chain(recommendations.iter().cloned())
            .collect()
    };

    Decision {
        passed,
        errors,
        recommendations,
    }
}
