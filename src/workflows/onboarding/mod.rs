//! Rider and driver onboarding: identity codes, verification checks, and the
//! registration, inspection and migration workflows built on them.

pub mod codes;
pub mod domain;
pub mod driver;
pub mod error;
pub mod memory;
pub mod migration;
pub mod ports;
pub mod response;
pub mod rider;
pub mod tokens;
pub mod verification;

#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use codes::{
    CodeAllocator, CodeStatistics, CodesExhausted, ExistingCodes, NumberingPolicy, Reservation,
};
pub use domain::{
    ActorKind, ActorRecord, AddressDetails, ContactDetails, DocumentSet, DriverApplication,
    DriverCredentials, DriverRecord, DriverStatus, IdentityCode, IdentityDetails,
    InspectionRecord, InspectionVerdict, MigrationRecord, RegistrationOrigin, RiderApplication,
    RiderBasics, RiderRecord, RiderStatus, VerificationInputs, VerificationSummary,
};
pub use driver::DriverOnboardingWorkflow;
pub use error::{IntakeError, OnboardingError};
pub use memory::InMemoryActorRepository;
pub use migration::{MigrationOutcome, MigrationWorkflow};
pub use ports::{ActorRepository, CheckProviders, ProviderError, RepositoryError, UnavailableProviders};
pub use response::WorkflowResponse;
pub use rider::{CodeRecovery, RiderOnboardingWorkflow, RiderRegistration};
pub use verification::{
    CheckName, CheckOutcome, CheckOutcomeSet, CheckPlan, Decision, VerificationAggregator,
    VerificationConfig,
};

/// The three workflows wired to one repository, one provider bundle and one allocator.
pub struct OnboardingEngine<R> {
    repository: Arc<R>,
    allocator: CodeAllocator,
    drivers: Arc<DriverOnboardingWorkflow<R>>,
    riders: Arc<RiderOnboardingWorkflow<R>>,
    migrations: Arc<MigrationWorkflow<R>>,
}

impl<R> OnboardingEngine<R>
where
    R: ActorRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        providers: CheckProviders,
        numbering: NumberingPolicy,
        verification: VerificationConfig,
    ) -> Self {
        let allocator = CodeAllocator::new(numbering);
        let verifier = Arc::new(VerificationAggregator::new(providers, verification));

        Self {
            drivers: Arc::new(DriverOnboardingWorkflow::new(
                repository.clone(),
                verifier.clone(),
                allocator,
            )),
            riders: Arc::new(RiderOnboardingWorkflow::new(
                repository.clone(),
                verifier,
                allocator,
            )),
            migrations: Arc::new(MigrationWorkflow::new(repository.clone(), allocator)),
            repository,
            allocator,
        }
    }

    pub fn repository(&self) -> Arc<R> {
        self.repository.clone()
    }

    pub fn drivers(&self) -> Arc<DriverOnboardingWorkflow<R>> {
        self.drivers.clone()
    }

    pub fn riders(&self) -> Arc<RiderOnboardingWorkflow<R>> {
        self.riders.clone()
    }

    pub fn migrations(&self) -> Arc<MigrationWorkflow<R>> {
        self.migrations.clone()
    }

    /// Code the next registration of `kind` would receive.
    pub async fn next_code(&self, kind: ActorKind) -> Result<IdentityCode, OnboardingError> {
        let existing = self.repository.list_existing_codes(kind).await?;
        Ok(self.allocator.allocate(kind, &existing)?)
    }

    pub async fn code_statistics(&self) -> Result<CodeStatistics, OnboardingError> {
        let mut existing = self.repository.list_existing_codes(ActorKind::Rider).await?;
        existing.extend(self.repository.list_existing_codes(ActorKind::Driver).await?);
        Ok(self.allocator.statistics(&existing))
    }
}
