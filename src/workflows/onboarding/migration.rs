use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::codes::CodeAllocator;
use super::domain::{
    ActorKind, ActorRecord, AddressDetails, ContactDetails, DriverRecord, DriverStatus,
    IdentityCode, IdentityDetails, MigrationRecord, RegistrationOrigin, RiderBasics, RiderRecord,
    RiderStatus,
};
use super::error::OnboardingError;
use super::ports::ActorRepository;
use super::response::WorkflowResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationOutcome {
    pub rider: RiderRecord,
    pub migration: MigrationRecord,
}

/// Turns a rejected driver into an approved rider.
///
/// The workflow keeps no state between calls. Running it twice for the same driver is
/// prevented only by the repository: once the driver code is released the second call
/// finds no driver and fails. Callers that may race must serialize migrations per
/// driver code.
///
/// Writes happen in order: rider, driver code release, migration record. If the release
/// fails the new rider is released again, so a retry starts from a clean slate. If only
/// the migration record fails, the rider and the release stand and the response says so.
pub struct MigrationWorkflow<R> {
    repository: Arc<R>,
    allocator: CodeAllocator,
}

impl<R> MigrationWorkflow<R>
where
    R: ActorRepository + 'static,
{
    pub fn new(repository: Arc<R>, allocator: CodeAllocator) -> Self {
        Self {
            repository,
            allocator,
        }
    }

    pub async fn migrate(
        &self,
        driver_code: &IdentityCode,
        basics: RiderBasics,
    ) -> Result<WorkflowResponse<MigrationOutcome>, OnboardingError> {
        if driver_code.kind() != ActorKind::Driver {
            return Err(OnboardingError::WrongActorKind(*driver_code));
        }

        let Some(driver) = self.repository.fetch_driver(driver_code).await? else {
            warn!(code = %driver_code, "migration requested for unknown driver");
            return Ok(WorkflowResponse::failure(vec![format!(
                "driver {driver_code} does not exist"
            )]));
        };
        if driver.status != DriverStatus::Rejected {
            warn!(code = %driver_code, status = %driver.status, "driver is not rejected");
            return Ok(WorkflowResponse::failure(vec![format!(
                "driver {driver_code} is {} and cannot be migrated; only rejected drivers can",
                driver.status
            )]));
        }

        let existing = self
            .repository
            .list_existing_codes(ActorKind::Rider)
            .await?;
        let rider_code = match self.allocator.allocate(ActorKind::Rider, &existing) {
            Ok(code) => code,
            Err(exhausted) => {
                warn!(driver = %driver_code, error = %exhausted, "migration refused");
                return Ok(WorkflowResponse::failure(vec![exhausted.to_string()]));
            }
        };
        let migrated_at = Utc::now();

        let rider = rider_from_driver(rider_code, &driver, basics, migrated_at);
        self.repository
            .persist_actor(&ActorRecord::Rider(rider.clone()))
            .await?;

        if let Err(err) = self.repository.release_code(driver_code).await {
            self.discard_rider(rider_code).await;
            return Err(err.into());
        }

        let migration = MigrationRecord {
            released_driver_code: *driver_code,
            rider_code,
            rejection_reason: driver.rejection_reason().map(str::to_string),
            migrated_at,
        };
        if let Err(err) = self.repository.record_migration(&migration).await {
            warn!(driver = %driver_code, rider = %rider_code, error = %err, "migration record not written");
            return Ok(WorkflowResponse::failure(vec![format!(
                "rider {rider_code} was created and driver {driver_code} released, \
                 but the migration record could not be written: {err}"
            )])
            .with_message("Migration completed without its audit record."));
        }

        info!(driver = %driver_code, rider = %rider_code, "driver migrated to rider");
        let message = format!(
            "Driver {driver_code} was migrated to rider {rider_code}. Welcome, {}.",
            rider.display_name()
        );
        Ok(WorkflowResponse::success(MigrationOutcome { rider, migration }).with_message(message))
    }

    async fn discard_rider(&self, rider_code: IdentityCode) {
        if let Err(err) = self.repository.release_code(&rider_code).await {
            error!(rider = %rider_code, error = %err, "could not roll back migrated rider");
        }
    }
}

/// Fields supplied for the new rider win; anything left blank is carried over.
fn rider_from_driver(
    code: IdentityCode,
    driver: &DriverRecord,
    basics: RiderBasics,
    registered_at: chrono::DateTime<Utc>,
) -> RiderRecord {
    let RiderBasics {
        contact,
        identity,
        address,
    } = basics;

    let (phone, phone_verified) = match contact.phone {
        Some(phone) => (Some(phone), contact.phone_verified),
        None => (driver.contact.phone.clone(), driver.contact.phone_verified),
    };
    let (email, email_verified) = match contact.email {
        Some(email) => (Some(email), contact.email_verified),
        None => (driver.contact.email.clone(), driver.contact.email_verified),
    };
    let contact = ContactDetails {
        phone,
        phone_verified,
        email,
        email_verified,
    };
    let identity = IdentityDetails {
        national_id: identity
            .national_id
            .or_else(|| driver.identity.national_id.clone()),
        first_name: identity
            .first_name
            .or_else(|| driver.identity.first_name.clone()),
        last_name: identity
            .last_name
            .or_else(|| driver.identity.last_name.clone()),
    };
    let address = if address == AddressDetails::default() {
        driver.address.clone()
    } else {
        address
    };

    RiderRecord {
        code,
        contact,
        identity,
        address,
        documents: driver.documents.clone(),
        status: RiderStatus::Approved,
        origin: RegistrationOrigin::DriverMigration,
        registered_at,
        migrated_from_driver: true,
        previous_driver_code: Some(driver.code),
        verification: driver.verification.clone(),
    }
}
