use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::codes::ExistingCodes;
use super::domain::{ActorKind, ActorRecord, DriverRecord, IdentityCode, MigrationRecord, RiderRecord};
use super::ports::{ActorRepository, RepositoryError};

#[derive(Debug, Default)]
struct Tables {
    drivers: BTreeMap<IdentityCode, DriverRecord>,
    riders: BTreeMap<IdentityCode, RiderRecord>,
    released: BTreeSet<IdentityCode>,
    migrations: Vec<MigrationRecord>,
}

/// Process-local repository for the CLI and tests.
///
/// Releasing a code removes the record that held it, which is what lets gap-fill hand
/// the number out again.
#[derive(Debug, Default)]
pub struct InMemoryActorRepository {
    tables: Mutex<Tables>,
}

impl InMemoryActorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository lock poisoned".to_string()))
    }

    pub fn drivers(&self) -> Vec<DriverRecord> {
        self.lock()
            .map(|tables| tables.drivers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn riders(&self) -> Vec<RiderRecord> {
        self.lock()
            .map(|tables| tables.riders.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn rider(&self, code: &IdentityCode) -> Option<RiderRecord> {
        self.lock()
            .ok()
            .and_then(|tables| tables.riders.get(code).cloned())
    }

    pub fn migrations(&self) -> Vec<MigrationRecord> {
        self.lock()
            .map(|tables| tables.migrations.clone())
            .unwrap_or_default()
    }

    pub fn released_codes(&self) -> Vec<IdentityCode> {
        self.lock()
            .map(|tables| tables.released.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActorRepository for InMemoryActorRepository {
    async fn list_existing_codes(&self, kind: ActorKind) -> Result<ExistingCodes, RepositoryError> {
        let tables = self.lock()?;
        let codes = match kind {
            ActorKind::Driver => tables.drivers.keys().map(ToString::to_string).collect(),
            ActorKind::Rider => tables.riders.keys().map(ToString::to_string).collect(),
        };
        Ok(codes)
    }

    async fn existing_emails(&self, kind: ActorKind) -> Result<Vec<String>, RepositoryError> {
        let tables = self.lock()?;
        let emails = match kind {
            ActorKind::Driver => tables
                .drivers
                .values()
                .filter_map(|driver| driver.contact.email.clone())
                .collect(),
            ActorKind::Rider => tables
                .riders
                .values()
                .filter_map(|rider| rider.contact.email.clone())
                .collect(),
        };
        Ok(emails)
    }

    async fn persist_actor(&self, record: &ActorRecord) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        match record {
            ActorRecord::Driver(driver) => {
                tables.released.remove(&driver.code);
                tables.drivers.insert(driver.code, driver.clone());
            }
            ActorRecord::Rider(rider) => {
                tables.released.remove(&rider.code);
                tables.riders.insert(rider.code, rider.clone());
            }
        }
        Ok(())
    }

    async fn fetch_driver(&self, code: &IdentityCode) -> Result<Option<DriverRecord>, RepositoryError> {
        Ok(self.lock()?.drivers.get(code).cloned())
    }

    async fn release_code(&self, code: &IdentityCode) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        let removed = match code.kind() {
            ActorKind::Driver => tables.drivers.remove(code).is_some(),
            ActorKind::Rider => tables.riders.remove(code).is_some(),
        };
        if !removed {
            return Err(RepositoryError::NotFound);
        }
        tables.released.insert(*code);
        Ok(())
    }

    async fn record_migration(&self, record: &MigrationRecord) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        tables.migrations.push(record.clone());
        Ok(())
    }
}
