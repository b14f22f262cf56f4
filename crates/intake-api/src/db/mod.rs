//! # Persistence Adapter
//!
//! [`IntakeRepository`] is the relational backend seam. Two implementations:
//!
//! - [`memory::MemoryRepository`]: development and tests.
//! - [`postgres::PgRepository`]: SQLx over PostgreSQL with embedded
//!   migrations.
//!
//! The database is **optional**. When `DATABASE_URL` is set the service
//! persists to PostgreSQL; when absent it runs in-memory only and records do
//! not survive restarts.

pub mod columns;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;

use intake_compliance::{CheckStore, CheckStoreError, ComplianceCheck};
use intake_core::{ApplicationId, UserId};

use crate::records::{
    ApplicationDraft, ApplicationRecord, BankStatementRecord, UserInput, UserRecord,
};

/// Errors from the persistence layer.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// No record with this id.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The write conflicts with the record's state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PersistenceError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Storage for applications, applicants, uploads, and compliance checks.
#[async_trait]
pub trait IntakeRepository: Send + Sync {
    /// Insert a new application.
    async fn create_application(
        &self,
        draft: ApplicationDraft,
    ) -> Result<ApplicationRecord, PersistenceError>;

    /// Update a draft application. Submitted applications are a conflict.
    async fn update_application(
        &self,
        id: ApplicationId,
        draft: ApplicationDraft,
    ) -> Result<ApplicationRecord, PersistenceError>;

    async fn get_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, PersistenceError>;

    /// Insert or update an applicant keyed by normalized email.
    async fn upsert_user(&self, profile: UserInput) -> Result<UserRecord, PersistenceError>;

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, PersistenceError>;

    /// Link an applicant to an application, both ways.
    async fn link_user(
        &self,
        user_id: UserId,
        application_id: ApplicationId,
    ) -> Result<(), PersistenceError>;

    async fn insert_bank_statement(
        &self,
        record: &BankStatementRecord,
    ) -> Result<(), PersistenceError>;

    async fn insert_check(&self, check: &ComplianceCheck) -> Result<(), PersistenceError>;

    async fn update_check(&self, check: &ComplianceCheck) -> Result<(), PersistenceError>;

    /// Checks for an application, oldest first.
    async fn list_checks(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<ComplianceCheck>, PersistenceError>;

    /// Whether the backend is reachable.
    async fn ping(&self) -> Result<(), PersistenceError>;
}

/// Exposes a repository's check operations to the website check service.
#[derive(Clone)]
pub struct RepositoryChecks(pub Arc<dyn IntakeRepository>);

#[async_trait]
impl CheckStore for RepositoryChecks {
    async fn insert_check(&self, check: &ComplianceCheck) -> Result<(), CheckStoreError> {
        self.0
            .insert_check(check)
            .await
            .map_err(|e| CheckStoreError(e.to_string()))
    }

    async fn update_check(&self, check: &ComplianceCheck) -> Result<(), CheckStoreError> {
        self.0
            .update_check(check)
            .await
            .map_err(|e| CheckStoreError(e.to_string()))
    }
}

/// Connect and run migrations. `None` when no URL is configured.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let url = match database_url {
        Some(url) => url,
        None => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only mode. \
                 Applications will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
