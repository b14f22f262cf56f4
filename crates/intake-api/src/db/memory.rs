//! In-memory [`IntakeRepository`].
//!
//! Same semantics as the Postgres adapter. State lives behind one
//! `parking_lot::RwLock` per table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use intake_compliance::ComplianceCheck;
use intake_core::{ApplicationId, Timestamp, UploadId, UserId};

use super::{IntakeRepository, PersistenceError};
use crate::records::{
    ApplicationDraft, ApplicationRecord, ApplicationStatus, BankStatementRecord, UserInput,
    UserRecord,
};

#[derive(Default)]
struct Tables {
    applications: RwLock<HashMap<ApplicationId, ApplicationRecord>>,
    users: RwLock<HashMap<UserId, UserRecord>>,
    bank_statements: RwLock<HashMap<UploadId, BankStatementRecord>>,
    checks: RwLock<Vec<ComplianceCheck>>,
}

/// Process-local repository. Clones share storage.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<Tables>,
}

impl std::fmt::Debug for MemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRepository")
            .field("applications", &self.tables.applications.read().len())
            .field("users", &self.tables.users.read().len())
            .finish()
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored applicants.
    pub fn user_count(&self) -> usize {
        self.tables.users.read().len()
    }

    /// Number of stored bank statements.
    pub fn bank_statement_count(&self) -> usize {
        self.tables.bank_statements.read().len()
    }
}

#[async_trait]
impl IntakeRepository for MemoryRepository {
    async fn create_application(
        &self,
        draft: ApplicationDraft,
    ) -> Result<ApplicationRecord, PersistenceError> {
        let record = ApplicationRecord::create(draft);
        self.tables
            .applications
            .write()
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_application(
        &self,
        id: ApplicationId,
        draft: ApplicationDraft,
    ) -> Result<ApplicationRecord, PersistenceError> {
        let mut apps = self.tables.applications.write();
        let record = apps
            .get_mut(&id)
            .ok_or_else(|| PersistenceError::not_found("application", id))?;
        if record.status == ApplicationStatus::Submitted {
            return Err(PersistenceError::Conflict(format!(
                "application {id} is already submitted"
            )));
        }
        record.apply(draft);
        Ok(record.clone())
    }

    async fn get_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, PersistenceError> {
        Ok(self.tables.applications.read().get(&id).cloned())
    }

    async fn upsert_user(&self, profile: UserInput) -> Result<UserRecord, PersistenceError> {
        let mut users = self.tables.users.write();
        if let Some(existing) = users
            .values_mut()
            .find(|u| u.profile.email.eq_ignore_ascii_case(&profile.email))
        {
            existing.merge(profile);
            return Ok(existing.clone());
        }
        let record = UserRecord::create(profile);
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, PersistenceError> {
        Ok(self.tables.users.read().get(&id).cloned())
    }

    async fn link_user(
        &self,
        user_id: UserId,
        application_id: ApplicationId,
    ) -> Result<(), PersistenceError> {
        let mut apps = self.tables.applications.write();
        let mut users = self.tables.users.write();
        let app = apps
            .get_mut(&application_id)
            .ok_or_else(|| PersistenceError::not_found("application", application_id))?;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| PersistenceError::not_found("user", user_id))?;
        let now = Timestamp::now();
        app.user_id = Some(user_id);
        app.updated_at = now;
        user.application_id = Some(application_id);
        user.updated_at = now;
        Ok(())
    }

    async fn insert_bank_statement(
        &self,
        record: &BankStatementRecord,
    ) -> Result<(), PersistenceError> {
        self.tables
            .bank_statements
            .write()
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn insert_check(&self, check: &ComplianceCheck) -> Result<(), PersistenceError> {
        let mut checks = self.tables.checks.write();
        if checks.iter().any(|c| c.id == check.id) {
            return Err(PersistenceError::Conflict(format!(
                "compliance check {} already exists",
                check.id
            )));
        }
        checks.push(check.clone());
        Ok(())
    }

    async fn update_check(&self, check: &ComplianceCheck) -> Result<(), PersistenceError> {
        let mut checks = self.tables.checks.write();
        let slot = checks
            .iter_mut()
            .find(|c| c.id == check.id)
            .ok_or_else(|| PersistenceError::not_found("compliance check", check.id))?;
        *slot = check.clone();
        Ok(())
    }

    async fn list_checks(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<ComplianceCheck>, PersistenceError> {
        Ok(self
            .tables
            .checks
            .read()
            .iter()
            .filter(|c| c.application_id == application_id)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_compliance::{CheckStatus, CheckType};
    use intake_core::{CheckId, FieldMap, FieldValue};

    fn find_check(repo: &MemoryRepository, id: CheckId) -> Option<ComplianceCheck> {
        repo.tables.checks.read().iter().find(|c| c.id == id).cloned()
    }

    fn draft(loan_type: &str) -> ApplicationDraft {
        let mut fields = FieldMap::new();
        fields.insert("loanType".into(), FieldValue::text(loan_type));
        ApplicationDraft {
            fields,
            current_step_id: Some("business-owner".into()),
            completed_steps: vec!["loan-type".into()],
            submit: false,
        }
    }

    fn profile(email: &str) -> UserInput {
        UserInput {
            email: email.into(),
            ..UserInput::default()
        }
    }

    #[tokio::test]
    async fn create_then_get_application() {
        let repo = MemoryRepository::new();
        let created = repo.create_application(draft("business-loan")).await.unwrap();
        let fetched = repo.get_application(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.status, ApplicationStatus::Draft);
    }

    #[tokio::test]
    async fn submitted_application_rejects_updates() {
        let repo = MemoryRepository::new();
        let created = repo.create_application(draft("a")).await.unwrap();
        repo.update_application(created.id, draft("b").submitted())
            .await
            .unwrap();
        let err = repo
            .update_application(created.id, draft("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict(_)));
        let stored = repo.get_application(created.id).await.unwrap().unwrap();
        assert_eq!(stored.fields["loanType"], FieldValue::text("b"));
    }

    #[tokio::test]
    async fn update_unknown_application_is_not_found() {
        let repo = MemoryRepository::new();
        assert!(matches!(
            repo.update_application(ApplicationId::new(), draft("a")).await,
            Err(PersistenceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn upsert_user_is_idempotent_by_email() {
        let repo = MemoryRepository::new();
        let first = repo.upsert_user(profile("ada@example.com")).await.unwrap();
        let second = repo.upsert_user(profile("ada@example.com")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(repo.user_count(), 1);
    }

    #[tokio::test]
    async fn link_user_sets_both_sides() {
        let repo = MemoryRepository::new();
        let app = repo.create_application(draft("a")).await.unwrap();
        let user = repo.upsert_user(profile("ada@example.com")).await.unwrap();
        repo.link_user(user.id, app.id).await.unwrap();
        assert_eq!(
            repo.get_application(app.id).await.unwrap().unwrap().user_id,
            Some(user.id)
        );
        assert_eq!(
            repo.get_user(user.id).await.unwrap().unwrap().application_id,
            Some(app.id)
        );
    }

    #[tokio::test]
    async fn checks_are_listed_per_application() {
        let repo = MemoryRepository::new();
        let app = ApplicationId::new();
        let mut check = ComplianceCheck::pending(app, CheckType::WebsiteCheck);
        repo.insert_check(&check).await.unwrap();
        repo.insert_check(&ComplianceCheck::pending(
            ApplicationId::new(),
            CheckType::WebsiteCheck,
        ))
        .await
        .unwrap();

        check.fail("unreachable").unwrap();
        repo.update_check(&check).await.unwrap();

        let listed = repo.list_checks(app).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, CheckStatus::Failed);
        assert!(find_check(&repo, check.id).is_some());
        assert!(matches!(
            repo.insert_check(&check).await,
            Err(PersistenceError::Conflict(_))
        ));
    }
}
