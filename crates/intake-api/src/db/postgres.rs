//! PostgreSQL [`IntakeRepository`].
//!
//! Runtime-checked queries (`sqlx::query`, `query_as`) so the crate builds
//! without a live database. The applications statement text is generated
//! once from [`APPLICATION_COLUMNS`]; values are always bound.

use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

use intake_compliance::{CheckStatus, CheckType, ComplianceCheck};
use intake_core::{ApplicationId, CheckId, FieldMap, Timestamp, UserId};

use super::columns::{column_value, extra_fields, field_value, ColumnKind, ColumnValue, APPLICATION_COLUMNS};
use super::{IntakeRepository, PersistenceError};
use crate::records::{
    ApplicationDraft, ApplicationRecord, ApplicationStatus, BankStatementRecord, UserInput,
    UserRecord,
};

/// Repository over a connection pool.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn serialization(e: serde_json::Error) -> PersistenceError {
    PersistenceError::Serialization(e.to_string())
}

// ─── Applications ────────────────────────────────────────────────────

const TRAILING_COLUMNS: &[&str] = &[
    "extra_fields",
    "current_step_id",
    "completed_steps",
    "user_id",
    "submitted_at",
    "created_at",
    "updated_at",
];

/// `id, status, <mapped columns…>, <trailing columns…>`: the bind order.
fn application_columns() -> &'static [&'static str] {
    static COLUMNS: OnceLock<Vec<&'static str>> = OnceLock::new();
    COLUMNS.get_or_init(|| {
        ["id", "status"]
            .into_iter()
            .chain(APPLICATION_COLUMNS.iter().map(|c| c.column))
            .chain(TRAILING_COLUMNS.iter().copied())
            .collect()
    })
}

fn insert_application_sql() -> &'static str {
    static SQL: OnceLock<String> = OnceLock::new();
    SQL.get_or_init(|| {
        let columns = application_columns();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
        format!(
            "INSERT INTO applications ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        )
    })
}

fn update_application_sql() -> &'static str {
    static SQL: OnceLock<String> = OnceLock::new();
    SQL.get_or_init(|| {
        let assignments: Vec<String> = application_columns()
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, c)| format!("{c} = ${}", i + 1))
            .collect();
        format!(
            "UPDATE applications SET {} WHERE id = $1",
            assignments.join(", ")
        )
    })
}

fn bind_application<'q>(
    query: Query<'q, Postgres, PgArguments>,
    record: &ApplicationRecord,
) -> Result<Query<'q, Postgres, PgArguments>, PersistenceError> {
    let mut query = query
        .bind(*record.id.as_uuid())
        .bind(record.status.as_str());
    for column in APPLICATION_COLUMNS {
        query = match column_value(column, &record.fields) {
            ColumnValue::Text(v) => query.bind(v),
            ColumnValue::Flag(v) => query.bind(v),
        };
    }
    let extra = serde_json::to_value(extra_fields(&record.fields)).map_err(serialization)?;
    let completed = serde_json::to_value(&record.completed_steps).map_err(serialization)?;
    Ok(query
        .bind(extra)
        .bind(record.current_step_id.clone())
        .bind(completed)
        .bind(record.user_id.map(|u| *u.as_uuid()))
        .bind(record.submitted_at.map(Timestamp::into_datetime))
        .bind(record.created_at.into_datetime())
        .bind(record.updated_at.into_datetime()))
}

fn application_from_row(row: &PgRow) -> Result<ApplicationRecord, PersistenceError> {
    let status: String = row.try_get("status")?;
    let status = ApplicationStatus::parse(&status).ok_or_else(|| {
        PersistenceError::Serialization(format!("unknown application status {status:?}"))
    })?;

    let mut fields = FieldMap::new();
    for column in APPLICATION_COLUMNS {
        let stored = match column.kind {
            ColumnKind::Text => ColumnValue::Text(row.try_get(column.column)?),
            ColumnKind::Flag => ColumnValue::Flag(row.try_get(column.column)?),
        };
        if let Some(value) = field_value(column, stored) {
            fields.insert(column.field.to_string(), value);
        }
    }
    let extra: serde_json::Value = row.try_get("extra_fields")?;
    let extra: FieldMap = serde_json::from_value(extra).map_err(serialization)?;
    fields.extend(extra);

    let completed: serde_json::Value = row.try_get("completed_steps")?;
    let id: Uuid = row.try_get("id")?;
    let user_id: Option<Uuid> = row.try_get("user_id")?;
    let submitted_at: Option<DateTime<Utc>> = row.try_get("submitted_at")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(ApplicationRecord {
        id: ApplicationId::from_uuid(id),
        status,
        fields,
        current_step_id: row.try_get("current_step_id")?,
        completed_steps: serde_json::from_value(completed).map_err(serialization)?,
        user_id: user_id.map(UserId::from_uuid),
        submitted_at: submitted_at.map(Timestamp::from_utc),
        created_at: Timestamp::from_utc(created_at),
        updated_at: Timestamp::from_utc(updated_at),
    })
}

// ─── Users ───────────────────────────────────────────────────────────

const USER_COLUMNS: &str = "id, email, first_name, last_name, phone, home_address, home_unit, \
     home_city, home_state, home_zip, consent_to_terms, consent_to_credit_check, \
     consent_to_marketing, utm_source, utm_medium, utm_campaign, referrer, application_id, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    home_address: Option<String>,
    home_unit: Option<String>,
    home_city: Option<String>,
    home_state: Option<String>,
    home_zip: Option<String>,
    consent_to_terms: Option<bool>,
    consent_to_credit_check: Option<bool>,
    consent_to_marketing: Option<bool>,
    utm_source: Option<String>,
    utm_medium: Option<String>,
    utm_campaign: Option<String>,
    referrer: Option<String>,
    application_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_record(self) -> UserRecord {
        UserRecord {
            id: UserId::from_uuid(self.id),
            profile: UserInput {
                first_name: self.first_name,
                last_name: self.last_name,
                email: self.email,
                phone: self.phone,
                home_address: self.home_address,
                home_unit: self.home_unit,
                home_city: self.home_city,
                home_state: self.home_state,
                home_zip: self.home_zip,
                consent_to_terms: self.consent_to_terms,
                consent_to_credit_check: self.consent_to_credit_check,
                consent_to_marketing: self.consent_to_marketing,
                utm_source: self.utm_source,
                utm_medium: self.utm_medium,
                utm_campaign: self.utm_campaign,
                referrer: self.referrer,
            },
            application_id: self.application_id.map(ApplicationId::from_uuid),
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
        }
    }
}

// ─── Compliance checks ───────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct CheckRow {
    id: Uuid,
    application_id: Uuid,
    check_type: String,
    status: String,
    risk_score: Option<f64>,
    result_payload: Option<serde_json::Value>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CheckRow {
    fn into_record(self) -> Result<ComplianceCheck, PersistenceError> {
        let check_type = CheckType::parse(&self.check_type).ok_or_else(|| {
            PersistenceError::Serialization(format!("unknown check type {:?}", self.check_type))
        })?;
        let status = CheckStatus::parse(&self.status).ok_or_else(|| {
            PersistenceError::Serialization(format!("unknown check status {:?}", self.status))
        })?;
        Ok(ComplianceCheck {
            id: CheckId::from_uuid(self.id),
            application_id: ApplicationId::from_uuid(self.application_id),
            check_type,
            status,
            risk_score: self.risk_score,
            result_payload: self.result_payload,
            error_message: self.error_message,
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
        })
    }
}

// ─── Repository ──────────────────────────────────────────────────────

#[async_trait]
impl IntakeRepository for PgRepository {
    async fn create_application(
        &self,
        draft: ApplicationDraft,
    ) -> Result<ApplicationRecord, PersistenceError> {
        let record = ApplicationRecord::create(draft);
        bind_application(sqlx::query(insert_application_sql()), &record)?
            .execute(&self.pool)
            .await?;
        Ok(record)
    }

    async fn update_application(
        &self,
        id: ApplicationId,
        draft: ApplicationDraft,
    ) -> Result<ApplicationRecord, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT * FROM applications WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| PersistenceError::not_found("application", id))?;
        let mut record = application_from_row(&row)?;
        if record.status == ApplicationStatus::Submitted {
            return Err(PersistenceError::Conflict(format!(
                "application {id} is already submitted"
            )));
        }
        record.apply(draft);
        bind_application(sqlx::query(update_application_sql()), &record)?
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn get_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, PersistenceError> {
        let row = sqlx::query("SELECT * FROM applications WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(application_from_row).transpose()
    }

    async fn upsert_user(&self, profile: UserInput) -> Result<UserRecord, PersistenceError> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO users (id, email, first_name, last_name, phone, home_address, home_unit,
                 home_city, home_state, home_zip, consent_to_terms, consent_to_credit_check,
                 consent_to_marketing, utm_source, utm_medium, utm_campaign, referrer,
                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $18)
             ON CONFLICT (email) DO UPDATE SET
                 first_name = COALESCE(EXCLUDED.first_name, users.first_name),
                 last_name = COALESCE(EXCLUDED.last_name, users.last_name),
                 phone = COALESCE(EXCLUDED.phone, users.phone),
                 home_address = COALESCE(EXCLUDED.home_address, users.home_address),
                 home_unit = COALESCE(EXCLUDED.home_unit, users.home_unit),
                 home_city = COALESCE(EXCLUDED.home_city, users.home_city),
                 home_state = COALESCE(EXCLUDED.home_state, users.home_state),
                 home_zip = COALESCE(EXCLUDED.home_zip, users.home_zip),
                 consent_to_terms = COALESCE(EXCLUDED.consent_to_terms, users.consent_to_terms),
                 consent_to_credit_check = COALESCE(EXCLUDED.consent_to_credit_check, users.consent_to_credit_check),
                 consent_to_marketing = COALESCE(EXCLUDED.consent_to_marketing, users.consent_to_marketing),
                 utm_source = COALESCE(EXCLUDED.utm_source, users.utm_source),
                 utm_medium = COALESCE(EXCLUDED.utm_medium, users.utm_medium),
                 utm_campaign = COALESCE(EXCLUDED.utm_campaign, users.utm_campaign),
                 referrer = COALESCE(EXCLUDED.referrer, users.referrer),
                 updated_at = EXCLUDED.updated_at
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(profile.email.trim().to_lowercase())
            .bind(profile.first_name)
            .bind(profile.last_name)
            .bind(profile.phone)
            .bind(profile.home_address)
            .bind(profile.home_unit)
            .bind(profile.home_city)
            .bind(profile.home_state)
            .bind(profile.home_zip)
            .bind(profile.consent_to_terms)
            .bind(profile.consent_to_credit_check)
            .bind(profile.consent_to_marketing)
            .bind(profile.utm_source)
            .bind(profile.utm_medium)
            .bind(profile.utm_campaign)
            .bind(profile.referrer)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into_record())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, PersistenceError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRow::into_record))
    }

    async fn link_user(
        &self,
        user_id: UserId,
        application_id: ApplicationId,
    ) -> Result<(), PersistenceError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let updated =
            sqlx::query("UPDATE applications SET user_id = $1, updated_at = $3 WHERE id = $2")
                .bind(*user_id.as_uuid())
                .bind(*application_id.as_uuid())
                .bind(now)
                .execute(&mut *tx)
                .await?;
        if updated.rows_affected() == 0 {
            return Err(PersistenceError::not_found("application", application_id));
        }
        let updated =
            sqlx::query("UPDATE users SET application_id = $2, updated_at = $3 WHERE id = $1")
                .bind(*user_id.as_uuid())
                .bind(*application_id.as_uuid())
                .bind(now)
                .execute(&mut *tx)
                .await?;
        if updated.rows_affected() == 0 {
            return Err(PersistenceError::not_found("user", user_id));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_bank_statement(
        &self,
        record: &BankStatementRecord,
    ) -> Result<(), PersistenceError> {
        let size = i64::try_from(record.file_size).map_err(|_| {
            PersistenceError::Serialization(format!("file size {} overflows", record.file_size))
        })?;
        sqlx::query(
            "INSERT INTO bank_statements
                 (id, application_id, file_name, file_url, file_size, mime_type, sha256, uploaded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(*record.id.as_uuid())
        .bind(record.application_id.map(|a| *a.as_uuid()))
        .bind(&record.file_name)
        .bind(&record.file_url)
        .bind(size)
        .bind(&record.mime_type)
        .bind(&record.sha256)
        .bind(record.uploaded_at.into_datetime())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_check(&self, check: &ComplianceCheck) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO compliance_checks
                 (id, application_id, check_type, status, risk_score, result_payload,
                  error_message, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(*check.id.as_uuid())
        .bind(*check.application_id.as_uuid())
        .bind(check.check_type.as_str())
        .bind(check.status.as_str())
        .bind(check.risk_score)
        .bind(&check.result_payload)
        .bind(&check.error_message)
        .bind(check.created_at.into_datetime())
        .bind(check.updated_at.into_datetime())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_check(&self, check: &ComplianceCheck) -> Result<(), PersistenceError> {
        let result = sqlx::query(
            "UPDATE compliance_checks
             SET status = $2, risk_score = $3, result_payload = $4, error_message = $5,
                 updated_at = $6
             WHERE id = $1",
        )
        .bind(*check.id.as_uuid())
        .bind(check.status.as_str())
        .bind(check.risk_score)
        .bind(&check.result_payload)
        .bind(&check.error_message)
        .bind(check.updated_at.into_datetime())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("compliance check", check.id));
        }
        Ok(())
    }

    async fn list_checks(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<ComplianceCheck>, PersistenceError> {
        let rows = sqlx::query_as::<_, CheckRow>(
            "SELECT id, application_id, check_type, status, risk_score, result_payload,
                    error_message, created_at, updated_at
             FROM compliance_checks WHERE application_id = $1 ORDER BY created_at",
        )
        .bind(*application_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CheckRow::into_record).collect()
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
