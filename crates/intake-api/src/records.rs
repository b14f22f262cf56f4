//! # Persisted Records
//!
//! The shapes the persistence layer stores and the API returns.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use intake_core::{ApplicationId, FieldMap, FieldValue, Timestamp, UploadId, UserId};
use intake_state::ApplicationFormState;

use crate::db::columns::flag_value;

// ─── Applications ────────────────────────────────────────────────────

/// Lifecycle of a persisted application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    /// Terminal. The record no longer accepts updates.
    Submitted,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            _ => None,
        }
    }
}

/// A loan application as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: ApplicationId,
    pub status: ApplicationStatus,
    #[schema(value_type = Object)]
    pub fields: FieldMap,
    pub current_step_id: Option<String>,
    pub completed_steps: Vec<String>,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub user_id: Option<UserId>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub submitted_at: Option<Timestamp>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: Timestamp,
}

/// What a create or update writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationDraft {
    pub fields: FieldMap,
    pub current_step_id: Option<String>,
    pub completed_steps: Vec<String>,
    /// Submit with this write. Irreversible.
    pub submit: bool,
}

impl ApplicationDraft {
    /// The draft for a wizard state.
    pub fn from_form(state: &ApplicationFormState) -> Self {
        Self {
            fields: state.fields.clone(),
            current_step_id: Some(state.current_step_id.clone()),
            completed_steps: state.completed_steps.iter().cloned().collect(),
            submit: false,
        }
    }

    pub fn submitted(mut self) -> Self {
        self.submit = true;
        self
    }
}

impl ApplicationRecord {
    /// A new record for `draft`.
    pub fn create(draft: ApplicationDraft) -> Self {
        let now = Timestamp::now();
        Self {
            id: ApplicationId::new(),
            status: if draft.submit {
                ApplicationStatus::Submitted
            } else {
                ApplicationStatus::Draft
            },
            fields: draft.fields,
            current_step_id: draft.current_step_id,
            completed_steps: draft.completed_steps,
            user_id: None,
            submitted_at: draft.submit.then_some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply `draft`. Fields merge over existing ones; navigation is
    /// replaced when given.
    pub fn apply(&mut self, draft: ApplicationDraft) {
        let now = Timestamp::now();
        self.fields.extend(draft.fields);
        if draft.current_step_id.is_some() {
            self.current_step_id = draft.current_step_id;
            self.completed_steps = draft.completed_steps;
        }
        if draft.submit {
            self.status = ApplicationStatus::Submitted;
            self.submitted_at = Some(now);
        }
        self.updated_at = now;
    }
}

// ─── Users ───────────────────────────────────────────────────────────

/// The applicant's identity and consent, as collected by the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Natural key. Trimmed and lowercased.
    pub email: String,
    pub phone: Option<String>,
    pub home_address: Option<String>,
    pub home_unit: Option<String>,
    pub home_city: Option<String>,
    pub home_state: Option<String>,
    pub home_zip: Option<String>,
    pub consent_to_terms: Option<bool>,
    pub consent_to_credit_check: Option<bool>,
    pub consent_to_marketing: Option<bool>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub referrer: Option<String>,
}

/// `email` was absent or not an address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("a valid email is required to save the applicant")]
pub struct InvalidEmail;

/// Trim and lowercase an email; `None` unless it looks like `a@b.c`.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    let valid = !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace);
    valid.then_some(email)
}

impl UserInput {
    /// Pull the user's fields out of a form.
    pub fn from_fields(fields: &FieldMap) -> Result<Self, InvalidEmail> {
        let text = |name: &str| {
            fields
                .get(name)
                .filter(|v| !v.is_empty())
                .map(FieldValue::to_storage_string)
                .map(|s| s.trim().to_string())
        };
        let flag = |name: &str| fields.get(name).and_then(flag_value);
        let email = text("email")
            .as_deref()
            .and_then(normalize_email)
            .ok_or(InvalidEmail)?;

        Ok(Self {
            first_name: text("firstName"),
            last_name: text("lastName"),
            email,
            phone: text("phone"),
            home_address: text("homeAddress"),
            home_unit: text("homeUnit"),
            home_city: text("homeCity"),
            home_state: text("homeState"),
            home_zip: text("homeZip"),
            consent_to_terms: flag("consentToTerms"),
            consent_to_credit_check: flag("consentToCreditCheck"),
            consent_to_marketing: flag("consentToMarketing"),
            utm_source: text("utmSource"),
            utm_medium: text("utmMedium"),
            utm_campaign: text("utmCampaign"),
            referrer: text("referrer"),
        })
    }
}

/// A stored applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: UserId,
    #[serde(flatten)]
    pub profile: UserInput,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub application_id: Option<ApplicationId>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: Timestamp,
}

impl UserRecord {
    pub fn create(profile: UserInput) -> Self {
        let now = Timestamp::now();
        Self {
            id: UserId::new(),
            profile,
            application_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the profile with every value `profile` provides. Values it
    /// leaves out are kept.
    pub fn merge(&mut self, profile: UserInput) {
        fn keep<T>(slot: &mut Option<T>, new: Option<T>) {
            if new.is_some() {
                *slot = new;
            }
        }
        let p = &mut self.profile;
        keep(&mut p.first_name, profile.first_name);
        keep(&mut p.last_name, profile.last_name);
        keep(&mut p.phone, profile.phone);
        keep(&mut p.home_address, profile.home_address);
        keep(&mut p.home_unit, profile.home_unit);
        keep(&mut p.home_city, profile.home_city);
        keep(&mut p.home_state, profile.home_state);
        keep(&mut p.home_zip, profile.home_zip);
        keep(&mut p.consent_to_terms, profile.consent_to_terms);
        keep(&mut p.consent_to_credit_check, profile.consent_to_credit_check);
        keep(&mut p.consent_to_marketing, profile.consent_to_marketing);
        keep(&mut p.utm_source, profile.utm_source);
        keep(&mut p.utm_medium, profile.utm_medium);
        keep(&mut p.utm_campaign, profile.utm_campaign);
        keep(&mut p.referrer, profile.referrer);
        self.updated_at = Timestamp::now();
    }
}

// ─── Bank statements ─────────────────────────────────────────────────

/// An uploaded bank statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BankStatementRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: UploadId,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub application_id: Option<ApplicationId>,
    pub file_name: String,
    pub file_url: String,
    pub file_size: u64,
    pub mime_type: String,
    /// Hex SHA-256 of the content; also the storage key stem.
    pub sha256: String,
    #[schema(value_type = String, format = DateTime)]
    pub uploaded_at: Timestamp,
}
