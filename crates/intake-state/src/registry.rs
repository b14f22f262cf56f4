//! # Step Registry
//!
//! The fixed, ordered list of form steps. Each [`StepDefinition`] names the
//! fields the step collects; the required ones gate progression. The
//! registry is immutable once built and shared behind an `Arc`.
//!
//! ## Built-in Steps
//!
//! ```text
//!  1 loan-type             8 business-website
//!  2 business-owner        9 monthly-revenue
//!  3 funding-amount       10 credit-score
//!  4 funding-timeline     11 personal-information
//!  5 business-name        12 home-address
//!  6 business-address     13 bank-statements
//!  7 business-details     14 review-submit (terminal)
//! ```
//!
//! ## File Format
//!
//! [`StepRegistry::from_yaml`] accepts the same shape the built-in table
//! serializes to:
//!
//! ```yaml
//! ambientFields: [utmSource, referrer]
//! steps:
//!   - id: loan-type
//!     order: 1
//!     title: Loan type
//!     requiredFields: [loanType]
//!   - id: review-submit
//!     order: 2
//!     title: Review and submit
//!     requiredFields: [consentToTerms]
//!     isTerminal: true
//! ```

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Step Definition ─────────────────────────────────────────────────

/// One step of the intake form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    /// Stable step id, used in URLs and persisted navigation state.
    pub id: String,
    /// Position in the wizard. Unique; need not be contiguous.
    pub order: u32,
    /// Human-readable heading.
    #[serde(default)]
    pub title: String,
    /// Fields that must be present and non-empty to leave this step forward.
    pub required_fields: BTreeSet<String>,
    /// Fields the step may collect without gating progression.
    #[serde(default)]
    pub optional_fields: BTreeSet<String>,
    /// Whether this is the final step.
    #[serde(default)]
    pub is_terminal: bool,
}

impl StepDefinition {
    fn new(id: &str, order: u32, title: &str, required: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            order,
            title: title.to_string(),
            required_fields: required.iter().map(|f| f.to_string()).collect(),
            optional_fields: BTreeSet::new(),
            is_terminal: false,
        }
    }

    fn optional(mut self, fields: &[&str]) -> Self {
        self.optional_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    fn terminal(mut self) -> Self {
        self.is_terminal = true;
        self
    }

    /// Whether the step collects the given field.
    pub fn collects(&self, field: &str) -> bool {
        self.required_fields.contains(field) || self.optional_fields.contains(field)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from registry construction and lookup.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No step with the given id is registered.
    #[error("unknown step: {id}")]
    UnknownStep {
        /// The requested step id.
        id: String,
    },

    /// The registry definition contains no steps.
    #[error("step registry must contain at least one step")]
    Empty,

    /// Two steps share an id.
    #[error("duplicate step id: {id}")]
    DuplicateId {
        /// The repeated id.
        id: String,
    },

    /// Two steps share an order value.
    #[error("steps {first} and {second} share order {order}")]
    DuplicateOrder {
        /// The repeated order value.
        order: u32,
        /// First step with that order.
        first: String,
        /// Second step with that order.
        second: String,
    },

    /// The terminal step is missing, repeated, or not last.
    #[error("invalid terminal step configuration: {reason}")]
    InvalidTerminal {
        /// What is wrong.
        reason: String,
    },

    /// The YAML document could not be parsed.
    #[error("failed to parse step registry: {0}")]
    Parse(#[from] serde_yaml::Error),
}

// ─── Registry ────────────────────────────────────────────────────────

/// Serialized registry shape (see module docs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryDocument {
    #[serde(default)]
    ambient_fields: BTreeSet<String>,
    steps: Vec<StepDefinition>,
}

/// Ordered, immutable set of step definitions.
#[derive(Debug, Clone)]
pub struct StepRegistry {
    steps: Vec<StepDefinition>,
    index: HashMap<String, usize>,
    ambient_fields: BTreeSet<String>,
    known_fields: BTreeSet<String>,
}

/// Attribution fields captured from the landing URL, accepted on any step.
const AMBIENT_FIELDS: &[&str] = &["utmSource", "utmMedium", "utmCampaign", "referrer"];

impl StepRegistry {
    /// The built-in 14-step loan application.
    pub fn loan_application() -> Self {
        let steps = vec![
            StepDefinition::new("loan-type", 1, "Loan type", &["loanType"]),
            StepDefinition::new("business-owner", 2, "Business ownership", &["isBusinessOwner"]),
            StepDefinition::new("funding-amount", 3, "Funding amount", &["fundingAmount"]),
            StepDefinition::new("funding-timeline", 4, "Funding timeline", &["fundingTimeline"]),
            StepDefinition::new(
                "business-name",
                5,
                "Business name",
                &["businessName", "businessEntityType"],
            ),
            StepDefinition::new(
                "business-address",
                6,
                "Business address",
                &["businessAddress", "businessCity", "businessState", "businessZip"],
            ),
            StepDefinition::new(
                "business-details",
                7,
                "Business details",
                &["industry", "timeInBusiness", "ein"],
            )
            .optional(&["businessDescription"]),
            StepDefinition::new("business-website", 8, "Business website", &["businessWebsite"]),
            StepDefinition::new("monthly-revenue", 9, "Monthly revenue", &["monthlyRevenue"]),
            StepDefinition::new("credit-score", 10, "Credit score", &["creditScore"]),
            StepDefinition::new(
                "personal-information",
                11,
                "Personal information",
                &["firstName", "lastName", "email", "phone"],
            ),
            StepDefinition::new(
                "home-address",
                12,
                "Home address",
                &["homeAddress", "homeCity", "homeState", "homeZip"],
            )
            .optional(&["homeUnit"]),
            StepDefinition::new(
                "bank-statements",
                13,
                "Bank statements",
                &["bankStatementUploadId"],
            ),
            StepDefinition::new(
                "review-submit",
                14,
                "Review and submit",
                &["consentToTerms", "consentToCreditCheck"],
            )
            .optional(&["consentToMarketing"])
            .terminal(),
        ];
        let ambient = AMBIENT_FIELDS.iter().map(|f| f.to_string()).collect();
        Self::build(steps, ambient)
    }

    /// Build a registry from definitions, validating ids, orders, and the
    /// terminal step.
    pub fn from_definitions(
        steps: Vec<StepDefinition>,
        ambient_fields: BTreeSet<String>,
    ) -> Result<Self, RegistryError> {
        if steps.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen_ids = BTreeSet::new();
        for step in &steps {
            if !seen_ids.insert(step.id.as_str()) {
                return Err(RegistryError::DuplicateId { id: step.id.clone() });
            }
        }

        let mut by_order: HashMap<u32, &str> = HashMap::new();
        for step in &steps {
            if let Some(first) = by_order.insert(step.order, &step.id) {
                return Err(RegistryError::DuplicateOrder {
                    order: step.order,
                    first: first.to_string(),
                    second: step.id.clone(),
                });
            }
        }

        let terminals: Vec<&StepDefinition> = steps.iter().filter(|s| s.is_terminal).collect();
        match terminals.as_slice() {
            [] => {
                return Err(RegistryError::InvalidTerminal {
                    reason: "no step is marked terminal".to_string(),
                })
            }
            [only] => {
                let max_order = steps.iter().map(|s| s.order).max().unwrap_or(only.order);
                if only.order != max_order {
                    return Err(RegistryError::InvalidTerminal {
                        reason: format!("terminal step {} is not the last step", only.id),
                    });
                }
            }
            many => {
                let ids: Vec<&str> = many.iter().map(|s| s.id.as_str()).collect();
                return Err(RegistryError::InvalidTerminal {
                    reason: format!("multiple terminal steps: {}", ids.join(", ")),
                });
            }
        }

        Ok(Self::build(steps, ambient_fields))
    }

    /// Parse and validate a YAML registry document.
    pub fn from_yaml(source: &str) -> Result<Self, RegistryError> {
        let doc: RegistryDocument = serde_yaml::from_str(source)?;
        Self::from_definitions(doc.steps, doc.ambient_fields)
    }

    /// Render the registry in the format [`from_yaml`](Self::from_yaml) reads.
    pub fn to_yaml(&self) -> Result<String, RegistryError> {
        let doc = RegistryDocument {
            ambient_fields: self.ambient_fields.clone(),
            steps: self.steps.clone(),
        };
        Ok(serde_yaml::to_string(&doc)?)
    }

    fn build(mut steps: Vec<StepDefinition>, ambient_fields: BTreeSet<String>) -> Self {
        steps.sort_by_key(|s| s.order);
        let index = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        let mut known_fields = ambient_fields.clone();
        for step in &steps {
            known_fields.extend(step.required_fields.iter().cloned());
            known_fields.extend(step.optional_fields.iter().cloned());
        }
        Self {
            steps,
            index,
            ambient_fields,
            known_fields,
        }
    }

    /// Look up a step by id.
    pub fn get_step(&self, id: &str) -> Result<&StepDefinition, RegistryError> {
        self.position(id).map(|i| &self.steps[i])
    }

    /// All steps, sorted by `order`.
    pub fn ordered_steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// The step after `current`, or `None` when `current` is terminal.
    pub fn next_step_id(&self, current: &str) -> Result<Option<&str>, RegistryError> {
        let i = self.position(current)?;
        Ok(self.steps.get(i + 1).map(|s| s.id.as_str()))
    }

    /// The step before `current`, or `None` at the first step.
    pub fn previous_step_id(&self, current: &str) -> Result<Option<&str>, RegistryError> {
        let i = self.position(current)?;
        Ok(i.checked_sub(1).map(|p| self.steps[p].id.as_str()))
    }

    /// Index of a step in the ordered list.
    pub fn position(&self, id: &str) -> Result<usize, RegistryError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| RegistryError::UnknownStep { id: id.to_string() })
    }

    /// Whether a step with this id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// The first step of the wizard.
    pub fn first_step(&self) -> &StepDefinition {
        // Non-empty by construction.
        &self.steps[0]
    }

    /// The terminal step of the wizard.
    pub fn terminal_step(&self) -> &StepDefinition {
        &self.steps[self.steps.len() - 1]
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; a registry holds at least one step.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every field name some step (or the ambient set) accepts.
    pub fn known_fields(&self) -> &BTreeSet<String> {
        &self.known_fields
    }

    /// Whether `name` may be set on a form.
    pub fn is_known_field(&self, name: &str) -> bool {
        self.known_fields.contains(name)
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::loan_application()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
