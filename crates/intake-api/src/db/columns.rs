//! Form field ↔ `applications` column translation.
//!
//! The applications table is flat: one column per form field. Numbers are
//! stored as text so a value round-trips exactly as the applicant typed it;
//! consent and yes/no answers are boolean columns. Fields outside this table
//! (custom step files) go to the `extra_fields` JSONB column.

use intake_core::{FieldMap, FieldValue};

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Flag,
}

/// One form field's column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub field: &'static str,
    pub column: &'static str,
    pub kind: ColumnKind,
}

const fn text(field: &'static str, column: &'static str) -> Column {
    Column {
        field,
        column,
        kind: ColumnKind::Text,
    }
}

const fn flag(field: &'static str, column: &'static str) -> Column {
    Column {
        field,
        column,
        kind: ColumnKind::Flag,
    }
}

/// Every mapped application column, in table order.
pub const APPLICATION_COLUMNS: &[Column] = &[
    text("loanType", "loan_type"),
    flag("isBusinessOwner", "is_business_owner"),
    text("fundingAmount", "funding_amount"),
    text("fundingTimeline", "funding_timeline"),
    text("businessName", "business_name"),
    text("businessEntityType", "business_entity_type"),
    text("businessAddress", "business_address"),
    text("businessCity", "business_city"),
    text("businessState", "business_state"),
    text("businessZip", "business_zip"),
    text("industry", "industry"),
    text("timeInBusiness", "time_in_business"),
    text("ein", "ein"),
    text("businessDescription", "business_description"),
    text("businessWebsite", "business_website"),
    text("monthlyRevenue", "monthly_revenue"),
    text("creditScore", "credit_score"),
    text("firstName", "first_name"),
    text("lastName", "last_name"),
    text("email", "email"),
    text("phone", "phone"),
    text("homeAddress", "home_address"),
    text("homeUnit", "home_unit"),
    text("homeCity", "home_city"),
    text("homeState", "home_state"),
    text("homeZip", "home_zip"),
    text("bankStatementUploadId", "bank_statement_upload_id"),
    flag("consentToTerms", "consent_to_terms"),
    flag("consentToCreditCheck", "consent_to_credit_check"),
    flag("consentToMarketing", "consent_to_marketing"),
    text("utmSource", "utm_source"),
    text("utmMedium", "utm_medium"),
    text("utmCampaign", "utm_campaign"),
    text("referrer", "referrer"),
];

/// Column for a form field.
pub fn column_for(field: &str) -> Option<&'static Column> {
    APPLICATION_COLUMNS.iter().find(|c| c.field == field)
}

/// A value ready to bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Text(Option<String>),
    Flag(Option<bool>),
}

/// Interpret a field as a yes/no answer.
pub fn flag_value(value: &FieldValue) -> Option<bool> {
    match value {
        FieldValue::Flag(b) => Some(*b),
        FieldValue::Number(n) if !n.is_nan() => Some(*n != 0.0),
        FieldValue::Number(_) => None,
        FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "on" => Some(true),
            "false" | "no" | "n" | "0" | "off" => Some(false),
            _ => None,
        },
    }
}

/// The value to store in `column` for a form.
pub fn column_value(column: &Column, fields: &FieldMap) -> ColumnValue {
    let value = fields.get(column.field);
    match column.kind {
        ColumnKind::Text => ColumnValue::Text(
            value
                .filter(|v| !v.is_empty())
                .map(FieldValue::to_storage_string),
        ),
        ColumnKind::Flag => ColumnValue::Flag(value.and_then(flag_value)),
    }
}

/// Rebuild a form field from its stored value.
pub fn field_value(column: &Column, value: ColumnValue) -> Option<FieldValue> {
    match (column.kind, value) {
        (ColumnKind::Text, ColumnValue::Text(v)) => v.map(FieldValue::Text),
        (ColumnKind::Flag, ColumnValue::Flag(v)) => v.map(FieldValue::Flag),
        _ => None,
    }
}

/// Fields with no column of their own.
pub fn extra_fields(fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .filter(|(k, _)| column_for(k).is_none())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_state::StepRegistry;
    use std::collections::HashSet;

    #[test]
    fn every_built_in_field_has_a_column() {
        let registry = StepRegistry::loan_application();
        for field in registry.known_fields() {
            assert!(column_for(field).is_some(), "no column for {field}");
        }
    }

    #[test]
    fn columns_are_unique() {
        let fields: HashSet<_> = APPLICATION_COLUMNS.iter().map(|c| c.field).collect();
        let columns: HashSet<_> = APPLICATION_COLUMNS.iter().map(|c| c.column).collect();
        assert_eq!(fields.len(), APPLICATION_COLUMNS.len());
        assert_eq!(columns.len(), APPLICATION_COLUMNS.len());
    }

    #[test]
    fn numbers_are_stored_as_text() {
        let mut fields = FieldMap::new();
        fields.insert("fundingAmount".into(), FieldValue::Number(250000.0));
        let col = column_for("fundingAmount").unwrap();
        assert_eq!(
            column_value(col, &fields),
            ColumnValue::Text(Some("250000".into()))
        );
    }

    #[test]
    fn flags_accept_text_answers() {
        assert_eq!(flag_value(&FieldValue::text("Yes")), Some(true));
        assert_eq!(flag_value(&FieldValue::text("no")), Some(false));
        assert_eq!(flag_value(&FieldValue::Flag(true)), Some(true));
        assert_eq!(flag_value(&FieldValue::text("maybe")), None);
    }

    #[test]
    fn blank_text_stores_null() {
        let mut fields = FieldMap::new();
        fields.insert("ein".into(), FieldValue::text("  "));
        let col = column_for("ein").unwrap();
        assert_eq!(column_value(col, &fields), ColumnValue::Text(None));
    }

    #[test]
    fn unmapped_fields_are_extra() {
        let mut fields = FieldMap::new();
        fields.insert("ein".into(), FieldValue::text("12-3456789"));
        fields.insert("favouriteColour".into(), FieldValue::text("teal"));
        let extra = extra_fields(&fields);
        assert_eq!(extra.len(), 1);
        assert!(extra.contains_key("favouriteColour"));
    }
}
