//! # Validate Subcommand
//!
//! Checks one session's snapshot directory (the layout the API writes under
//! `INTAKE_SNAPSHOT_DIR/{session_id}`) against a step table.
//!
//! Exit codes: 0 when the snapshot would resume as-is, 1 when the service
//! would discard it or a completed step has lost a required answer.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use intake_state::{ClientSnapshot, FileSnapshotStore, StepRegistry};

/// Arguments for `intake validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Session snapshot directory.
    #[arg(value_name = "SNAPSHOT_DIR")]
    pub path: PathBuf,

    /// YAML step table to validate against instead of the built-in one.
    #[arg(long)]
    pub steps_file: Option<PathBuf>,
}

/// What a snapshot check found.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    pub current_step: Option<String>,
    pub completed: usize,
    pub submitted: bool,
    /// Problems that make the service discard the form.
    pub errors: Vec<String>,
    /// Completed steps whose required fields are now missing.
    pub warnings: Vec<String>,
}

impl SnapshotReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let registry = crate::load_registry(args.steps_file.as_deref())?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let report = runtime.block_on(check_snapshot(&args.path, &registry))?;

    match &report.current_step {
        Some(step) => println!(
            "Snapshot at {}: step {step}, {} completed",
            args.path.display(),
            report.completed
        ),
        None if report.submitted => println!("Snapshot at {}: submitted", args.path.display()),
        None => println!("Snapshot at {}: no form saved", args.path.display()),
    }
    for error in &report.errors {
        println!("  FAIL: {error}");
    }
    for warning in &report.warnings {
        println!("  WARN: {warning}");
    }
    Ok(if report.is_ok() { 0 } else { 1 })
}

/// Load the snapshot in `dir` and compare it with `registry`.
pub async fn check_snapshot(dir: &Path, registry: &StepRegistry) -> Result<SnapshotReport> {
    if !dir.is_dir() {
        bail!("snapshot directory not found: {}", dir.display());
    }
    let store = FileSnapshotStore::open(dir).await?;
    let snapshot = match ClientSnapshot::load(&store).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            return Ok(SnapshotReport {
                errors: vec![format!("{e}")],
                ..SnapshotReport::default()
            })
        }
    };

    let mut report = SnapshotReport {
        submitted: snapshot.submission_succeeded,
        ..SnapshotReport::default()
    };
    let Some(form) = snapshot.form else {
        return Ok(report);
    };
    report.current_step = Some(form.current_step_id.clone());
    report.completed = form.completed_steps.len();

    if !registry.contains(&form.current_step_id) {
        report
            .errors
            .push(format!("current step {} is not registered", form.current_step_id));
    }
    for step in &form.completed_steps {
        if !registry.contains(step) {
            report
                .errors
                .push(format!("completed step {step} is not registered"));
            continue;
        }
        let missing = form
            .missing_fields(registry, step)
            .with_context(|| format!("checking step {step}"))?;
        if !missing.is_empty() {
            report.warnings.push(format!(
                "completed step {step} is missing {}",
                missing.join(", ")
            ));
        }
    }
    if let Some(unknown) = form.fields.keys().find(|k| !registry.is_known_field(k)) {
        report
            .warnings
            .push(format!("field {unknown} is not collected by any step"));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use intake_core::FieldValue;
    use intake_state::{FormStore, Navigator};

    use super::*;

    async fn store_in(dir: &Path) -> FormStore {
        FormStore::open(
            Arc::new(StepRegistry::loan_application()),
            Box::new(FileSnapshotStore::open(dir).await.unwrap()),
        )
        .await
    }

    #[tokio::test]
    async fn advanced_snapshot_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path()).await;
        store
            .set_field("loanType", FieldValue::text("business-loan"))
            .await
            .unwrap();
        let registry = Arc::clone(store.registry());
        let mut next = store.state().clone();
        Navigator::new(&registry, &mut next).advance().unwrap();
        store.commit(next).await.unwrap();

        let report = check_snapshot(dir.path(), &registry).await.unwrap();
        assert!(report.is_ok(), "{report:?}");
        assert_eq!(report.current_step.as_deref(), Some("business-owner"));
        assert_eq!(report.completed, 1);
    }

    #[tokio::test]
    async fn empty_directory_has_no_form() {
        let dir = tempfile::tempdir().unwrap();
        let report = check_snapshot(dir.path(), &StepRegistry::loan_application())
            .await
            .unwrap();
        assert!(report.is_ok());
        assert_eq!(report.current_step, None);
    }

    #[tokio::test]
    async fn snapshot_from_another_step_table_fails() {
        let dir = tempfile::tempdir().unwrap();
        store_in(dir.path())
            .await
            .set_field("loanType", FieldValue::text("sba-loan"))
            .await
            .unwrap();
        let other = StepRegistry::from_yaml(
            "steps:\n  - id: only\n    order: 1\n    requiredFields: [loanType]\n    isTerminal: true\n",
        )
        .unwrap();
        let report = check_snapshot(dir.path(), &other).await.unwrap();
        assert_eq!(report.errors, vec!["current step loan-type is not registered"]);
    }

    #[tokio::test]
    async fn corrupt_key_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("loanApplicationFormData.json"), b"{not json").unwrap();
        let report = check_snapshot(dir.path(), &StepRegistry::loan_application())
            .await
            .unwrap();
        assert_eq!(report.errors.len(), 1);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(check_snapshot(&gone, &StepRegistry::loan_application())
            .await
            .is_err());
    }
}
