//! # intake-cli: Operator CLI for the Loan Intake Stack
//!
//! ## Subcommands
//!
//! - `intake steps`: print the step table, built-in or from a YAML file.
//! - `intake validate`: check a session snapshot directory against a step
//!   table.
//! - `intake check-website`: fetch and score a business website without
//!   recording a check.
//!
//! ```bash
//! intake steps --format yaml > steps.yaml
//! intake validate ./snapshots/6f1c2d3e-... --steps-file steps.yaml
//! intake check-website acme.example --json
//! ```

pub mod steps;
pub mod validate;
pub mod website;

use std::path::Path;

use anyhow::{Context, Result};

use intake_state::StepRegistry;

/// The built-in registry, or the one in `path`.
pub fn load_registry(path: Option<&Path>) -> Result<StepRegistry> {
    match path {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("reading step table {}", path.display()))?;
            StepRegistry::from_yaml(&source)
                .with_context(|| format!("parsing step table {}", path.display()))
        }
        None => Ok(StepRegistry::loan_application()),
    }
}
