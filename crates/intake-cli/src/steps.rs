//! # Steps Subcommand

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};

use intake_state::StepRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StepsFormat {
    /// Aligned table.
    Text,
    /// The YAML document `--steps-file` accepts.
    Yaml,
    Json,
}

/// Arguments for `intake steps`.
#[derive(Args, Debug)]
pub struct StepsArgs {
    /// YAML step table to load instead of the built-in one.
    #[arg(long)]
    pub steps_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = StepsFormat::Text)]
    pub format: StepsFormat,
}

pub fn run_steps(args: &StepsArgs) -> Result<u8> {
    let registry = crate::load_registry(args.steps_file.as_deref())?;
    print!("{}", render(&registry, args.format)?);
    Ok(0)
}

fn render(registry: &StepRegistry, format: StepsFormat) -> Result<String> {
    Ok(match format {
        StepsFormat::Yaml => registry.to_yaml()?,
        StepsFormat::Json => {
            let mut out = serde_json::to_string_pretty(registry.ordered_steps())?;
            out.push('\n');
            out
        }
        StepsFormat::Text => {
            let width = registry
                .ordered_steps()
                .iter()
                .map(|s| s.id.len())
                .max()
                .unwrap_or(0);
            let mut out = String::new();
            for step in registry.ordered_steps() {
                let required: Vec<&str> = step.required_fields.iter().map(String::as_str).collect();
                let marker = if step.is_terminal { " (terminal)" } else { "" };
                out.push_str(&format!(
                    "{:>3}  {:<width$}  {}{}\n",
                    step.order,
                    step.id,
                    required.join(", "),
                    marker,
                ));
            }
            out
        }
    })
}
