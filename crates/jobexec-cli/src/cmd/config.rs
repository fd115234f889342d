use anyhow::Context;
use clap::Subcommand;
use std::path::{Path, PathBuf};

use jobexec_core::config::JobConfig;

use crate::output::print_json;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Parse and validate a job config file
    Validate {
        /// Path to a `job/config.yaml`
        file: PathBuf,
    },
}

pub fn run(subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Validate { file } => validate(&file, json),
    }
}

fn validate(file: &Path, json: bool) -> anyhow::Result<()> {
    let config =
        JobConfig::load(file).with_context(|| format!("{} is not valid", file.display()))?;

    if json {
        let actions: Vec<_> = config
            .actions
            .iter()
            .map(|a| {
                serde_json::json!({
                    "name": a.name,
                    "events": a.events.iter().map(|e| &e.name).collect::<Vec<_>>(),
                    "tasks": a.tasks.len(),
                    "silent": a.silent,
                })
            })
            .collect();
        return print_json(&serde_json::json!({ "valid": true, "actions": actions }));
    }

    println!(
        "{} is valid: {} action(s)",
        file.display(),
        config.actions.len()
    );
    for action in &config.actions {
        let silent = if action.silent { " (silent)" } else { "" };
        println!("  {}{silent}: {} task(s)", action.name, action.tasks.len());
    }
    Ok(())
}
