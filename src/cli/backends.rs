//! CLI command for listing registered backends

use super::OutputFormat;
use crate::backend::BackendRegistry;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::{json, Value};

/// Backends subcommand
#[derive(Debug, Args)]
pub struct BackendsCommand {
    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub format: OutputFormat,
}

/// Describe every backend of `registry`
pub fn describe(registry: &BackendRegistry) -> Vec<Value> {
    registry
        .backends()
        .map(|backend| {
            json!({
                "name": backend.name(),
                "categories": backend.categories(),
                "archiving": backend.has_archiving(),
                "resuming": backend.has_resuming(),
            })
        })
        .collect()
}

impl BackendsCommand {
    /// Execute the backends command
    pub fn execute(&self) -> Result<()> {
        let backends = describe(BackendRegistry::builtin());

        match self.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&backends)
                        .context("Failed to serialize backends to JSON")?
                );
            }
            OutputFormat::Human => {
                println!("Found {} backends:\n", backends.len());
                for backend in &backends {
                    let categories: Vec<&str> = backend["categories"]
                        .as_array()
                        .map(|c| c.iter().filter_map(Value::as_str).collect())
                        .unwrap_or_default();
                    println!(
                        "{} | categories={} | archiving={} | resuming={}",
                        backend["name"].as_str().unwrap_or_default(),
                        categories.join(","),
                        backend["archiving"],
                        backend["resuming"]
                    );
                }
            }
        }

        Ok(())
    }
}
