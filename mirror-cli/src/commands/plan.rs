//! `mirror plan`: dry run. Lists inventories and diffs, never mutates.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use mirror_sync::{RunOptions, RunPlan};

use super::{open_archive, open_store, TargetArgs};

/// Orphan uids listed per kind before truncating.
const ORPHAN_PREVIEW: usize = 20;

/// Arguments for `mirror plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub async fn run(self) -> Result<ExitCode> {
        let config = self.target.resolve()?;
        let source = open_archive(&config)?;
        let store = open_store(&config)?;
        let options = RunOptions::from(&config);

        let plan = mirror_sync::plan(store.as_ref(), &source, &options)
            .await
            .context("planning failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("failed to serialize plan JSON")?
            );
        } else {
            print_table(&plan);
        }
        Ok(ExitCode::SUCCESS)
    }
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "kind")]
    kind: &'static str,
    #[tabled(rename = "source")]
    source: usize,
    #[tabled(rename = "target")]
    target: usize,
    #[tabled(rename = "delete")]
    delete: usize,
    #[tabled(rename = "replace")]
    replace: usize,
    #[tabled(rename = "create")]
    create: usize,
    #[tabled(rename = "malformed")]
    malformed: usize,
    #[tabled(rename = "protected")]
    protected: usize,
}

fn print_table(plan: &RunPlan) {
    println!("{} target {}", "[dry-run]".cyan().bold(), plan.target);

    let rows: Vec<PlanRow> = plan
        .kinds
        .iter()
        .map(|k| PlanRow {
            kind: k.kind.label(),
            source: k.source,
            target: k.target,
            delete: k.to_delete,
            replace: k.to_replace,
            create: k.to_create,
            malformed: k.malformed,
            protected: k.protected,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    for kind in &plan.kinds {
        if kind.orphans.is_empty() {
            continue;
        }
        println!("{} to delete:", kind.kind.label().bold());
        for uid in kind.orphans.iter().take(ORPHAN_PREVIEW) {
            println!("  {} {uid}", "-".red());
        }
        if kind.orphans.len() > ORPHAN_PREVIEW {
            println!("  … {} more", kind.orphans.len() - ORPHAN_PREVIEW);
        }
    }

    if let Some(reason) = &plan.blocked {
        println!("{} {reason}", "blocked:".yellow().bold());
    }
}
