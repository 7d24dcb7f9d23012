//! `mirror sync`: reconcile the target with the archive and grade the run.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use mirror_sync::{RunOptions, RunReport};

use super::{open_archive, open_store, plan, TargetArgs};

/// Arguments for `mirror sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Print the plan and change nothing (same as `mirror plan`).
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the run report as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub async fn run(self) -> Result<ExitCode> {
        if self.dry_run {
            return plan::PlanArgs {
                target: self.target,
                json: self.json,
            }
            .run()
            .await;
        }

        let config = self.target.resolve()?;
        let source = open_archive(&config)?;
        let store = open_store(&config)?;
        let options = RunOptions::from(&config);

        let report = mirror_sync::run(store, &source, &options)
            .await
            .context("sync aborted")?;

        let artifacts = match report.write_artifacts(&config.outputs_dir) {
            Ok(artifacts) => Some(artifacts),
            Err(err) => {
                tracing::warn!(error = %err, "could not write report artifacts");
                None
            }
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize run report")?
            );
        } else {
            print_table(&report);
            if let Some(artifacts) = artifacts {
                println!("Report: {}", artifacts.report.display());
                if let Some(failures) = artifacts.failures {
                    println!("Failed operations: {}", failures.display());
                }
            }
        }

        Ok(ExitCode::from(u8::try_from(report.exit_code()).unwrap_or(1)))
    }
}

#[derive(Tabled)]
struct KindRow {
    #[tabled(rename = "kind")]
    kind: &'static str,
    #[tabled(rename = "source")]
    source: usize,
    #[tabled(rename = "target before")]
    target_before: usize,
    #[tabled(rename = "target after")]
    target_after: String,
    #[tabled(rename = "created")]
    created: usize,
    #[tabled(rename = "updated")]
    updated: usize,
    #[tabled(rename = "deleted")]
    deleted: usize,
    #[tabled(rename = "failed")]
    failed: usize,
    #[tabled(rename = "skipped")]
    skipped: usize,
}

fn print_table(report: &RunReport) {
    println!(
        "Mirror v{} | target {} | {:.1}s",
        env!("CARGO_PKG_VERSION"),
        report.target,
        report.duration_ms as f64 / 1000.0,
    );

    let rows: Vec<KindRow> = report
        .kinds
        .iter()
        .map(|k| KindRow {
            kind: k.kind.label(),
            source: k.source,
            target_before: k.target_before,
            target_after: k
                .target_after
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string()),
            created: k.created,
            updated: k.updated,
            deleted: k.deleted,
            failed: k.failed,
            skipped: k.skipped,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let result = &report.result;
    let verdict = if result.passed() {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    };
    println!(
        "{verdict} {} succeeded, {} failed of {} operations ({:.1}% success, threshold {:.1}%)",
        result.succeeded, result.failed, result.total, result.success_rate, result.threshold,
    );

    for failure in report.failures.iter().take(10) {
        let subject = failure
            .uid
            .as_ref()
            .map(|uid| uid.to_string())
            .or_else(|| failure.origin.clone())
            .unwrap_or_default();
        println!(
            "  {} {} {subject}: {}",
            "✗".red(),
            failure.kind,
            failure.error
        );
    }
    if report.failures.len() > 10 {
        println!("  … {} more", report.failures.len() - 10);
    }
}
