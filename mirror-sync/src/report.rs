//! Run report and its JSON artifacts.
//!
//! `<outputs>/sync-report-<YYYYmmdd_HHMMSS>.json` is always written; when the
//! run had failures, `failed-operations-<ts>.json` is written next to it.
//! Both use the `.tmp` + rename pattern.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mirror_core::ResourceKind;

use crate::error::{io_err, SyncError};
use crate::outcome::RunResult;
use crate::stats::KindCounts;
use crate::synchronizer::FailureRecord;

/// Per-kind section of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindReport {
    pub kind: ResourceKind,
    /// Source entries read from the archive, malformed ones included.
    pub source: usize,
    pub target_before: usize,
    /// `None` when the post-run listing failed.
    pub target_after: Option<usize>,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_operations: usize,
}

impl KindReport {
    pub fn new(
        kind: ResourceKind,
        source: usize,
        target_before: usize,
        target_after: Option<usize>,
        counts: KindCounts,
    ) -> Self {
        Self {
            kind,
            source,
            target_before,
            target_after,
            created: counts.created,
            updated: counts.updated,
            deleted: counts.deleted,
            failed: counts.failed,
            skipped: counts.skipped,
            total_operations: counts.total_operations(),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub target: String,
    pub kinds: Vec<KindReport>,
    pub result: RunResult,
    pub failures: Vec<FailureRecord>,
}

/// Paths written by [`RunReport::write_artifacts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifacts {
    pub report: PathBuf,
    pub failures: Option<PathBuf>,
}

impl RunReport {
    pub fn kind(&self, kind: ResourceKind) -> Option<&KindReport> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    pub fn exit_code(&self) -> i32 {
        self.result.exit_code
    }

    /// Stamp used in artifact file names.
    pub fn file_stamp(&self) -> String {
        self.started_at.format("%Y%m%d_%H%M%S").to_string()
    }

    pub fn write_artifacts(&self, outputs_dir: &Path) -> Result<ReportArtifacts, SyncError> {
        std::fs::create_dir_all(outputs_dir).map_err(|e| io_err(outputs_dir, e))?;
        let stamp = self.file_stamp();

        let report = outputs_dir.join(format!("sync-report-{stamp}.json"));
        write_json(&report, self)?;

        let failures = if self.failures.is_empty() {
            None
        } else {
            let path = outputs_dir.join(format!("failed-operations-{stamp}.json"));
            write_json(&path, &self.failures)?;
            Some(path)
        };

        tracing::info!(report = %report.display(), "report written");
        Ok(ReportArtifacts { report, failures })
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SyncError> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use mirror_core::{SyncOutcome, Uid};

    use crate::outcome::evaluate;
    use crate::stats::Stats;
    use crate::synchronizer::FailedStep;

    use super::*;

    fn report(failures: Vec<FailureRecord>) -> RunReport {
        let stats = Stats::new();
        stats.record(ResourceKind::Dashboard, SyncOutcome::Created);
        if !failures.is_empty() {
            stats.record(ResourceKind::Dashboard, SyncOutcome::Failed);
        }
        let counts = stats.snapshot();
        let started_at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        RunReport {
            started_at,
            finished_at: started_at,
            duration_ms: 0,
            target: "https://target.example".to_string(),
            kinds: vec![KindReport::new(
                ResourceKind::Dashboard,
                2,
                0,
                Some(1),
                counts.kind(ResourceKind::Dashboard),
            )],
            result: evaluate(counts, 90.0),
            failures,
        }
    }

    #[test]
    fn writes_report_only_when_clean() {
        let dir = TempDir::new().unwrap();
        let artifacts = report(vec![]).write_artifacts(dir.path()).unwrap();
        assert_eq!(
            artifacts.report,
            dir.path().join("sync-report-20260304_050607.json")
        );
        assert!(artifacts.failures.is_none());
        assert!(!artifacts.report.with_extension("json.tmp").exists());
    }

    #[test]
    fn writes_failure_log_next_to_report() {
        let dir = TempDir::new().unwrap();
        let failure = FailureRecord {
            kind: ResourceKind::Dashboard,
            uid: Some(Uid::from("b")),
            title: None,
            origin: Some("b.json".to_string()),
            step: FailedStep::Create,
            error: "boom".to_string(),
            timestamp: Utc::now(),
        };
        let artifacts = report(vec![failure.clone()])
            .write_artifacts(&dir.path().join("nested"))
            .unwrap();
        let path = artifacts.failures.expect("failure log");
        let logged: Vec<FailureRecord> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(logged, vec![failure]);
    }

    #[test]
    fn report_round_trips_through_json() {
        let written = report(vec![]);
        let dir = TempDir::new().unwrap();
        let artifacts = written.write_artifacts(dir.path()).unwrap();
        let loaded: RunReport =
            serde_json::from_str(&std::fs::read_to_string(artifacts.report).unwrap()).unwrap();
        assert_eq!(loaded, written);
        assert_eq!(loaded.kind(ResourceKind::Dashboard).unwrap().total_operations, 1);
    }
}
