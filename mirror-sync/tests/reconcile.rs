use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use serde_json::json;

use mirror_archive::{ArchiveSource, MalformedRecord, MemorySource, SourceEntry};
use mirror_core::{ResourceKind, ResourceRecord, Uid};
use mirror_store::{InventoryStore, MemoryStore, StoreCall};
use mirror_sync::{
    plan, run, BatchPolicy, ConsistencyPolicy, RunOptions, SyncError, EXIT_FAILURE, EXIT_SUCCESS,
};

fn record(kind: ResourceKind, uid: &str) -> ResourceRecord {
    ResourceRecord {
        kind,
        uid: Uid::from(uid),
        title: Some(uid.to_uppercase()),
        origin: format!("{}/{uid}.json", kind.dir_name()),
        payload: json!({ "uid": uid, "title": uid.to_uppercase() }),
    }
}

fn dashboards(uids: &[&str]) -> MemorySource {
    MemorySource::from_records(uids.iter().map(|u| record(ResourceKind::Dashboard, u)))
}

fn options() -> RunOptions {
    RunOptions {
        consistency: ConsistencyPolicy::immediate(),
        ..RunOptions::default()
    }
}

fn store_with(kind: ResourceKind, uids: &[&str]) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_uids(kind, uids.iter().copied()))
}

fn sorted(uids: Vec<Uid>) -> Vec<String> {
    let mut out: Vec<String> = uids.into_iter().map(|u| u.to_string()).collect();
    out.sort();
    out
}

#[tokio::test]
async fn source_ab_target_bc() {
    let store = store_with(ResourceKind::Dashboard, &["B", "C"]);
    let report = run(store.clone(), &dashboards(&["A", "B"]), &options())
        .await
        .expect("run");

    let counts = report.result.counts.kind(ResourceKind::Dashboard);
    assert_eq!(counts.deleted, 1, "C is an orphan");
    assert_eq!(counts.updated, 1, "B is replaced");
    assert_eq!(counts.created, 1, "A is new");
    assert_eq!(counts.failed, 0);
    assert_eq!(report.exit_code(), EXIT_SUCCESS);
    assert_eq!(sorted(store.uids(ResourceKind::Dashboard)), vec!["A", "B"]);

    let dash = report.kind(ResourceKind::Dashboard).expect("dashboard section");
    assert_eq!(dash.source, 2);
    assert_eq!(dash.target_before, 2);
    assert_eq!(dash.target_after, Some(2));
}

#[tokio::test]
async fn inventory_failure_aborts_without_mutations() {
    let store = store_with(ResourceKind::Dashboard, &["B", "C"]);
    store.fail_list(ResourceKind::Folder);

    let err = run(store.clone(), &dashboards(&["A"]), &options())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::InventoryUnavailable {
            kind: ResourceKind::Folder,
            ..
        }
    ));
    assert!(store.mutations().is_empty());
}

#[tokio::test]
async fn orphans_are_deleted_before_any_create() {
    let store = Arc::new(MemoryStore::new());
    store.insert(ResourceKind::Folder, Uid::from("old-folder"), json!({}));
    store.insert(ResourceKind::Dashboard, Uid::from("old-dash"), json!({}));
    let source = MemorySource::from_records([
        record(ResourceKind::Folder, "f1"),
        record(ResourceKind::Dashboard, "d1"),
    ]);

    run(store.clone(), &source, &options()).await.expect("run");

    assert_eq!(
        store.mutations(),
        vec![
            StoreCall::Delete(ResourceKind::Dashboard, Uid::from("old-dash")),
            StoreCall::Delete(ResourceKind::Folder, Uid::from("old-folder")),
            StoreCall::Create(ResourceKind::Folder, Uid::from("f1")),
            StoreCall::Create(ResourceKind::Dashboard, Uid::from("d1")),
        ]
    );
}

#[tokio::test]
async fn every_orphan_gets_exactly_one_delete() {
    let target: Vec<String> = (0..15).map(|i| format!("t{i}")).collect();
    let refs: Vec<&str> = target.iter().map(String::as_str).collect();
    let store = store_with(ResourceKind::Dashboard, &refs);
    store.fail_delete("t3");

    let report = run(store.clone(), &dashboards(&["t0", "new"]), &options())
        .await
        .expect("run");

    let deletes: Vec<Uid> = store
        .mutations()
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::Delete(_, uid) if uid.as_str() != "t0" => Some(uid),
            _ => None,
        })
        .collect();
    assert_eq!(deletes.len(), 14);
    let counts = report.result.counts.kind(ResourceKind::Dashboard);
    assert_eq!(counts.deleted + counts.failed, 14);
    assert_eq!(counts.failed, 1);
}

#[tokio::test]
async fn protected_folder_is_never_touched() {
    let store = store_with(ResourceKind::Folder, &["general", "stale"]);
    let source = MemorySource::from_records([record(ResourceKind::Folder, "general")]);

    let report = run(store.clone(), &source, &options()).await.expect("run");

    assert_eq!(
        store.mutations(),
        vec![StoreCall::Delete(ResourceKind::Folder, Uid::from("stale"))]
    );
    let counts = report.result.counts.kind(ResourceKind::Folder);
    assert_eq!(counts.skipped, 1);
    assert_eq!(counts.deleted, 1);
}

#[tokio::test]
async fn failed_replace_delete_means_no_create() {
    let store = store_with(ResourceKind::Dashboard, &["B"]);
    store.fail_delete("B");

    let report = run(store.clone(), &dashboards(&["B"]), &options())
        .await
        .expect("run");

    assert!(!store
        .mutations()
        .iter()
        .any(|c| matches!(c, StoreCall::Create(..))));
    assert_eq!(report.result.failed, 1);
    assert_eq!(report.exit_code(), EXIT_FAILURE);
    assert_eq!(report.failures.len(), 1);
}

#[tokio::test]
async fn repeated_runs_yield_identical_counts() {
    let store = store_with(ResourceKind::Dashboard, &["A", "B"]);
    let source = dashboards(&["A", "B"]);

    let first = run(store.clone(), &source, &options()).await.expect("first");
    let second = run(store.clone(), &source, &options()).await.expect("second");

    assert_eq!(first.result.counts, second.result.counts);
    let counts = first.result.counts.kind(ResourceKind::Dashboard);
    assert_eq!(counts.updated, 2);
    assert_eq!(counts.created + counts.deleted + counts.failed, 0);
    assert_eq!(sorted(store.uids(ResourceKind::Dashboard)), vec!["A", "B"]);
}

fn dashboard_in(uid: &str, folder: &str) -> ResourceRecord {
    ResourceRecord {
        kind: ResourceKind::Dashboard,
        uid: Uid::from(uid),
        title: Some(uid.to_uppercase()),
        origin: format!("dashboards/{uid}.json"),
        payload: json!({ "dashboard": { "uid": uid }, "meta": { "folderUid": folder } }),
    }
}

fn folder_under(uid: &str, parent: &str) -> ResourceRecord {
    ResourceRecord {
        payload: json!({ "uid": uid, "title": uid, "parentUid": parent }),
        ..record(ResourceKind::Folder, uid)
    }
}

#[tokio::test]
async fn replacing_a_folder_does_not_lose_its_dashboards() {
    let store = Arc::new(MemoryStore::new().with_folder_cascade());
    store.insert(ResourceKind::Folder, Uid::from("ops"), json!({ "uid": "ops" }));
    let d1 = dashboard_in("d1", "ops");
    store.insert(ResourceKind::Dashboard, d1.uid.clone(), d1.payload.clone());
    let source = MemorySource::from_records([record(ResourceKind::Folder, "ops"), d1]);

    let first = run(store.clone(), &source, &options()).await.expect("first");
    let second = run(store.clone(), &source, &options()).await.expect("second");

    let dash = first.result.counts.kind(ResourceKind::Dashboard);
    assert_eq!((dash.updated, dash.failed), (1, 0));
    assert_eq!(first.exit_code(), EXIT_SUCCESS);
    assert!(first.failures.is_empty());
    assert_eq!(store.uids(ResourceKind::Dashboard), vec![Uid::from("d1")]);
    assert_eq!(first.result.counts, second.result.counts);
}

#[tokio::test]
async fn nested_folders_are_created_parent_first() {
    let store = Arc::new(MemoryStore::new());
    let source = MemorySource::from_records([
        folder_under("a-child", "z-parent"),
        record(ResourceKind::Folder, "z-parent"),
    ]);

    run(store.clone(), &source, &options()).await.expect("run");

    assert_eq!(
        store.mutations(),
        vec![
            StoreCall::Create(ResourceKind::Folder, Uid::from("z-parent")),
            StoreCall::Create(ResourceKind::Folder, Uid::from("a-child")),
        ]
    );
}

#[tokio::test]
async fn counters_are_consistent_with_failures_mixed_in() {
    let store = store_with(ResourceKind::Dashboard, &["B", "C", "D"]);
    store.fail_create("A");
    store.fail_delete("D");
    let mut source = dashboards(&["A", "B", "E"]);
    source.push(SourceEntry::Malformed(MalformedRecord {
        kind: ResourceKind::Dashboard,
        origin: "dashboards/broken.json".to_string(),
        reason: "invalid JSON".to_string(),
    }));

    let report = run(store.clone(), &source, &options()).await.expect("run");
    let r = &report.result;

    assert_eq!(r.succeeded, r.total - r.failed);
    let totals = r.counts.totals();
    assert_eq!(totals.created + totals.updated + totals.deleted, r.total - r.failed);
    // A create, D orphan delete, malformed file.
    assert_eq!(r.failed, 3);
    assert_eq!(report.failures.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dashboard_concurrency_is_bounded() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(15)));
    let uids: Vec<String> = (0..30).map(|i| format!("d{i}")).collect();
    let refs: Vec<&str> = uids.iter().map(String::as_str).collect();
    let opts = RunOptions {
        batch: BatchPolicy {
            batch_size: 10,
            max_parallel: 4,
        },
        ..options()
    };

    let report = run(store.clone(), &dashboards(&refs), &opts)
        .await
        .expect("run");

    assert!(store.peak_concurrency() <= 4, "peak {}", store.peak_concurrency());
    assert_eq!(report.result.counts.kind(ResourceKind::Dashboard).created, 30);
}

#[tokio::test]
async fn lingering_delete_is_polled_then_recreated() {
    let store = store_with(ResourceKind::Folder, &["f"]);
    store.linger_after_delete("f", 1);
    let opts = RunOptions {
        consistency: ConsistencyPolicy {
            poll_interval: Duration::ZERO,
            max_polls: 3,
        },
        ..options()
    };
    let source = MemorySource::from_records([record(ResourceKind::Folder, "f")]);

    let report = run(store.clone(), &source, &opts).await.expect("run");

    let fetches = store
        .calls()
        .into_iter()
        .filter(|c| matches!(c, StoreCall::Fetch(..)))
        .count();
    assert_eq!(fetches, 2);
    assert_eq!(report.result.counts.kind(ResourceKind::Folder).updated, 1);
}

#[tokio::test]
async fn empty_source_refuses_to_wipe_target() {
    let store = store_with(ResourceKind::Dashboard, &["A", "B"]);
    let err = run(store.clone(), &MemorySource::default(), &options())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::UnsafeMassDeletion { target: 2 }));
    assert!(store.mutations().is_empty());
}

#[tokio::test]
async fn empty_source_wipes_target_when_allowed() {
    let store = store_with(ResourceKind::Dashboard, &["A", "B"]);
    let opts = RunOptions {
        allow_empty_source: true,
        ..options()
    };
    let report = run(store.clone(), &MemorySource::default(), &opts)
        .await
        .expect("run");
    assert_eq!(report.result.counts.kind(ResourceKind::Dashboard).deleted, 2);
    assert!(store.uids(ResourceKind::Dashboard).is_empty());
}

#[rstest]
#[case(&["A", "B"], &["B", "C"], 1, 1, 1)]
#[case(&[], &["A"], 0, 0, 1)]
#[case(&["A"], &[], 0, 1, 0)]
#[case(&["A", "B"], &["A", "B"], 2, 0, 0)]
#[tokio::test]
async fn dry_run_plans_without_mutating(
    #[case] target: &[&str],
    #[case] source: &[&str],
    #[case] replace: usize,
    #[case] delete: usize,
    #[case] create: usize,
) {
    let store = store_with(ResourceKind::Dashboard, target);
    let result = plan(store.as_ref(), &dashboards(source), &options())
        .await
        .expect("plan");

    let dash = result.kind(ResourceKind::Dashboard).expect("dashboards");
    assert_eq!(
        (dash.to_replace, dash.to_delete, dash.to_create),
        (replace, delete, create)
    );
    assert!(store.mutations().is_empty());
}

#[tokio::test]
async fn dry_run_reports_blocked_empty_source() {
    let store = store_with(ResourceKind::Dashboard, &["A"]);
    let result = plan(store.as_ref(), &MemorySource::default(), &options())
        .await
        .expect("plan");
    assert!(result.blocked.is_some());
    assert!(store.mutations().is_empty());
}

#[tokio::test]
async fn reads_from_archive_on_disk() {
    let dir = tempfile::TempDir::new().expect("tmp");
    let dashboards = dir.path().join("dashboards");
    std::fs::create_dir_all(&dashboards).expect("mkdir");
    std::fs::write(
        dashboards.join("a.json"),
        r#"{"dashboard": {"uid": "a", "title": "A", "id": 7}, "meta": {"folderUid": "f"}}"#,
    )
    .expect("write");
    std::fs::write(dashboards.join("bad.json"), "{not json").expect("write");

    let store = Arc::new(MemoryStore::new());
    let source = ArchiveSource::open(dir.path()).expect("open");
    let report = run(store.clone(), &source, &options()).await.expect("run");

    let counts = report.result.counts.kind(ResourceKind::Dashboard);
    assert_eq!(counts.created, 1);
    assert_eq!(counts.failed, 1);
    assert_eq!(report.kind(ResourceKind::Dashboard).map(|k| k.source), Some(2));
    assert_eq!(store.list(ResourceKind::Dashboard).await.expect("list").len(), 1);
}
