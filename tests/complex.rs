// tests/complex.rs

use std::sync::Arc;
use std::time::Duration;

use geocompile::config::ConfigFile;
use geocompile::dag::{BuildOutcome, IdSpec, ScheduledTarget, Status, Target, TargetGraph};
use geocompile::engine::worker::{build_target, clean_target};
use geocompile::engine::{BuildContext, RunOptions, StepOutcome};
use geocompile::exec::DelegateRegistry;
use geocompile::store::{MemoryStatusStore, StatusStore};
use geocompile_test_utils::builders::{ConfigFileBuilder, TargetConfigBuilder};
use geocompile_test_utils::fake_delegates::{FakeComplexStep, RecordingStep};
use geocompile_test_utils::{init_tracing, runtime_for, with_timeout};

const SUBTARGETS: [&str; 3] = ["roads_1_10", "roads_11_20", "roads_21_23"];

/// `roads` is complex over ids 1..=23 in chunks of 10; `export` depends on it.
fn roads_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_simple_kind("export")
        .with_complex_kind("tiles")
        .with_target("roads", TargetConfigBuilder::new("tiles").span(1, 23, 10).build())
        .with_target("export", TargetConfigBuilder::new("export").after("roads").build())
        .build()
}

fn registry_with(complex: &FakeComplexStep, simple: &RecordingStep) -> DelegateRegistry {
    let mut registry = DelegateRegistry::new();
    registry.register_complex("tiles", Arc::new(complex.clone()));
    registry.register_simple("export", Arc::new(simple.clone()));
    registry
}

fn seeded(pairs: &[(&str, Status)]) -> Arc<MemoryStatusStore> {
    Arc::new(MemoryStatusStore::with_statuses(
        pairs.iter().map(|(n, s)| (n.to_string(), *s)),
    ))
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

#[tokio::test]
async fn fresh_build_compiles_every_partition_then_merges() {
    init_tracing();
    let complex = FakeComplexStep::new();
    let simple = RecordingStep::new();
    let store = Arc::new(MemoryStatusStore::new());
    let runtime = runtime_for(&roads_config(), registry_with(&complex, &simple), store.clone(), RunOptions::default());

    let report = with_timeout(runtime.run()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(complex.split_count(), 1);
    assert_eq!(sorted(complex.compiled()), sorted(SUBTARGETS.map(String::from).to_vec()));
    assert_eq!(complex.merged(), vec!["roads".to_string()]);
    assert_eq!(simple.compiled(), vec!["export".to_string()]);

    for name in SUBTARGETS.iter().chain(["roads", "export"].iter()) {
        assert_eq!(store.load_status(name).unwrap(), Status::UpToDate, "{name}");
    }
}

#[tokio::test]
async fn failed_subtarget_skips_merge_and_resume_retries_only_it() {
    init_tracing();
    let store = Arc::new(MemoryStatusStore::new());
    let simple = RecordingStep::new();

    // First run: one partition fails.
    let complex = FakeComplexStep::new().failing_subtarget("roads_11_20");
    let runtime = runtime_for(&roads_config(), registry_with(&complex, &simple), store.clone(), RunOptions::default());
    let report = with_timeout(runtime.run()).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.outcome_of("roads"), Some(BuildOutcome::Failed));
    assert_eq!(report.outcome_of("export"), Some(BuildOutcome::SkippedBlocked));
    assert_eq!(complex.compiled().len(), 3, "siblings still finish");
    assert!(complex.merged().is_empty());
    assert_eq!(store.load_status("roads").unwrap(), Status::Error);
    assert_eq!(store.load_status("roads_1_10").unwrap(), Status::UpToDate);
    assert_eq!(store.load_status("roads_11_20").unwrap(), Status::Error);
    assert_eq!(store.load_status("roads_21_23").unwrap(), Status::UpToDate);

    // Second run: only the failed partition is rebuilt, then merge.
    let complex = FakeComplexStep::new();
    let runtime = runtime_for(&roads_config(), registry_with(&complex, &simple), store.clone(), RunOptions::default());
    let report = with_timeout(runtime.run()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(complex.compiled(), vec!["roads_11_20".to_string()]);
    assert_eq!(complex.merged(), vec!["roads".to_string()]);
    assert_eq!(store.load_status("roads").unwrap(), Status::UpToDate);
    assert_eq!(store.load_status("roads_11_20").unwrap(), Status::UpToDate);
    assert_eq!(simple.compiled(), vec!["export".to_string()]);
}

#[tokio::test]
async fn interrupted_complex_target_resumes_as_incomplete() {
    init_tracing();
    let store = seeded(&[
        ("roads", Status::Updating),
        ("roads_1_10", Status::UpToDate),
        ("roads_11_20", Status::Creating),
        ("roads_21_23", Status::Completed),
        ("export", Status::UpToDate),
    ]);
    let complex = FakeComplexStep::new();
    let simple = RecordingStep::new();
    let runtime = runtime_for(&roads_config(), registry_with(&complex, &simple), store.clone(), RunOptions::default());

    let recovered = runtime.recover_statuses().unwrap();
    assert_eq!(recovered["roads"], Status::Incomplete);

    let report = with_timeout(runtime.run()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.get("roads").unwrap().effective, Status::Incomplete);
    assert_eq!(complex.compiled(), vec!["roads_11_20".to_string()]);
    assert_eq!(complex.merged(), vec!["roads".to_string()]);
    assert_eq!(store.load_status("roads_21_23").unwrap(), Status::UpToDate);
    // export was up to date but its prerequisite was rebuilt.
    assert_eq!(simple.compiled(), vec!["export".to_string()]);
}

#[tokio::test]
async fn forced_complex_target_rebuilds_every_partition() {
    init_tracing();
    let store = seeded(&[
        ("roads", Status::UpToDate),
        ("roads_1_10", Status::UpToDate),
        ("roads_11_20", Status::UpToDate),
        ("roads_21_23", Status::UpToDate),
        ("export", Status::UpToDate),
    ]);
    let complex = FakeComplexStep::new();
    let simple = RecordingStep::new();
    let options = RunOptions {
        forced: vec!["roads".to_string()],
        ..RunOptions::default()
    };
    let runtime = runtime_for(&roads_config(), registry_with(&complex, &simple), store.clone(), options);

    let report = with_timeout(runtime.run()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(complex.compiled().len(), 3);
    assert_eq!(complex.merged().len(), 1);
}

#[tokio::test]
async fn merge_failure_marks_owner_error() {
    init_tracing();
    let complex = FakeComplexStep::new().failing_merge();
    let simple = RecordingStep::new();
    let store = Arc::new(MemoryStatusStore::new());
    let runtime = runtime_for(&roads_config(), registry_with(&complex, &simple), store.clone(), RunOptions::default());

    let report = with_timeout(runtime.run()).await.unwrap();

    assert_eq!(report.outcome_of("roads"), Some(BuildOutcome::Failed));
    assert_eq!(store.load_status("roads").unwrap(), Status::Error);
    for name in SUBTARGETS {
        assert_eq!(store.load_status(name).unwrap(), Status::UpToDate, "{name}");
    }
    assert!(simple.compiled().is_empty());
}

#[tokio::test]
async fn duplicate_subtarget_names_fail_the_owner() {
    init_tracing();
    let complex = FakeComplexStep::new().duplicating_split();
    let simple = RecordingStep::new();
    let store = Arc::new(MemoryStatusStore::new());
    let runtime = runtime_for(&roads_config(), registry_with(&complex, &simple), store.clone(), RunOptions::default());

    let report = with_timeout(runtime.run()).await.unwrap();

    assert_eq!(report.outcome_of("roads"), Some(BuildOutcome::Failed));
    assert!(complex.compiled().is_empty());
    assert!(complex.merged().is_empty());
    assert_eq!(store.load_status("roads").unwrap(), Status::Error);
}

#[tokio::test]
async fn subtargets_share_the_worker_limit() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_complex_kind("tiles")
        .with_target("roads", TargetConfigBuilder::new("tiles").span(1, 50, 10).build())
        .build();
    let complex = FakeComplexStep::new().with_delay(Duration::from_millis(30));
    let mut registry = DelegateRegistry::new();
    registry.register_complex("tiles", Arc::new(complex.clone()));
    let options = RunOptions {
        workers: 2,
        ..RunOptions::default()
    };
    let runtime = runtime_for(&cfg, registry, Arc::new(MemoryStatusStore::new()), options);

    let report = with_timeout(runtime.run()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(complex.compiled().len(), 5);
    assert!(complex.peak_concurrency() <= 2, "peak {}", complex.peak_concurrency());
}

#[tokio::test]
async fn clean_resets_owner_and_every_partition() {
    init_tracing();
    let store = seeded(&[
        ("roads", Status::UpToDate),
        ("roads_1_10", Status::UpToDate),
        ("roads_11_20", Status::UpToDate),
        ("roads_21_23", Status::UpToDate),
        ("export", Status::UpToDate),
    ]);
    let complex = FakeComplexStep::new();
    let simple = RecordingStep::new();
    let runtime = runtime_for(&roads_config(), registry_with(&complex, &simple), store.clone(), RunOptions::default());

    clean_target(runtime.context(), "roads").await.unwrap();

    assert_eq!(complex.cleaned(), vec!["roads".to_string()]);
    assert_eq!(store.load_status("roads").unwrap(), Status::Missing);
    for name in SUBTARGETS {
        assert_eq!(store.load_status(name).unwrap(), Status::Missing, "{name}");
    }
    assert_eq!(store.load_status("export").unwrap(), Status::Outdated);
}

#[tokio::test]
async fn subtarget_named_like_a_target_fails_the_split() {
    init_tracing();
    let mut graph = TargetGraph::new();
    graph
        .add_target(Target::new("roads", "tiles").with_ids(IdSpec::Span { min: 1, max: 23 }, 10))
        .unwrap();
    graph.add_target(Target::new("roads_1_10", "export")).unwrap();

    let complex = FakeComplexStep::new();
    let simple = RecordingStep::new();
    let store = Arc::new(MemoryStatusStore::new());
    let ctx = BuildContext::new(
        Arc::new(graph),
        store.clone(),
        Arc::new(registry_with(&complex, &simple)),
        4,
    );
    let scheduled = ScheduledTarget {
        name: "roads".to_string(),
        effective: Status::Missing,
        stored: Status::Missing,
    };

    let outcome = with_timeout(build_target(&ctx, &scheduled)).await.unwrap();

    match outcome {
        StepOutcome::Failed(msg) => assert!(msg.contains("roads_1_10"), "{msg}"),
        other => panic!("expected failed split, got {other:?}"),
    }
    assert!(complex.compiled().is_empty());
    assert!(complex.merged().is_empty());
    assert_eq!(store.load_status("roads").unwrap(), Status::Error);
    assert_eq!(store.load_status("roads_1_10").unwrap(), Status::Unknown);
}
