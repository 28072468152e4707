// tests/shell_step.rs

#![cfg(unix)]

use std::sync::Arc;

use geocompile::dag::{IdSpec, Status, Target};
use geocompile::engine::RunOptions;
use geocompile::exec::{registry_from_config, BuildStep, ComplexBuildStep, ShellStep};
use geocompile::store::{MemoryStatusStore, StatusStore};
use geocompile_test_utils::builders::{ConfigFileBuilder, KindConfigBuilder, TargetConfigBuilder};
use geocompile_test_utils::{init_tracing, runtime_for, with_timeout};

#[tokio::test]
async fn compile_sees_target_environment() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let step = ShellStep::new(
        "import",
        KindConfigBuilder::new("echo \"$GEOCOMPILE_TARGET $GEOCOMPILE_KIND $GEOCOMPILE_PARAM_TABLE\" > out.txt").build(),
    )
    .with_workdir(dir.path());

    let target = Target::new("roads", "import").with_param("table", "osm_roads");
    step.compile(&target).await.unwrap();

    let out = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
    assert_eq!(out.trim(), "roads import osm_roads");
}

#[tokio::test]
async fn non_zero_exit_is_a_build_step_error() {
    init_tracing();
    let step = ShellStep::new("import", KindConfigBuilder::new("exit 3").build());
    let err = step.compile(&Target::new("roads", "import")).await.unwrap_err();
    assert!(!err.is_fatal());
    assert!(err.to_string().contains("roads"), "{err}");
}

#[tokio::test]
async fn subtarget_compile_sees_range_bounds() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let step = ShellStep::new(
        "tiles",
        KindConfigBuilder::new("echo \"$GEOCOMPILE_OWNER $GEOCOMPILE_MIN $GEOCOMPILE_MAX\" >> parts.txt")
            .merge("cat parts.txt | wc -l > merged.txt")
            .build(),
    )
    .with_workdir(dir.path());

    let target = Target::new("roads", "tiles").with_ids(IdSpec::Span { min: 1, max: 23 }, 10);
    let subs = ComplexBuildStep::split(&step, &target).await.unwrap();
    assert_eq!(subs.len(), 3);
    for sub in subs.iter() {
        step.compile_subtarget(sub).await.unwrap();
    }
    ComplexBuildStep::merge(&step, &target).await.unwrap();

    let parts = std::fs::read_to_string(dir.path().join("parts.txt")).unwrap();
    assert_eq!(
        parts.lines().collect::<Vec<_>>(),
        vec!["roads 1 10", "roads 11 20", "roads 21 23"]
    );
    let merged = std::fs::read_to_string(dir.path().join("merged.txt")).unwrap();
    assert_eq!(merged.trim(), "3");
}

#[tokio::test]
async fn configured_kinds_build_end_to_end() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cfg = ConfigFileBuilder::new()
        .with_kind("import", KindConfigBuilder::new("touch \"$GEOCOMPILE_TARGET\"").build())
        .with_kind(
            "tiles",
            KindConfigBuilder::new("touch \"$GEOCOMPILE_TARGET\"")
                .merge("touch \"$GEOCOMPILE_TARGET.merged\"")
                .build(),
        )
        .with_target("boundaries", TargetConfigBuilder::new("import").build())
        .with_target(
            "roads",
            TargetConfigBuilder::new("tiles").after("boundaries").span(1, 5, 2).build(),
        )
        .build();

    let registry = registry_from_config(&cfg, Some(dir.path().to_path_buf()));
    assert!(registry.is_complex("tiles"));
    let store = Arc::new(MemoryStatusStore::new());
    let runtime = runtime_for(&cfg, registry, store.clone(), RunOptions::default());

    let report = with_timeout(runtime.run()).await.unwrap();

    assert!(report.is_success(), "{report}");
    for file in ["boundaries", "roads_1_2", "roads_3_4", "roads_5_5", "roads.merged"] {
        assert!(dir.path().join(file).exists(), "{file} missing");
    }
    assert_eq!(store.load_status("roads_5_5").unwrap(), Status::UpToDate);
}
