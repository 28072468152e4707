// tests/config_validation.rs

use std::io::Write;

use geocompile::config::{load_and_validate, status_file_path, ConfigFile};
use geocompile::errors::GeocompileError;
use geocompile_test_utils::builders::{ConfigFileBuilder, KindConfigBuilder, TargetConfigBuilder};

fn assert_config_error(result: Result<ConfigFile, GeocompileError>, needle: &str) {
    match result {
        Err(GeocompileError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "expected '{needle}' in '{msg}'")
        }
        other => panic!("expected config error containing '{needle}', got {other:?}"),
    }
}

#[test]
fn empty_config_is_rejected() {
    let raw = ConfigFileBuilder::new().with_simple_kind("import").raw();
    assert_config_error(ConfigFile::try_from(raw), "at least one");
}

#[test]
fn zero_workers_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_simple_kind("import")
        .with_target("roads", TargetConfigBuilder::new("import").build())
        .workers(0)
        .raw();
    assert_config_error(ConfigFile::try_from(raw), "workers");
}

#[test]
fn unknown_kind_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_target("roads", TargetConfigBuilder::new("import").build())
        .raw();
    assert_config_error(ConfigFile::try_from(raw), "unknown kind");
}

#[test]
fn unknown_or_self_dependency_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_simple_kind("import")
        .with_target("roads", TargetConfigBuilder::new("import").after("rivers").build())
        .raw();
    assert!(ConfigFile::try_from(raw).is_err());

    let raw = ConfigFileBuilder::new()
        .with_simple_kind("import")
        .with_target("roads", TargetConfigBuilder::new("import").after("roads").build())
        .raw();
    assert!(ConfigFile::try_from(raw).is_err());
}

#[test]
fn unknown_forced_target_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_simple_kind("import")
        .with_target("roads", TargetConfigBuilder::new("import").build())
        .forced("rivers")
        .raw();
    assert_config_error(ConfigFile::try_from(raw), "rivers");
}

#[test]
fn complex_target_needs_ids_and_chunk_size() {
    let raw = ConfigFileBuilder::new()
        .with_complex_kind("tiles")
        .with_target("roads", TargetConfigBuilder::new("tiles").build())
        .raw();
    assert!(ConfigFile::try_from(raw).is_err());

    let raw = ConfigFileBuilder::new()
        .with_complex_kind("tiles")
        .with_target("roads", TargetConfigBuilder::new("tiles").span(1, 23, 0).build())
        .raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(GeocompileError::PartitionInvariant(_))
    ));
}

#[test]
fn subtarget_name_clashing_with_a_target_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_simple_kind("import")
        .with_complex_kind("tiles")
        .with_target("roads", TargetConfigBuilder::new("tiles").span(1, 23, 10).build())
        .with_target("roads_11_20", TargetConfigBuilder::new("import").build())
        .raw();
    assert_config_error(ConfigFile::try_from(raw), "roads_11_20");

    let raw = ConfigFileBuilder::new()
        .with_simple_kind("import")
        .with_complex_kind("tiles")
        .with_target("roads", TargetConfigBuilder::new("tiles").span(1, 23, 10).build())
        .with_target("roads_1_9", TargetConfigBuilder::new("import").build())
        .raw();
    assert!(ConfigFile::try_from(raw).is_ok());
}

#[test]
fn cycle_in_config_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_simple_kind("import")
        .with_target("a", TargetConfigBuilder::new("import").after("b").build())
        .with_target("b", TargetConfigBuilder::new("import").after("c").build())
        .with_target("c", TargetConfigBuilder::new("import").after("a").build())
        .raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(GeocompileError::CycleDetected { .. })
    ));
}

#[test]
fn valid_config_exposes_run_options_and_complex_targets() {
    let cfg = ConfigFileBuilder::new()
        .with_kind(
            "tiles",
            KindConfigBuilder::new("render")
                .merge("render --merge")
                .clean_all("rm -rf tiles")
                .build(),
        )
        .with_simple_kind("import")
        .with_target("boundaries", TargetConfigBuilder::new("import").build())
        .with_target(
            "roads",
            TargetConfigBuilder::new("tiles")
                .after("boundaries")
                .ids(&[3, 8, 21], 2)
                .build(),
        )
        .workers(8)
        .forced("boundaries")
        .build();

    let options = cfg.run_options();
    assert_eq!(options.workers, 8);
    assert_eq!(options.forced, vec!["boundaries".to_string()]);
    assert!(options.targets.is_empty());
    assert!(cfg.is_complex_target("roads"));
    assert!(!cfg.is_complex_target("boundaries"));
}

#[test]
fn toml_file_loads_and_resolves_status_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Geocompile.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        r#"
[config]
workers = 2

[kind.import]
cmd = "echo import"

[kind.tiles]
cmd = "echo tile $GEOCOMPILE_MIN $GEOCOMPILE_MAX"
merge = "echo merge"

[target.boundaries]
kind = "import"

[target.roads]
kind = "tiles"
after = ["boundaries"]
ids = {{ min = 1, max = 23 }}
chunk_size = 10
params = {{ table = "roads" }}
"#
    )
    .unwrap();

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.config.workers, 2);
    assert_eq!(cfg.target["roads"].chunk_size, Some(10));
    assert_eq!(cfg.target["roads"].params["table"], "roads");
    assert!(cfg.is_complex_target("roads"));

    assert_eq!(
        status_file_path(&path, &cfg),
        dir.path().join(".geocompile/status.toml")
    );
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Geocompile.toml");
    std::fs::write(&path, "[target.roads\nkind = ").unwrap();

    assert!(matches!(
        load_and_validate(&path),
        Err(GeocompileError::TomlError(_))
    ));
}
