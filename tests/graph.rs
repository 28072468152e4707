// tests/graph.rs

use geocompile::dag::{Target, TargetGraph};
use geocompile::errors::GeocompileError;
use geocompile_test_utils::builders::{ConfigFileBuilder, TargetConfigBuilder};

fn graph_of(names: &[&str]) -> TargetGraph {
    let mut graph = TargetGraph::new();
    for name in names {
        graph.add_target(Target::new(*name, "import")).unwrap();
    }
    graph
}

fn position(order: &[&str], name: &str) -> usize {
    order.iter().position(|n| *n == name).unwrap()
}

#[test]
fn duplicate_target_is_rejected() {
    let mut graph = graph_of(&["roads"]);
    let err = graph.add_target(Target::new("roads", "tiles")).unwrap_err();
    assert!(matches!(err, GeocompileError::DuplicateTarget(name) if name == "roads"));
    assert_eq!(graph.len(), 1);
    assert_eq!(graph.target("roads").unwrap().kind, "import");
}

#[test]
fn dependency_on_unknown_target_is_rejected() {
    let mut graph = graph_of(&["roads"]);
    let err = graph.add_dependency("roads", "rivers").unwrap_err();
    assert!(matches!(err, GeocompileError::UnknownTarget(name) if name == "rivers"));
    assert_eq!(graph.edges().count(), 0);
}

#[test]
fn reverse_edge_is_rejected_and_graph_unchanged() {
    let mut graph = graph_of(&["A", "B"]);
    graph.add_dependency("A", "B").unwrap();

    let err = graph.add_dependency("B", "A").unwrap_err();
    assert!(matches!(err, GeocompileError::CycleDetected { .. }));

    assert_eq!(graph.edges().collect::<Vec<_>>(), vec![("A", "B")]);
    assert_eq!(graph.prerequisites_of("A"), vec!["B"]);
    assert!(graph.prerequisites_of("B").is_empty());
}

#[test]
fn transitive_cycle_and_self_edge_are_rejected() {
    let mut graph = graph_of(&["A", "B", "C"]);
    graph.add_dependency("A", "B").unwrap();
    graph.add_dependency("B", "C").unwrap();

    assert!(matches!(
        graph.add_dependency("C", "A"),
        Err(GeocompileError::CycleDetected { .. })
    ));
    assert!(matches!(
        graph.add_dependency("A", "A"),
        Err(GeocompileError::CycleDetected { .. })
    ));
    assert_eq!(graph.edges().count(), 2);
}

#[test]
fn duplicate_edge_is_idempotent() {
    let mut graph = graph_of(&["A", "B"]);
    graph.add_dependency("A", "B").unwrap();
    graph.add_dependency("A", "B").unwrap();
    assert_eq!(graph.edges().count(), 1);
    assert_eq!(graph.dependents_of("B"), vec!["A"]);
}

#[test]
fn topological_order_puts_prerequisites_first_with_insertion_tiebreak() {
    // roads and rivers both depend on boundaries; tiles on both.
    let mut graph = graph_of(&["tiles", "rivers", "roads", "boundaries"]);
    graph.add_dependency("tiles", "roads").unwrap();
    graph.add_dependency("tiles", "rivers").unwrap();
    graph.add_dependency("roads", "boundaries").unwrap();
    graph.add_dependency("rivers", "boundaries").unwrap();

    let order = graph.topological_order();
    assert_eq!(order, vec!["boundaries", "rivers", "roads", "tiles"]);

    for (from, to) in graph.edges() {
        assert!(position(&order, to) < position(&order, from), "{to} must precede {from}");
    }
}

#[test]
fn independent_targets_keep_insertion_order() {
    let graph = graph_of(&["c", "a", "b"]);
    assert_eq!(graph.topological_order(), vec!["c", "a", "b"]);
}

#[test]
fn transitive_dependents_and_prerequisite_closure() {
    let mut graph = graph_of(&["A", "B", "C", "D"]);
    graph.add_dependency("B", "A").unwrap();
    graph.add_dependency("C", "B").unwrap();

    assert_eq!(graph.transitive_dependents("A"), vec!["B", "C"]);
    assert!(graph.transitive_dependents("D").is_empty());

    let closure = graph.prerequisite_closure(&["C"]).unwrap();
    assert_eq!(closure.len(), 3);
    assert!(closure.contains("A") && closure.contains("B") && closure.contains("C"));
    assert!(!closure.contains("D"));

    assert!(matches!(
        graph.prerequisite_closure(&["nope"]),
        Err(GeocompileError::UnknownTarget(_))
    ));
}

#[test]
fn graph_from_config_exports_vertices_and_edges() {
    let cfg = ConfigFileBuilder::new()
        .with_simple_kind("import")
        .with_target("boundaries", TargetConfigBuilder::new("import").build())
        .with_target(
            "roads",
            TargetConfigBuilder::new("import")
                .after("boundaries")
                .param("table", "roads")
                .build(),
        )
        .build();

    let graph = TargetGraph::from_config(&cfg).unwrap();

    let names: Vec<_> = graph.vertices().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["boundaries", "roads"]);
    assert_eq!(graph.edges().collect::<Vec<_>>(), vec![("roads", "boundaries")]);
    assert_eq!(
        graph.target("roads").unwrap().params.get("table").map(String::as_str),
        Some("roads")
    );
}
