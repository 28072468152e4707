// tests/property_graph.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use geocompile::config::ConfigFile;
use geocompile::dag::{Scheduler, Status, Target, TargetGraph};
use geocompile::engine::{RunOptions, StepOutcome};
use geocompile::partition::partition;
use geocompile_test_utils::builders::{ConfigFileBuilder, TargetConfigBuilder};
use proptest::prelude::*;

// Strategy to generate a valid DAG configuration.
// Acyclic by construction: target N may only depend on targets 0..N-1.
fn dag_config_strategy(max_targets: usize) -> impl Strategy<Value = ConfigFile> {
    (1..=max_targets).prop_flat_map(|num_targets| {
        let deps_strat = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_targets),
            num_targets,
        );

        deps_strat.prop_map(move |raw_deps| {
            let mut builder = ConfigFileBuilder::new().with_simple_kind("import");
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let mut target = TargetConfigBuilder::new("import");
                let valid: HashSet<usize> = potential_deps
                    .into_iter()
                    .filter(|_| i > 0)
                    .map(|d| d % i)
                    .collect();
                for dep in valid {
                    target = target.after(&format!("t{dep:02}"));
                }
                builder = builder.with_target(&format!("t{i:02}"), target.build());
            }
            builder.build()
        })
    })
}

proptest! {
    #[test]
    fn topological_order_respects_every_edge(cfg in dag_config_strategy(12)) {
        let graph = TargetGraph::from_config(&cfg).unwrap();
        let order = graph.topological_order();
        prop_assert_eq!(order.len(), graph.len());

        let pos: HashMap<&str, usize> = order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        for (dependent, prerequisite) in graph.edges() {
            prop_assert!(pos[prerequisite] < pos[dependent]);
        }
    }

    #[test]
    fn rejected_edge_leaves_graph_unchanged(edges in proptest::collection::vec((0usize..6, 0usize..6), 0..30)) {
        let mut graph = TargetGraph::new();
        for i in 0..6 {
            graph.add_target(Target::new(format!("t{i}"), "import")).unwrap();
        }

        for (from, to) in edges {
            let before: Vec<(String, String)> = graph
                .edges()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect();
            let result = graph.add_dependency(&format!("t{from}"), &format!("t{to}"));
            let after: Vec<(String, String)> = graph
                .edges()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect();

            if result.is_err() {
                prop_assert_eq!(before, after);
            }
            prop_assert_eq!(graph.topological_order().len(), 6);
        }
    }

    #[test]
    fn scheduler_builds_each_target_once_after_its_prerequisites(cfg in dag_config_strategy(10)) {
        let graph = Arc::new(TargetGraph::from_config(&cfg).unwrap());
        let mut scheduler = Scheduler::new(Arc::clone(&graph), &HashMap::new(), &RunOptions::default()).unwrap();

        let mut built: Vec<String> = Vec::new();
        let mut queue = scheduler.start().newly_scheduled;
        while let Some(next) = queue.pop() {
            for prereq in graph.prerequisites_of(&next.name) {
                prop_assert!(built.iter().any(|b| b == prereq));
            }
            built.push(next.name.clone());
            queue.extend(scheduler.handle_completion(&next.name, &StepOutcome::Success));
        }

        prop_assert_eq!(built.len(), graph.len());
        prop_assert!(scheduler.is_finished());
        prop_assert!(scheduler.report().targets.iter().all(|t| t.status == Status::UpToDate));
    }

    #[test]
    fn partition_covers_every_id_exactly_once(
        ids in proptest::collection::btree_set(-1000i64..1000, 0..200),
        chunk in 1usize..25,
    ) {
        let ids: Vec<i64> = ids.into_iter().collect();
        let ranges = partition(ids.iter().copied(), chunk).unwrap();

        prop_assert_eq!(ranges.len(), ids.len().div_ceil(chunk));
        for id in ids.iter() {
            prop_assert_eq!(ranges.iter().filter(|r| r.contains(*id)).count(), 1);
        }
        for pair in ranges.windows(2) {
            prop_assert!(pair[0].max() < pair[1].min());
        }
        for range in ranges.iter() {
            let inside = ids.iter().filter(|id| range.contains(**id)).count();
            prop_assert!(inside >= 1 && inside <= chunk);
        }
    }
}
