pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod partition;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::loader::{config_root_dir, load_and_validate, status_file_path};
use crate::config::model::ConfigFile;
use crate::dag::{RunReport, Status, TargetGraph};
use crate::engine::worker::clean_target;
use crate::engine::{RunOptions, Runtime, RuntimeEvent};
use crate::errors::GeocompileError;
use crate::exec::{registry_from_config, DelegateRegistry};
use crate::store::{FileStatusStore, StatusStore};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and graph construction
/// - the shell-command delegates for every kind
/// - the status file
/// - the runtime and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let graph = Arc::new(TargetGraph::from_config(&cfg)?);
    let registry = registry_from_config(&cfg, Some(config_root_dir(&config_path)));
    registry.validate(&graph)?;
    let registry = Arc::new(registry);

    let status_path = status_file_path(&config_path, &cfg);
    debug!(path = %status_path.display(), "using status file");
    let store: Arc<dyn StatusStore> = Arc::new(FileStatusStore::open(status_path));

    match args.command {
        Command::Build {
            force,
            targets,
            workers,
            dry_run,
        } => {
            let options = build_options(&cfg, force, targets, workers);
            let runtime = Runtime::new(graph, store, registry, options);

            if dry_run {
                let plan = runtime.plan()?;
                print_plan(&plan);
                return Ok(());
            }

            let tx = runtime.event_sender();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                    return;
                }
                let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
            });

            let report = runtime.run().await?;
            print!("{report}");

            if !report.is_success() {
                let failed = report.with_outcome(dag::BuildOutcome::Failed);
                bail!("build failed for: {}", failed.join(", "));
            }
            Ok(())
        }
        Command::Status => {
            print_status(&graph, store.as_ref(), &registry)?;
            Ok(())
        }
        Command::Force { name } => {
            force_target(&graph, store.as_ref(), &name)?;
            println!("{name} marked {}", Status::Forced);
            Ok(())
        }
        Command::Clean { name } => {
            let runtime = Runtime::new(graph, store, registry, cfg.run_options());
            clean_target(runtime.context(), &name).await?;
            println!("{name} cleaned");
            Ok(())
        }
        Command::Graph => {
            print_graph(&graph);
            Ok(())
        }
    }
}

/// `[config]` options with command-line overrides applied.
fn build_options(
    cfg: &ConfigFile,
    force: Vec<String>,
    targets: Vec<String>,
    workers: Option<usize>,
) -> RunOptions {
    let mut options = cfg.run_options();
    for name in force {
        if !options.forced.contains(&name) {
            options.forced.push(name);
        }
    }
    options.targets = targets;
    if let Some(n) = workers {
        options.workers = n.max(1);
    }
    options
}

/// Persist `FORCED` for `name`. Forcing an already forced target is a no-op
/// in effect.
pub fn force_target(
    graph: &TargetGraph,
    store: &dyn StatusStore,
    name: &str,
) -> std::result::Result<(), GeocompileError> {
    if !graph.contains(name) {
        return Err(GeocompileError::UnknownTarget(name.to_string()));
    }
    let current = store.load_status(name)?;
    let next = current.transition(name, Status::Forced)?;
    store.save_status(name, next)?;
    info!(target_name = %name, from = %current, "target forced");
    Ok(())
}

fn print_plan(plan: &RunReport) {
    println!("geocompile dry-run");
    println!();
    for t in &plan.targets {
        let action = if t.outcome == dag::BuildOutcome::Built {
            "build"
        } else {
            "skip"
        };
        println!("  {:<6} {:<32} {}", action, t.name, t.effective);
    }
    debug!("dry-run complete (no execution)");
}

fn print_status(
    graph: &TargetGraph,
    store: &dyn StatusStore,
    registry: &DelegateRegistry,
) -> Result<()> {
    let snapshot = store.snapshot()?;

    for name in graph.topological_order() {
        let Some(target) = graph.target(name) else {
            continue;
        };
        let status = snapshot.get(name).copied().unwrap_or_default();
        let complex = if registry.is_complex(&target.kind) {
            " (complex)"
        } else {
            ""
        };
        println!("{:<32} {:<12} {}{}", name, status, target.kind, complex);

        for (sub, status) in snapshot
            .iter()
            .filter(|(sub, _)| is_subtarget_of(sub, name) && !graph.contains(sub))
        {
            println!("  {sub:<30} {status}");
        }
    }
    Ok(())
}

fn is_subtarget_of(candidate: &str, owner: &str) -> bool {
    candidate
        .strip_prefix(owner)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|rest| {
            let mut parts = rest.rsplitn(2, '_');
            matches!(
                (parts.next(), parts.next()),
                (Some(max), Some(min)) if max.parse::<i64>().is_ok() && min.parse::<i64>().is_ok()
            )
        })
}

fn print_graph(graph: &TargetGraph) {
    println!("targets ({}):", graph.len());
    for target in graph.vertices() {
        println!("  - {} [{}]", target.name, target.kind);
    }
    println!();
    println!("edges:");
    for (dependent, prerequisite) in graph.edges() {
        println!("  {dependent} -> {prerequisite}");
    }
}
