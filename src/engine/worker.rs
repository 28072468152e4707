// src/engine/worker.rs

//! Build of one scheduled target.
//!
//! The contract for every buildable target:
//! 1. mark dependents stored as `UPTODATE` as `OUTDATED`, then persist
//!    `CREATING` / `UPDATING`;
//! 2. run the build step (or the complex protocol);
//! 3. persist `COMPLETED` then `UPTODATE`, or `ERROR`.
//!
//! Only after step 3 is the completion reported to the runtime, so a
//! target's dependents are never considered before its outcome is durable.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::dag::{ScheduledTarget, Status, Target, TargetGraph};
use crate::engine::complex::{build_complex, clean_complex};
use crate::engine::{RuntimeEvent, StepOutcome};
use crate::errors::{GeocompileError, Result};
use crate::exec::{Delegate, DelegateRegistry, SingleFlight, WorkerPool};
use crate::store::StatusStore;

/// Result of one whole build attempt, shareable between coalesced callers.
type Attempt = std::result::Result<StepOutcome, Arc<GeocompileError>>;

/// Everything a worker needs, shared across all builds of a run.
#[derive(Clone)]
pub struct BuildContext {
    pub graph: Arc<TargetGraph>,
    pub store: Arc<dyn StatusStore>,
    pub registry: Arc<DelegateRegistry>,
    pub pool: WorkerPool,
    /// Single compile units: simple targets and subtargets, keyed by name.
    pub flights: SingleFlight<StepOutcome>,
    /// Whole build attempts (status writes included), keyed by target name.
    attempts: SingleFlight<Attempt>,
}

impl BuildContext {
    pub fn new(
        graph: Arc<TargetGraph>,
        store: Arc<dyn StatusStore>,
        registry: Arc<DelegateRegistry>,
        workers: usize,
    ) -> Self {
        Self {
            graph,
            store,
            registry,
            pool: WorkerPool::new(workers),
            flights: SingleFlight::new(),
            attempts: SingleFlight::new(),
        }
    }

    /// Persist a status, logging the transition.
    ///
    /// Stores do blocking IO, so the write runs on the blocking pool.
    pub async fn save(&self, target: &str, status: Status) -> Result<()> {
        debug!(target_name = %target, status = %status, "persisting status");
        let store = Arc::clone(&self.store);
        let name = target.to_string();
        tokio::task::spawn_blocking(move || store.save_status(&name, status))
            .await
            .map_err(|e| {
                GeocompileError::persistence(target, anyhow::anyhow!("status write task died: {e}"))
            })?
    }

    /// Invoke the simple build step of `target`.
    ///
    /// Concurrent calls for the same target name share one invocation.
    pub async fn compile(&self, target: &Target) -> StepOutcome {
        let step = match self.registry.for_target(target) {
            Ok(Delegate::Simple(step)) => Arc::clone(step),
            Ok(Delegate::Complex(_)) => {
                return StepOutcome::Failed(format!(
                    "target '{}' is complex and cannot be compiled as one unit",
                    target.name
                ));
            }
            Err(err) => return StepOutcome::Failed(err.to_string()),
        };

        let owned = target.clone();
        let pool = self.pool.clone();
        self.flights
            .run(&target.name, abandoned(), move || async move {
                pool.run(isolated(async move { step.compile(&owned).await }))
                    .await
            })
            .await
    }
}

pub(crate) fn abandoned() -> StepOutcome {
    StepOutcome::Failed("build attempt abandoned".to_string())
}

/// Run a build-step future on its own task so a panic inside the delegate
/// becomes a failed outcome instead of taking the worker down.
pub(crate) async fn isolated<F>(work: F) -> StepOutcome
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(res) => res.into(),
        Err(join) => StepOutcome::Failed(format!("build step panicked: {join}")),
    }
}

/// Worker task entry point: build `scheduled` and report to the runtime.
pub async fn run_worker(
    ctx: BuildContext,
    scheduled: ScheduledTarget,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let target = scheduled.name.clone();

    let event = match build_target(&ctx, &scheduled).await {
        Ok(outcome) => RuntimeEvent::TargetFinished { target, outcome },
        Err(error) => RuntimeEvent::BookkeepingFailed { target, error },
    };

    if runtime_tx.send(event).await.is_err() {
        debug!(target_name = %scheduled.name, "runtime gone; dropping completion");
    }
}

/// Three-phase build of one target.
///
/// `Err` only for bookkeeping failures (status store, illegal transition);
/// build-step failures come back as `Ok(StepOutcome::Failed)`.
///
/// At most one attempt per target name runs at a time. A request arriving
/// while one is in flight waits for it and returns its result without
/// touching the store or the delegate.
pub async fn build_target(ctx: &BuildContext, scheduled: &ScheduledTarget) -> Result<StepOutcome> {
    let attempt = ctx
        .attempts
        .run(&scheduled.name, Ok(abandoned()), || async {
            attempt_build(ctx, scheduled).await.map_err(Arc::new)
        })
        .await;

    attempt.map_err(|err| {
        Arc::try_unwrap(err).unwrap_or_else(|shared| {
            GeocompileError::Other(anyhow::anyhow!(
                "build of '{}' failed: {shared}",
                scheduled.name
            ))
        })
    })
}

async fn attempt_build(ctx: &BuildContext, scheduled: &ScheduledTarget) -> Result<StepOutcome> {
    let name = scheduled.name.as_str();
    let target = ctx
        .graph
        .target(name)
        .cloned()
        .ok_or_else(|| GeocompileError::UnknownTarget(name.to_string()))?;

    let in_progress = scheduled
        .effective
        .build_start(scheduled.stored)
        .ok_or(GeocompileError::IllegalTransition {
            target: name.to_string(),
            from: scheduled.effective,
            to: Status::Updating,
        })?;
    scheduled.effective.transition(name, in_progress)?;

    propagate_outdated(ctx, name).await?;
    ctx.save(name, in_progress).await?;

    info!(
        target_name = %name,
        kind = %target.kind,
        status = %in_progress,
        "building target"
    );

    let outcome = match ctx.registry.for_target(&target) {
        Ok(Delegate::Complex(step)) => {
            build_complex(ctx, &target, Arc::clone(step), scheduled.effective).await?
        }
        Ok(Delegate::Simple(_)) => ctx.compile(&target).await,
        Err(err) => StepOutcome::Failed(err.to_string()),
    };

    finish(ctx, name, in_progress, &outcome).await?;
    Ok(outcome)
}

/// Persist the terminal transition for a target or subtarget.
pub(crate) async fn finish(
    ctx: &BuildContext,
    name: &str,
    in_progress: Status,
    outcome: &StepOutcome,
) -> Result<()> {
    match outcome {
        StepOutcome::Success => {
            in_progress.transition(name, Status::Completed)?;
            ctx.save(name, Status::Completed).await?;
            ctx.save(name, Status::UpToDate).await?;
            info!(target_name = %name, "target up to date");
        }
        StepOutcome::Failed(message) => {
            in_progress.transition(name, Status::Error)?;
            error!(target_name = %name, error = %message, "build step failed");
            ctx.save(name, Status::Error).await?;
        }
    }
    Ok(())
}

/// `name` is leaving `UPTODATE`: every transitive dependent stored as
/// `UPTODATE` becomes `OUTDATED`, so an interrupted run cannot leave stale
/// dependents looking current.
async fn propagate_outdated(ctx: &BuildContext, name: &str) -> Result<()> {
    for dependent in ctx.graph.transitive_dependents(name) {
        if ctx.store.load_status(dependent)? == Status::UpToDate {
            debug!(target_name = %dependent, cause = %name, "marking dependent outdated");
            ctx.save(dependent, Status::Outdated).await?;
        }
    }
    Ok(())
}

/// Remove a target's artifact and reset its status to `MISSING`.
///
/// Complex targets clean every partition. Dependents stored as `UPTODATE`
/// become `OUTDATED`.
pub async fn clean_target(ctx: &BuildContext, name: &str) -> Result<()> {
    let target = ctx
        .graph
        .target(name)
        .cloned()
        .ok_or_else(|| GeocompileError::UnknownTarget(name.to_string()))?;

    match ctx.registry.for_target(&target)? {
        Delegate::Simple(step) => {
            step.clean(&target).await?;
        }
        Delegate::Complex(step) => {
            clean_complex(ctx, &target, &**step).await?;
        }
    }

    propagate_outdated(ctx, name).await?;
    ctx.save(name, Status::Missing).await?;
    info!(target_name = %name, "target cleaned");
    Ok(())
}
