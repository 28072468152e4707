// src/engine/complex.rs

//! Split / fan-out / merge protocol for complex targets.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dag::{Status, Subtarget, Target};
use crate::engine::worker::{abandoned, finish, isolated, BuildContext};
use crate::engine::StepOutcome;
use crate::errors::{GeocompileError, Result};
use crate::exec::ComplexBuildStep;

/// Build a complex target whose own in-progress status is already persisted.
///
/// A resumed build (effective `INCOMPLETE` or `ERROR`) keeps subtargets that
/// are stored `UPTODATE`; any other build redoes every partition. Subtargets
/// run concurrently under the worker pool and a failure does not stop its
/// siblings. `merge` runs only when every subtarget is up to date.
///
/// `Err` is reserved for bookkeeping failures.
pub async fn build_complex(
    ctx: &BuildContext,
    target: &Target,
    step: Arc<dyn ComplexBuildStep>,
    effective: Status,
) -> Result<StepOutcome> {
    let resume = matches!(effective, Status::Incomplete | Status::Error);

    let subtargets = match split(ctx, target, &step).await {
        Ok(subs) => subs,
        Err(err) => {
            warn!(target_name = %target.name, error = %err, "split failed");
            return Ok(StepOutcome::Failed(err.to_string()));
        }
    };
    let total = subtargets.len();

    let mut pending: JoinSet<(Subtarget, Status, StepOutcome)> = JoinSet::new();
    let mut skipped = 0usize;

    for sub in subtargets {
        let loaded = ctx.store.load_status(&sub.name)?;
        let stored = loaded.reclassify_on_load(false);

        if resume && stored == Status::UpToDate {
            if loaded != stored {
                ctx.save(&sub.name, stored).await?;
            }
            debug!(subtarget = %sub.name, "subtarget already up to date; skipping");
            skipped += 1;
            continue;
        }

        let prior = match stored {
            Status::Missing => Status::Missing,
            s if resume && s.needs_build() => s,
            _ => Status::Outdated,
        };
        let in_progress = if prior == Status::Missing {
            Status::Creating
        } else {
            Status::Updating
        };
        prior.transition(&sub.name, in_progress)?;
        ctx.save(&sub.name, in_progress).await?;

        let step = Arc::clone(&step);
        let pool = ctx.pool.clone();
        let flights = ctx.flights.clone();
        pending.spawn(async move {
            let work_sub = sub.clone();
            let outcome = flights
                .run(&sub.name, abandoned(), move || async move {
                    pool.run(isolated(async move { step.compile_subtarget(&work_sub).await }))
                        .await
                })
                .await;
            (sub, in_progress, outcome)
        });
    }

    info!(
        target_name = %target.name,
        subtargets = total,
        skipped,
        building = pending.len(),
        resume,
        "fanned out subtargets"
    );

    let mut failed = 0usize;
    while let Some(joined) = pending.join_next().await {
        let (sub, in_progress, outcome) = joined.map_err(|e| {
            GeocompileError::Other(anyhow::anyhow!("subtarget task of '{}' lost: {e}", target.name))
        })?;
        finish(ctx, &sub.name, in_progress, &outcome).await?;
        if !outcome.is_success() {
            failed += 1;
        }
    }

    if failed > 0 {
        warn!(
            target_name = %target.name,
            failed,
            total,
            "subtargets failed; skipping merge"
        );
        return Ok(StepOutcome::Failed(format!(
            "{failed} of {total} subtargets of '{}' failed",
            target.name
        )));
    }

    info!(target_name = %target.name, "all subtargets up to date; merging");
    let merge_step = Arc::clone(&step);
    let owned = target.clone();
    Ok(ctx
        .pool
        .run(isolated(async move { merge_step.merge(&owned).await }))
        .await)
}

/// Remove every partition of `target` and reset their statuses to `MISSING`.
pub async fn clean_complex(
    ctx: &BuildContext,
    target: &Target,
    step: &dyn ComplexBuildStep,
) -> Result<()> {
    let subtargets = step.split(target).await?;
    step.clean_all(target).await?;

    for sub in subtargets.iter() {
        ctx.save(&sub.name, Status::Missing).await?;
    }
    info!(target_name = %target.name, subtargets = subtargets.len(), "cleaned all partitions");
    Ok(())
}

/// Call the delegate's split under a worker permit and check that the
/// subtarget names identify partitions uniquely, among themselves and
/// against the targets of the graph.
async fn split(
    ctx: &BuildContext,
    target: &Target,
    step: &Arc<dyn ComplexBuildStep>,
) -> Result<Vec<Subtarget>> {
    let step = Arc::clone(step);
    let owned = target.clone();
    let name = target.name.clone();
    let subs = ctx
        .pool
        .run(async move {
            match tokio::spawn(async move { step.split(&owned).await }).await {
                Ok(res) => res,
                Err(join) => Err(GeocompileError::build_step(
                    &name,
                    format!("split panicked: {join}"),
                )),
            }
        })
        .await?;

    let mut seen = HashSet::new();
    for sub in subs.iter() {
        if !seen.insert(sub.name.as_str()) {
            return Err(GeocompileError::PartitionInvariant(format!(
                "split of '{}' produced subtarget '{}' twice",
                target.name, sub.name
            )));
        }
        if ctx.graph.contains(&sub.name) {
            return Err(GeocompileError::PartitionInvariant(format!(
                "subtarget '{}' of '{}' shares its name with a target",
                sub.name, target.name
            )));
        }
    }

    Ok(subs)
}
