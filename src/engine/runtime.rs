// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dag::{BuildOutcome, RunReport, ScheduledTarget, Scheduler, Status, TargetGraph, TargetName};
use crate::errors::{GeocompileError, Result};
use crate::exec::DelegateRegistry;
use crate::store::StatusStore;

use super::worker::{run_worker, BuildContext};
use super::{RunOptions, RuntimeEvent};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Drives the pure [`Scheduler`] in response to `RuntimeEvent`s and spawns
/// one worker task per target handed out.
///
/// This is the IO shell of a build run: it loads and recovers statuses from
/// the store, runs workers on Tokio, and reacts to their (already
/// persisted) completions. Dropping the runtime mid-run abandons in-flight
/// workers; the next run recovers them from the stored statuses.
pub struct Runtime {
    ctx: BuildContext,
    options: RunOptions,
    event_tx: mpsc::Sender<RuntimeEvent>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("targets", &self.ctx.graph.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        graph: Arc<TargetGraph>,
        store: Arc<dyn StatusStore>,
        registry: Arc<DelegateRegistry>,
        options: RunOptions,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let ctx = BuildContext::new(graph, store, registry, options.workers);
        Self {
            ctx,
            options,
            event_tx,
            event_rx,
        }
    }

    /// Sender for external events such as a shutdown request.
    pub fn event_sender(&self) -> mpsc::Sender<RuntimeEvent> {
        self.event_tx.clone()
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    /// Stored statuses after load reclassification, without writing back.
    pub fn read_statuses(&self) -> Result<HashMap<TargetName, Status>> {
        let mut out = HashMap::with_capacity(self.ctx.graph.len());
        for target in self.ctx.graph.vertices() {
            let loaded = self.ctx.store.load_status(&target.name)?;
            let complex = self.ctx.registry.is_complex(&target.kind);
            out.insert(target.name.clone(), loaded.reclassify_on_load(complex));
        }
        Ok(out)
    }

    /// Reclassify every stored status and persist the ones that changed.
    ///
    /// A never-stored target becomes `MISSING` in memory only.
    pub fn recover_statuses(&self) -> Result<HashMap<TargetName, Status>> {
        let mut out = HashMap::with_capacity(self.ctx.graph.len());
        for target in self.ctx.graph.vertices() {
            let loaded = self.ctx.store.load_status(&target.name)?;
            let complex = self.ctx.registry.is_complex(&target.kind);
            let status = loaded.reclassify_on_load(complex);

            if status != loaded && loaded != Status::Unknown {
                info!(
                    target_name = %target.name,
                    from = %loaded,
                    to = %status,
                    "recovered status of interrupted target"
                );
                self.ctx.store.save_status(&target.name, status)?;
            }
            out.insert(target.name.clone(), status);
        }
        Ok(out)
    }

    /// Dry run: what a run would do if every build succeeded. Nothing is
    /// written to the store.
    pub fn plan(&self) -> Result<RunReport> {
        let stored = self.read_statuses()?;
        let scheduler = Scheduler::new(Arc::clone(&self.ctx.graph), &stored, &self.options)?;
        Ok(scheduler.plan())
    }

    /// Main event loop.
    ///
    /// - Recovers statuses and hands the first wave of targets to workers.
    /// - Feeds every completion into the scheduler and spawns what it
    ///   releases.
    /// - Returns the report once every target is terminal.
    ///
    /// Bookkeeping failures and shutdown requests end the run with `Err`.
    pub async fn run(mut self) -> Result<RunReport> {
        let stored = self.recover_statuses()?;
        let mut scheduler = Scheduler::new(Arc::clone(&self.ctx.graph), &stored, &self.options)?;
        let mut workers: JoinSet<()> = JoinSet::new();

        info!(
            targets = scheduler.order().len(),
            workers = self.ctx.pool.size(),
            "geocompile runtime started"
        );

        let step = scheduler.start();
        self.spawn_ready(&mut workers, step.newly_scheduled);
        if step.run_finished {
            info!("nothing to build");
            return Ok(scheduler.report());
        }

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    let Some(event) = event else {
                        warn!("runtime event channel closed; exiting");
                        break;
                    };
                    debug!(?event, "runtime received event");

                    match event {
                        RuntimeEvent::TargetFinished { target, outcome } => {
                            let step = scheduler.step_completion(&target, &outcome);
                            self.spawn_ready(&mut workers, step.newly_scheduled);
                            if step.run_finished {
                                break;
                            }
                        }
                        RuntimeEvent::BookkeepingFailed { target, error } => {
                            error!(target_name = %target, error = %error, "status bookkeeping failed; aborting run");
                            return Err(error);
                        }
                        RuntimeEvent::ShutdownRequested => {
                            warn!("shutdown requested; abandoning in-flight builds");
                            return Err(GeocompileError::Interrupted);
                        }
                    }
                }
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(err) = joined {
                        error!(error = %err, "worker task died");
                        return Err(GeocompileError::Other(anyhow::anyhow!(
                            "worker task died: {err}"
                        )));
                    }
                }
            }
        }

        let report = scheduler.report();
        info!(
            built = report.with_outcome(BuildOutcome::Built).len(),
            failed = report.with_outcome(BuildOutcome::Failed).len(),
            blocked = report.with_outcome(BuildOutcome::SkippedBlocked).len(),
            "runtime exiting"
        );
        Ok(report)
    }

    fn spawn_ready(&self, workers: &mut JoinSet<()>, targets: Vec<ScheduledTarget>) {
        if targets.is_empty() {
            return;
        }

        let names: Vec<_> = targets.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "spawning ready targets");

        for scheduled in targets {
            workers.spawn(run_worker(
                self.ctx.clone(),
                scheduled,
                self.event_tx.clone(),
            ));
        }
    }
}
