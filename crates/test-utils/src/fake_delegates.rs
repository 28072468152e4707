#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use geocompile::dag::{Subtarget, Target};
use geocompile::errors::GeocompileError;
use geocompile::exec::{BuildStep, ComplexBuildStep, StepFuture};

/// Tracks how many calls are running at once and the highest value seen.
#[derive(Debug, Default, Clone)]
pub struct Gauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// A fake simple build step that:
/// - records every compile and clean call, in order
/// - fails (or panics) for configured target names
/// - optionally sleeps inside compile so calls overlap.
#[derive(Debug, Default, Clone)]
pub struct RecordingStep {
    compiled: Arc<Mutex<Vec<String>>>,
    cleaned: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay: Option<Duration>,
    gauge: Gauge,
}

impl RecordingStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn panicking(mut self, name: &str) -> Self {
        self.panicking.insert(name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Names passed to `compile`, in call order.
    pub fn compiled(&self) -> Vec<String> {
        self.compiled.lock().unwrap().clone()
    }

    pub fn compile_count(&self, name: &str) -> usize {
        self.compiled().iter().filter(|n| *n == name).count()
    }

    pub fn cleaned(&self) -> Vec<String> {
        self.cleaned.lock().unwrap().clone()
    }

    /// Highest number of compiles observed running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.gauge.peak()
    }
}

impl BuildStep for RecordingStep {
    fn compile<'a>(&'a self, target: &'a Target) -> StepFuture<'a, ()> {
        Box::pin(async move {
            self.gauge.enter();
            self.compiled.lock().unwrap().push(target.name.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.gauge.exit();

            if self.panicking.contains(&target.name) {
                panic!("simulated panic in build step for {}", target.name);
            }
            if self.failing.contains(&target.name) {
                return Err(GeocompileError::build_step(
                    target.name.clone(),
                    "simulated failure",
                ));
            }
            Ok(())
        })
    }

    fn clean<'a>(&'a self, target: &'a Target) -> StepFuture<'a, ()> {
        Box::pin(async move {
            self.cleaned.lock().unwrap().push(target.name.clone());
            Ok(())
        })
    }
}

/// A fake complex build step that:
/// - splits with the target's own `ids` / `chunk_size`
/// - records compiled subtargets, merges and cleans
/// - fails configured subtargets (by subtarget name) or the merge.
#[derive(Debug, Default, Clone)]
pub struct FakeComplexStep {
    splits: Arc<AtomicUsize>,
    compiled: Arc<Mutex<Vec<String>>>,
    merged: Arc<Mutex<Vec<String>>>,
    cleaned: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
    fail_merge: bool,
    duplicate_split: bool,
    delay: Option<Duration>,
    gauge: Gauge,
}

impl FakeComplexStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_subtarget(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn failing_merge(mut self) -> Self {
        self.fail_merge = true;
        self
    }

    /// Make `split` return its first subtarget twice.
    pub fn duplicating_split(mut self) -> Self {
        self.duplicate_split = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn split_count(&self) -> usize {
        self.splits.load(Ordering::SeqCst)
    }

    /// Subtarget names passed to `compile_subtarget`, in call order.
    pub fn compiled(&self) -> Vec<String> {
        self.compiled.lock().unwrap().clone()
    }

    pub fn merged(&self) -> Vec<String> {
        self.merged.lock().unwrap().clone()
    }

    pub fn cleaned(&self) -> Vec<String> {
        self.cleaned.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.gauge.peak()
    }
}

impl ComplexBuildStep for FakeComplexStep {
    fn split<'a>(&'a self, target: &'a Target) -> StepFuture<'a, Vec<Subtarget>> {
        Box::pin(async move {
            self.splits.fetch_add(1, Ordering::SeqCst);
            let mut subs = target.split_by_ids()?;
            if self.duplicate_split {
                if let Some(first) = subs.first().cloned() {
                    subs.push(first);
                }
            }
            Ok(subs)
        })
    }

    fn compile_subtarget<'a>(&'a self, subtarget: &'a Subtarget) -> StepFuture<'a, ()> {
        Box::pin(async move {
            self.gauge.enter();
            self.compiled.lock().unwrap().push(subtarget.name.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.gauge.exit();

            if self.failing.contains(&subtarget.name) {
                return Err(GeocompileError::build_step(
                    subtarget.name.clone(),
                    "simulated subtarget failure",
                ));
            }
            Ok(())
        })
    }

    fn clean_subtarget<'a>(&'a self, subtarget: &'a Subtarget) -> StepFuture<'a, ()> {
        Box::pin(async move {
            self.cleaned.lock().unwrap().push(subtarget.name.clone());
            Ok(())
        })
    }

    fn merge<'a>(&'a self, target: &'a Target) -> StepFuture<'a, ()> {
        Box::pin(async move {
            self.merged.lock().unwrap().push(target.name.clone());
            if self.fail_merge {
                return Err(GeocompileError::build_step(
                    target.name.clone(),
                    "simulated merge failure",
                ));
            }
            Ok(())
        })
    }

    fn clean_all<'a>(&'a self, target: &'a Target) -> StepFuture<'a, ()> {
        Box::pin(async move {
            self.cleaned.lock().unwrap().push(target.name.clone());
            Ok(())
        })
    }
}
