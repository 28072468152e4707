// src/exec/pool.rs

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Bounds the number of build steps running at once.
///
/// Every unit of work (simple compile, split, subtarget compile, merge) runs
/// under one permit. A complex target waiting on its subtargets holds none.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// `size` is clamped to at least 1.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `work` once a permit is free.
    pub async fn run<F: Future>(&self, work: F) -> F::Output {
        // The semaphore is never closed, so acquiring cannot fail.
        let _permit = self.permits.acquire().await.ok();
        work.await
    }
}
