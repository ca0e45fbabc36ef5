//! Fixed worker pool with a two-tier wait: Direct jobs on `load_resources`,
//! everything on `synchronize`.

use std::sync::Arc;

use crate::barrier::Barrier;
use crate::config::{LoaderConfig, MAX_WORKERS};
use crate::decoder::DecoderRegistry;
use crate::error::{LoaderError, Result};
use crate::job::{LoadingItem, sort_by_class};
use crate::worker::{Worker, WorkerState};

struct Pool {
    workers: Vec<Worker>,
    direct: Arc<Barrier>,
    deferred: Arc<Barrier>,
}

/// Dispatches load jobs round-robin over a fixed set of [`Worker`]s.
pub struct Scheduler {
    config: LoaderConfig,
    decoders: Arc<DecoderRegistry>,
    pool: Option<Pool>,
}

impl Scheduler {
    /// Uninitialized scheduler with default settings.
    pub fn new(decoders: DecoderRegistry) -> Self {
        Self::with_config(decoders, LoaderConfig::default())
    }

    pub fn with_config(decoders: DecoderRegistry, config: LoaderConfig) -> Self {
        Self {
            config,
            decoders: Arc::new(decoders),
            pool: None,
        }
    }

    /// Build and initialize with `config.workers` workers.
    pub fn start(decoders: DecoderRegistry, config: LoaderConfig) -> Result<Self> {
        let workers = config.workers;
        let mut scheduler = Self::with_config(decoders, config);
        scheduler.initialize(workers)?;
        Ok(scheduler)
    }

    /// Start `workers` threads and wait until each one has reached its idle loop.
    pub fn initialize(&mut self, workers: usize) -> Result<()> {
        if self.pool.is_some() {
            return Err(LoaderError::LifecycleViolation("scheduler is already initialized"));
        }
        if workers == 0 {
            return Err(LoaderError::LifecycleViolation("scheduler needs at least one worker"));
        }
        if workers > MAX_WORKERS {
            return Err(LoaderError::LifecycleViolation("too many workers for the barrier mask"));
        }

        let direct = Arc::new(Barrier::new(workers));
        let deferred = Arc::new(Barrier::new(workers));
        let mut pool = Pool {
            workers: Vec::with_capacity(workers),
            direct: Arc::clone(&direct),
            deferred: Arc::clone(&deferred),
        };

        for id in 0..workers {
            // Cleared here, set by the worker's first idle pass.
            deferred.thread_working(id);
            match Worker::spawn(
                id,
                Arc::clone(&direct),
                Arc::clone(&deferred),
                Arc::clone(&self.decoders),
                self.config.idle_poll,
            ) {
                Ok(worker) => pool.workers.push(worker),
                Err(err) => {
                    log::error!("Failed to spawn loader worker {}: {}", id, err);
                    shutdown(&mut pool);
                    return Err(err);
                }
            }
        }

        deferred.synchronize();
        log::info!("Loader started with {} workers", workers);
        self.pool = Some(pool);
        Ok(())
    }

    /// Stop every worker once its queue is drained and join them.
    pub fn release(&mut self) -> Result<()> {
        let mut pool = self
            .pool
            .take()
            .ok_or(LoaderError::LifecycleViolation("release called before initialize"))?;
        shutdown(&mut pool);
        log::info!("Loader released");
        Ok(())
    }

    /// Queue `items` and return once every Direct item among them has executed.
    ///
    /// Items are stable-sorted by class, then the item at sorted position `k`
    /// goes to worker `k % n`. Deferred items may still be running on return.
    pub fn load_resources(&self, items: impl IntoIterator<Item = LoadingItem>) -> Result<()> {
        let pool = self.pool()?;
        let mut items: Vec<LoadingItem> = items.into_iter().collect();
        if items.is_empty() {
            return Ok(());
        }
        sort_by_class(&mut items);

        let direct = items.iter().filter(|item| item.is_direct()).count();
        log::debug!(
            "Dispatching {} jobs ({} direct) over {} workers",
            items.len(),
            direct,
            pool.workers.len()
        );

        for (worker, item) in pool.workers.iter().cycle().zip(items) {
            worker.add_jobs(std::iter::once(item));
        }

        pool.direct.synchronize();
        Ok(())
    }

    /// Return once every job submitted so far has executed.
    pub fn synchronize(&self) -> Result<()> {
        self.pool()?.deferred.synchronize();
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.is_some()
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn decoders(&self) -> &DecoderRegistry {
        &self.decoders
    }

    pub fn worker_count(&self) -> usize {
        self.pool.as_ref().map_or(0, |pool| pool.workers.len())
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.pool
            .as_ref()
            .map(|pool| pool.workers.iter().map(Worker::state).collect())
            .unwrap_or_default()
    }

    /// Queued, not yet started jobs per worker.
    pub fn pending_jobs(&self) -> Vec<usize> {
        self.pool
            .as_ref()
            .map(|pool| pool.workers.iter().map(Worker::pending_jobs).collect())
            .unwrap_or_default()
    }

    pub fn direct_barrier(&self) -> Option<&Barrier> {
        self.pool.as_ref().map(|pool| pool.direct.as_ref())
    }

    pub fn deferred_barrier(&self) -> Option<&Barrier> {
        self.pool.as_ref().map(|pool| pool.deferred.as_ref())
    }

    fn pool(&self) -> Result<&Pool> {
        self.pool
            .as_ref()
            .ok_or(LoaderError::LifecycleViolation("scheduler is not initialized"))
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(mut pool) = self.pool.take() {
            shutdown(&mut pool);
        }
    }
}

fn shutdown(pool: &mut Pool) {
    for worker in &pool.workers {
        worker.demand_to_finish();
    }
    for worker in &mut pool.workers {
        if !worker.join() {
            log::error!("Loader worker {} panicked", worker.id());
        }
    }
    pool.workers.clear();
}
