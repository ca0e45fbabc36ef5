use std::time::Duration;

/// Largest pool the barriers can track (one bit per worker).
pub const MAX_WORKERS: usize = 64;

/// Scheduler settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Worker thread count used by [`Scheduler::start`](crate::Scheduler::start).
    pub workers: usize,
    /// How long an idle worker sleeps before re-checking for shutdown.
    pub idle_poll: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            idle_poll: Duration::from_millis(240),
        }
    }
}

impl LoaderConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    /// One worker per available core, capped at [`MAX_WORKERS`].
    pub fn per_core() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4);
        Self::default().with_workers(cores.min(MAX_WORKERS))
    }
}
