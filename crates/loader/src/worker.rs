//! Loader worker: one thread draining a private, class-ordered job queue.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::barrier::Barrier;
use crate::decoder::DecoderRegistry;
use crate::error::Result;
use crate::job::{LoadClass, LoadingItem, sort_by_class};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkerState {
    Stopped,
    Waiting,
    Running,
}

impl WorkerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Waiting,
            2 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

struct Shared {
    id: usize,
    queue: Mutex<VecDeque<LoadingItem>>,
    wake: Condvar,
    running: AtomicBool,
    state: AtomicU8,
    direct: Arc<Barrier>,
    deferred: Arc<Barrier>,
    decoders: Arc<DecoderRegistry>,
    idle_poll: Duration,
}

impl Shared {
    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Publish readiness for every class the queue no longer holds.
    /// Called with the queue lock held; the queue is sorted, so Direct jobs
    /// can only sit at the front and Deferred jobs at the back.
    fn publish_readiness(&self, queue: &VecDeque<LoadingItem>) {
        if !queue.front().is_some_and(LoadingItem::is_direct) {
            self.direct.thread_ready(self.id);
        }
        if !queue
            .back()
            .is_some_and(|item| item.class() == LoadClass::Deferred)
        {
            self.deferred.thread_ready(self.id);
        }
    }
}

pub struct Worker {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start worker `id`; it reports to slot `id` of both barriers.
    pub(crate) fn spawn(
        id: usize,
        direct: Arc<Barrier>,
        deferred: Arc<Barrier>,
        decoders: Arc<DecoderRegistry>,
        idle_poll: Duration,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            id,
            queue: Mutex::new(VecDeque::new()),
            wake: Condvar::new(),
            running: AtomicBool::new(true),
            state: AtomicU8::new(WorkerState::Stopped as u8),
            direct,
            deferred,
            decoders,
            idle_poll,
        });

        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(format!("loader-{id}"))
            .spawn(move || run(thread_shared))?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    pub fn id(&self) -> usize {
        self.shared.id
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Jobs queued and not yet started.
    pub fn pending_jobs(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Queue `items`, keep the queue class-ordered and mark this worker busy on
    /// the barrier of every class it now holds.
    pub(crate) fn add_jobs(&self, items: impl IntoIterator<Item = LoadingItem>) {
        debug_assert!(self.shared.running.load(Ordering::Acquire));
        {
            let mut queue = self.shared.queue.lock();
            queue.extend(items);
            sort_by_class(queue.make_contiguous());

            if queue.front().is_some_and(LoadingItem::is_direct) {
                self.shared.direct.thread_working(self.shared.id);
            }
            if queue
                .back()
                .is_some_and(|item| item.class() == LoadClass::Deferred)
            {
                self.shared.deferred.thread_working(self.shared.id);
            }
        }
        self.shared.wake.notify_all();
    }

    /// Ask the loop to stop once its queue is drained.
    pub(crate) fn demand_to_finish(&self) {
        self.shared.running.store(false, Ordering::Release);
        let _queue = self.shared.queue.lock();
        self.shared.wake.notify_all();
    }

    /// Wait for the thread to exit. Returns `false` if it panicked.
    pub(crate) fn join(&mut self) -> bool {
        match self.thread.take() {
            Some(thread) => thread.join().is_ok(),
            None => true,
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("running", &self.thread.is_some())
            .finish()
    }
}

fn run(shared: Arc<Shared>) {
    log::debug!("Loader worker {} started", shared.id);
    let decoders: &DecoderRegistry = &shared.decoders;
    let mut queue = shared.queue.lock();

    loop {
        if let Some(item) = queue.pop_front() {
            shared.set_state(WorkerState::Running);
            // The job (and its resource handle) is gone before readiness is published.
            MutexGuard::unlocked(&mut queue, move || {
                item.execute(decoders);
            });
            shared.publish_readiness(&queue);
            continue;
        }

        shared.set_state(WorkerState::Waiting);
        shared.direct.thread_ready(shared.id);
        shared.deferred.thread_ready(shared.id);

        // Shutdown is honored only with an empty queue, so accepted jobs always run.
        if !shared.running.load(Ordering::Acquire) {
            break;
        }
        shared.wake.wait_for(&mut queue, shared.idle_poll);
    }

    shared.set_state(WorkerState::Stopped);
    debug_assert!(queue.is_empty());
    log::debug!("Loader worker {} stopped", shared.id);
}
