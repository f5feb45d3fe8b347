//! Timeout adapter backed by one timer thread.
//!
//! ```text
//!   schedule() ──▶ deadline queue ──▶ "gatt-timer" thread
//!                   (BTreeMap)          sleeps on async_io_mini::Timer
//!                       ▲               or the wake signal, then runs
//!   cancel() ───────────┘               every due task
//! ```
//!
//! Every scheduled task shares the one thread, so scheduling cost does not
//! grow with the number of pending timeouts.  Canceling removes the task
//! from the queue at once and drops whatever it captured.

use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{debug, error};

use crate::lock;
use crate::ports::{TimeoutPort, TimeoutTask, TimeoutToken};

#[derive(Default)]
struct DeadlineQueue {
    tasks: BTreeMap<(Instant, u64), TimeoutTask>,
    deadlines: HashMap<u64, Instant>,
}

impl DeadlineQueue {
    fn insert(&mut self, id: u64, at: Instant, task: TimeoutTask) {
        self.tasks.insert((at, id), task);
        self.deadlines.insert(id, at);
    }

    fn remove(&mut self, id: u64) -> Option<TimeoutTask> {
        let at = self.deadlines.remove(&id)?;
        self.tasks.remove(&(at, id))
    }

    /// Pop every task due at `now`, in deadline order, and return the next
    /// deadline still pending.
    fn take_due(&mut self, now: Instant) -> (Vec<TimeoutTask>, Option<Instant>) {
        let later = self.tasks.split_off(&(now, u64::MAX));
        let due = std::mem::replace(&mut self.tasks, later);
        let mut ready = Vec::with_capacity(due.len());
        for ((_, id), task) in due {
            self.deadlines.remove(&id);
            ready.push(task);
        }
        let next = self.tasks.keys().next().map(|&(at, _)| at);
        (ready, next)
    }
}

struct Shared {
    queue: Mutex<DeadlineQueue>,
    wake: Signal<CriticalSectionRawMutex, ()>,
    stopping: AtomicBool,
}

/// Timeout adapter running every task on a single timer thread.
pub struct AsyncTimer {
    next_id: AtomicU64,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncTimer {
    /// Spawn the timer thread.
    pub fn start() -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(DeadlineQueue::default()),
            wake: Signal::new(),
            stopping: AtomicBool::new(false),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("gatt-timer".into())
            .spawn(move || future::block_on(run(&worker_shared)))?;
        Ok(Self {
            next_id: AtomicU64::new(0),
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Number of tasks scheduled and not yet run or canceled.
    pub fn armed_count(&self) -> usize {
        lock(&self.shared.queue).deadlines.len()
    }
}

impl TimeoutPort for AsyncTimer {
    fn schedule(&self, delay: Duration, task: TimeoutTask) -> TimeoutToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let at = Instant::now() + delay;
        lock(&self.shared.queue).insert(id, at, task);
        self.shared.wake.signal(());
        TimeoutToken(id)
    }

    fn cancel(&self, token: TimeoutToken) {
        let removed = lock(&self.shared.queue).remove(token.0);
        if removed.is_some() {
            self.shared.wake.signal(());
        }
    }
}

impl Drop for AsyncTimer {
    fn drop(&mut self) {
        self.shared.stopping.store(true, Ordering::Release);
        self.shared.wake.signal(());
        let Some(worker) = lock(&self.worker).take() else {
            return;
        };
        if worker.thread().id() == thread::current().id() {
            return;
        }
        if worker.join().is_err() {
            error!("timer: worker thread panicked");
        }
    }
}

async fn run(shared: &Shared) {
    debug!("timer: worker started");
    while !shared.stopping.load(Ordering::Acquire) {
        let (ready, next) = lock(&shared.queue).take_due(Instant::now());
        for task in ready {
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                error!("timer: task panicked");
            }
        }
        match next {
            Some(at) => {
                let sleep = async {
                    async_io_mini::Timer::after(at.saturating_duration_since(Instant::now()))
                        .await;
                };
                future::or(sleep, shared.wake.wait()).await;
            }
            None => shared.wake.wait().await,
        }
    }
    debug!("timer: worker stopped");
}
