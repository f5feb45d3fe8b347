//! Serialized callback delivery.
//!
//! Every externally visible callback runs on one dedicated thread, in the
//! order it was posted.  Producers (caller threads, the radio event
//! thread, timer threads) never block: `post` enqueues and returns.
//!
//! ```text
//!  caller threads ─┐
//!  radio events  ──┼──▶ Channel (bounded) ──▶ dispatcher thread ──▶ callback
//!  timers        ──┘        └─ overflow ─────────┘
//! ```
//!
//! The channel is an `embassy-sync` MPMC channel drained by
//! `futures_lite::future::block_on` on the dispatcher thread.  When it is
//! full, posts spill into an overflow queue that the dispatcher drains
//! before awaiting again; FIFO order holds across both.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::{debug, error, warn};

use crate::lock;

/// Channel depth before posts spill into the overflow queue.
const DISPATCH_DEPTH: usize = 64;

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Delivery {
    Run(Task),
    Stop,
}

struct Queue {
    channel: Channel<CriticalSectionRawMutex, Delivery, DISPATCH_DEPTH>,
    overflow: Mutex<VecDeque<Delivery>>,
}

impl Queue {
    fn push(&self, delivery: Delivery) {
        let mut overflow = lock(&self.overflow);
        if !overflow.is_empty() {
            overflow.push_back(delivery);
            return;
        }
        if let Err(embassy_sync::channel::TrySendError::Full(delivery)) =
            self.channel.try_send(delivery)
        {
            debug!("dispatch: channel full, spilling to overflow");
            overflow.push_back(delivery);
        }
    }

    fn try_pop(&self) -> Option<Delivery> {
        if let Ok(d) = self.channel.try_receive() {
            return Some(d);
        }
        lock(&self.overflow).pop_front()
    }
}

/// Single-consumer delivery thread shared by a pool and all its
/// connections.
pub struct CallbackDispatcher {
    queue: Arc<Queue>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    stopped: AtomicBool,
}

impl CallbackDispatcher {
    /// Spawn the delivery thread.
    pub fn start(thread_name: &str) -> std::io::Result<Self> {
        let queue = Arc::new(Queue {
            channel: Channel::new(),
            overflow: Mutex::new(VecDeque::new()),
        });
        let worker_queue = Arc::clone(&queue);
        let handle = thread::Builder::new()
            .name(thread_name.to_owned())
            .spawn(move || run(&worker_queue))?;
        let worker_id = handle.thread().id();
        debug!("dispatch: started thread '{}'", thread_name);
        Ok(Self {
            queue,
            worker: Mutex::new(Some(handle)),
            worker_id,
            stopped: AtomicBool::new(false),
        })
    }

    /// Queue `task` for delivery.  Never blocks.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        if self.stopped.load(Ordering::Acquire) {
            warn!("dispatch: dropping delivery after shutdown");
            return;
        }
        self.queue.push(Delivery::Run(Box::new(task)));
    }

    /// Whether the current thread is the delivery thread.
    pub fn is_dispatch_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Block until every task posted before this call has run.
    ///
    /// Returns immediately when called from a callback (the dispatcher
    /// thread) or after shutdown.
    pub fn flush(&self) {
        if self.is_dispatch_thread() || self.stopped.load(Ordering::Acquire) {
            return;
        }
        let done: Arc<Signal<CriticalSectionRawMutex, ()>> = Arc::new(Signal::new());
        let signal = Arc::clone(&done);
        self.post(move || signal.signal(()));
        futures_lite::future::block_on(done.wait());
    }

    /// Deliver everything already queued, then stop the thread.
    /// Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.push(Delivery::Stop);
        if self.is_dispatch_thread() {
            // The worker exits on its own once it reaches Stop.
            return;
        }
        if let Some(handle) = lock(&self.worker).take() {
            if handle.join().is_err() {
                error!("dispatch: worker thread panicked");
            }
        }
    }
}

impl Drop for CallbackDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(queue: &Queue) {
    futures_lite::future::block_on(async {
        loop {
            let delivery = match queue.try_pop() {
                Some(d) => d,
                None => queue.channel.receive().await,
            };
            match delivery {
                Delivery::Run(task) => {
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!("dispatch: callback panicked; continuing");
                    }
                }
                Delivery::Stop => break,
            }
        }
    });
    debug!("dispatch: thread exiting");
}
