//! Delivery of engine-thread work into the host's single-threaded context.
//!
//! ## Flow
//!
//! ```text
//! engine thread ──HostHandle::post──► unbounded FIFO ──► HostContext::run_*()
//!     (any number of producers)        (crossbeam)         (one consumer, host thread)
//! ```
//!
//! Producers never block beyond the enqueue. Tasks run in the order they
//! were enqueued, so every relay is FIFO with respect to its own calls. The
//! queue happens to be shared by all relays, but ordering *across* relays
//! is not part of the contract.
//!
//! A task that panics is logged and skipped; the drain loop keeps going.

pub mod callback;

use std::any::Any;
use std::cell::Cell;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

pub use callback::{CallbackRelay, CallbackSlot};

/// Context handed to work items while they run on the host.
#[derive(Debug, Clone, Copy)]
pub struct HostScope {
    origin: &'static str,
    seq: u64,
}

impl HostScope {
    /// Name of the relay (or other producer) that enqueued the running item.
    pub fn origin(&self) -> &'static str {
        self.origin
    }

    /// Position of the running item in the host's overall delivery order.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

struct HostTask {
    origin: &'static str,
    run: Box<dyn FnOnce(&HostScope) + Send>,
}

/// Producer side of the host queue. Cheap to clone, usable from any thread.
#[derive(Clone)]
pub struct HostHandle {
    tx: Sender<HostTask>,
}

impl HostHandle {
    /// Enqueue `task` for the host context. Never blocks.
    ///
    /// If the host context is gone the task is dropped.
    pub fn post<F>(&self, origin: &'static str, task: F)
    where
        F: FnOnce(&HostScope) + Send + 'static,
    {
        let task = HostTask {
            origin,
            run: Box::new(task),
        };
        if self.tx.send(task).is_err() {
            debug!(origin, "host context closed; work item dropped");
        }
    }
}

impl std::fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostHandle")
            .field("queued", &self.tx.len())
            .finish()
    }
}

/// The host's single-threaded execution context.
///
/// Not `Send`: it is created on, and drained from, the host thread only.
pub struct HostContext {
    tx: Sender<HostTask>,
    rx: Receiver<HostTask>,
    seq: Cell<u64>,
    _single_thread: PhantomData<Rc<()>>,
}

impl HostContext {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            seq: Cell::new(0),
            _single_thread: PhantomData,
        }
    }

    pub fn handle(&self) -> HostHandle {
        HostHandle {
            tx: self.tx.clone(),
        }
    }

    /// Number of work items waiting to run.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Run every item already queued, without waiting. Returns how many ran.
    ///
    /// Items enqueued by the running items themselves are included.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            self.execute(task);
            ran += 1;
        }
        ran
    }

    /// Run items as they arrive until `timeout` elapses. Returns how many ran.
    pub fn run_for(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut ran = 0;
        while let Ok(task) = self.rx.recv_deadline(deadline) {
            self.execute(task);
            ran += 1;
        }
        ran
    }

    /// Run items until `done` holds or `timeout` elapses.
    ///
    /// `done` is checked before waiting and after every item. Returns its
    /// final value.
    pub fn run_until<F>(&self, mut done: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if done() {
                return true;
            }
            match self.rx.recv_deadline(deadline) {
                Ok(task) => self.execute(task),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return done();
                }
            }
        }
    }

    fn execute(&self, task: HostTask) {
        let seq = self.seq.get();
        self.seq.set(seq.wrapping_add(1));
        let scope = HostScope {
            origin: task.origin,
            seq,
        };
        let run = task.run;
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| run(&scope))) {
            error!(
                origin = task.origin,
                seq,
                panic = %panic_message(panic.as_ref()),
                "host work item panicked; continuing"
            );
        }
    }
}

impl Default for HostContext {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
