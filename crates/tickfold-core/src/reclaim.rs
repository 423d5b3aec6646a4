//! Deferred release of array backing stores on a dedicated worker thread.
//!
//! Dropping a [`NumericArray`](crate::NumericArray) must never block the
//! dropping thread on deallocation, and a buffer handed out to subscribers
//! must be releasable from any thread. Both go through one process-wide
//! queue drained by a single worker: producers enqueue without blocking, the
//! worker frees raw blocks, drops kept-alive buffers, and runs release
//! callbacks, exactly once each.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

/// Handle for a raw block allocated with `std::alloc::alloc_zeroed`.
///
/// `len` is the element count of the original `Layout::array::<f64>`
/// allocation; the worker rebuilds the identical layout to deallocate.
pub struct RawMem {
    ptr: NonNull<f64>,
    len: usize,
}

impl RawMem {
    pub(crate) fn new(ptr: NonNull<f64>, len: usize) -> Self {
        Self { ptr, len }
    }

    fn release(self) {
        if self.len == 0 {
            return; // dangling placeholder, nothing was allocated
        }
        let layout = std::alloc::Layout::array::<f64>(self.len)
            .expect("layout was valid at allocation time");
        unsafe { std::alloc::dealloc(self.ptr.as_ptr().cast(), layout) };
    }
}

// SAFETY: once a RawMem reaches the queue the block has no other owner;
// the worker thread is the only remaining accessor.
unsafe impl Send for RawMem {}

/// A resource queued for asynchronous release.
pub enum Reclaim {
    /// Raw memory block; deallocated on the worker.
    RawMem(RawMem),
    /// Kept-alive buffer (adopted `Vec` or record storage); dropped on the worker.
    Buffer(Box<dyn Any + Send>),
    /// Arbitrary release action; panics are caught and logged.
    Callback(Box<dyn FnOnce() + Send>),
}

enum Msg {
    Release(Reclaim),
    Shutdown,
}

/// Background worker that releases resources queued by any thread.
///
/// Array drops use the process-wide [`Reclaimer::global`] instance; tests
/// that exercise shutdown behavior construct their own.
pub struct Reclaimer {
    tx: Sender<Msg>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

static GLOBAL: OnceLock<Reclaimer> = OnceLock::new();

impl Reclaimer {
    /// Process-wide reclaimer, constructed on first use. Teardown is
    /// best-effort at process exit: whatever is still queued is released by
    /// the OS reclaiming the process.
    pub fn global() -> &'static Reclaimer {
        GLOBAL.get_or_init(Reclaimer::new)
    }

    /// Independent reclaimer with its own worker thread.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        let worker = std::thread::Builder::new()
            .name("tickfold-reclaim".into())
            .spawn(move || worker_loop(rx))
            .expect("failed to spawn reclaimer worker");
        Self {
            tx,
            worker: Mutex::new(Some(worker)),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Queue a resource for release. Never blocks the caller.
    ///
    /// Returns `false` if the reclaimer has shut down; the resource is
    /// deliberately leaked (releasing it here could race the worker's final
    /// drain) and the condition is logged. Non-fatal for the caller.
    pub fn enqueue(&self, resource: Reclaim) -> bool {
        if self.shut_down.load(Ordering::Acquire) {
            tracing::warn!("reclaimer is shut down; leaking queued resource");
            std::mem::forget(resource);
            return false;
        }
        match self.tx.send(Msg::Release(resource)) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("reclaimer queue closed; leaking queued resource");
                std::mem::forget(err.into_inner());
                false
            }
        }
    }

    /// Block until everything enqueued before this call has been released.
    ///
    /// No-op when the reclaimer is already shut down.
    pub fn flush(&self) {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let accepted = self.enqueue(Reclaim::Callback(Box::new(move || {
            let _ = done_tx.send(());
        })));
        if accepted {
            let _ = done_rx.recv();
        }
    }

    /// Stop the worker after it drains everything already queued, then join
    /// it. Double-shutdown is a no-op.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(Msg::Shutdown);
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }

    /// Whether `shutdown` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Default for Reclaimer {
    fn default() -> Self {
        Self::new()
    }
}

fn worker_loop(rx: Receiver<Msg>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            Msg::Release(resource) => release(resource),
            Msg::Shutdown => break,
        }
    }
    // Clean shutdown drains first: catch producers that raced the stop signal.
    while let Ok(msg) = rx.try_recv() {
        if let Msg::Release(resource) = msg {
            release(resource);
        }
    }
}

fn release(resource: Reclaim) {
    match resource {
        Reclaim::RawMem(mem) => mem.release(),
        Reclaim::Buffer(keeper) => drop(keeper),
        Reclaim::Callback(callback) => {
            if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
                tracing::error!("reclaim callback panicked; worker continues");
            }
        }
    }
}
