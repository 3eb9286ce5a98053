//=========================================================================
// Dispatcher
//=========================================================================
//
// Thread-affinity queue bound to one designated "owner" thread.
//
// Architecture:
//   any thread ── run_on_owner_thread(job) ──> pending list (locked)
//                                                   │ swap under lock
//   owner thread ── tick() ──────────────────> scratch list ──> run jobs
//                                              (outside the lock)
//
// The pending list is swapped with a reusable scratch list inside a
// bounded critical section; jobs then execute outside the lock so user
// code can re-enqueue freely. Jobs enqueued during a tick run on the
// next tick. A panicking job is logged and isolated; nothing a job
// does can abort the owner thread's tick loop.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use log::error;
use parking_lot::Mutex;

//=== Internal Dependencies ===============================================

use super::worker_pool::WorkerPool;
use super::{panic_message, Job};

//=== Dispatcher ==========================================================

struct DispatcherInner {
    owner: ThreadId,
    pending: Mutex<Vec<Job>>,
    // Kept across ticks so batch capacity is reused instead of
    // reallocated every frame.
    scratch: Mutex<Vec<Job>>,
    workers: WorkerPool,
}

/// Single-owner-thread execution context.
///
/// The thread that constructs the dispatcher becomes the owner thread;
/// in an engine integration that is the logic thread, which calls
/// [`Dispatcher::tick`] once per iteration. Any thread may enqueue work;
/// only the owner thread runs it.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    //--- Construction -----------------------------------------------------

    /// Creates a dispatcher owned by the calling thread, with
    /// `worker_count` background threads for [`Dispatcher::run_async`].
    pub fn new(worker_count: usize) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                owner: thread::current().id(),
                pending: Mutex::new(Vec::new()),
                scratch: Mutex::new(Vec::new()),
                workers: WorkerPool::new(worker_count),
            }),
        }
    }

    //--- Enqueue ----------------------------------------------------------

    /// Enqueues `job` for execution during the owner thread's next tick.
    /// Safe to call from any thread, including the owner thread itself
    /// and from within a job already running in a tick.
    pub fn run_on_owner_thread<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.pending.lock().push(Box::new(job));
    }

    /// Fire-and-forget execution on a background worker thread.
    ///
    /// No future is returned; callers wrap the job with a future they
    /// settle manually, typically marshaled back via
    /// [`Future::resolve_on`](crate::core::future::Future::resolve_on).
    pub fn run_async<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.workers.execute(Box::new(job));
    }

    //--- Owner Thread -----------------------------------------------------

    /// True when called from the thread that constructed this dispatcher.
    pub fn is_on_owner_thread(&self) -> bool {
        thread::current().id() == self.inner.owner
    }

    /// Runs every job enqueued before this call. Owner thread only.
    pub fn tick(&self) {
        debug_assert!(
            self.is_on_owner_thread(),
            "Dispatcher::tick must run on the owner thread"
        );

        let mut batch = std::mem::take(&mut *self.inner.scratch.lock());
        {
            let mut pending = self.inner.pending.lock();
            std::mem::swap(&mut *pending, &mut batch);
        }

        for job in batch.drain(..) {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                error!("dispatcher job panicked: {}", panic_message(&*payload));
            }
        }

        *self.inner.scratch.lock() = batch;
    }

    /// Number of jobs currently waiting for the next tick.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn constructing_thread_is_the_owner() {
        let dispatcher = Dispatcher::new(1);
        assert!(dispatcher.is_on_owner_thread());

        let remote = dispatcher.clone();
        let handle = thread::spawn(move || remote.is_on_owner_thread());
        assert!(!handle.join().unwrap());
    }

    #[test]
    fn tick_runs_enqueued_jobs_in_order() {
        let dispatcher = Dispatcher::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            dispatcher.run_on_owner_thread(move || order.lock().push(i));
        }
        assert_eq!(dispatcher.pending_len(), 3);

        dispatcher.tick();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(dispatcher.pending_len(), 0);
    }

    #[test]
    fn cross_thread_enqueue_runs_on_the_owner_thread() {
        let dispatcher = Dispatcher::new(1);
        let (tx, rx) = crossbeam_channel::bounded(1);

        {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || {
                dispatcher.run_on_owner_thread(move || {
                    tx.send(thread::current().id()).unwrap();
                });
            })
            .join()
            .unwrap();
        }

        dispatcher.tick();
        assert_eq!(rx.recv().unwrap(), thread::current().id());
    }

    #[test]
    fn jobs_enqueued_during_a_tick_run_on_the_next_tick() {
        let dispatcher = Dispatcher::new(1);
        let count = Arc::new(AtomicUsize::new(0));

        {
            let dispatcher_handle = dispatcher.clone();
            let count = Arc::clone(&count);
            dispatcher.run_on_owner_thread(move || {
                let count = Arc::clone(&count);
                dispatcher_handle.run_on_owner_thread(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                });
            });
        }

        dispatcher.tick();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.pending_len(), 1);

        dispatcher.tick();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_job_does_not_abort_the_tick() {
        let dispatcher = Dispatcher::new(1);
        let count = Arc::new(AtomicUsize::new(0));

        dispatcher.run_on_owner_thread(|| panic!("intentional"));
        {
            let count = Arc::clone(&count);
            dispatcher.run_on_owner_thread(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        dispatcher.tick();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_async_executes_off_the_owner_thread() {
        let dispatcher = Dispatcher::new(2);
        let (tx, rx) = crossbeam_channel::bounded(1);

        dispatcher.run_async(move || {
            tx.send(thread::current().id()).unwrap();
        });

        assert_ne!(rx.recv().unwrap(), thread::current().id());
    }

    #[test]
    fn tick_on_empty_queue_is_a_no_op() {
        let dispatcher = Dispatcher::new(1);
        dispatcher.tick();
        assert_eq!(dispatcher.pending_len(), 0);
    }
}
