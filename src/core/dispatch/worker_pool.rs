//=========================================================================
// Worker Pool
//=========================================================================
//
// Fire-and-forget job execution on a small set of background threads.
//
// Architecture:
//   execute(job) ──> crossbeam unbounded channel ──> worker threads
//
// No future is returned by the pool itself; callers that need a result
// wrap the job with a Future they settle manually (usually marshaled
// back through the Dispatcher).
//
// Shutdown: dropping the pool drops the sender first; workers drain the
// channel, observe the disconnect, and exit. Their handles are joined so
// no job is abandoned mid-flight.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use log::error;

//=== Internal Dependencies ===============================================

use super::{panic_message, Job};

//=== WorkerPool ==========================================================

pub(crate) struct WorkerPool {
    sender: Option<Sender<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` worker threads draining a shared job channel.
    pub fn new(count: usize) -> Self {
        assert!(count > 0, "Worker count must be positive");

        let (sender, receiver) = unbounded::<Job>();
        let handles = (0..count)
            .map(|index| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("aetheric-worker-{index}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            // A panicking job must never take the worker
                            // down with it.
                            if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                                error!("async job panicked: {}", panic_message(&*payload));
                            }
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            sender: Some(sender),
            handles,
        }
    }

    /// Enqueues a job for execution on some worker thread.
    pub fn execute(&self, job: Job) {
        if let Some(sender) = &self.sender {
            if sender.send(job).is_err() {
                error!("worker pool channel disconnected; job dropped");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Disconnect first so idle workers wake up and exit.
        drop(self.sender.take());
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked during shutdown");
            }
        }
    }
}

//=========================================================================
// Tests
//=========================================================================
