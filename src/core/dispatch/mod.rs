//=========================================================================
// Dispatch Subsystem
//=========================================================================
//
// Owner-thread job queue plus a small fire-and-forget worker pool.
//
//=========================================================================

mod dispatcher;
mod worker_pool;

pub use dispatcher::Dispatcher;

pub(crate) type Job = Box<dyn FnOnce() + Send>;

/// Best-effort rendering of a panic payload for log output.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
