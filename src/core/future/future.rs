//=========================================================================
// Future
//=========================================================================
//
// Settle-once container for an asynchronous result.
//
// Architecture:
//   resolve(v) ──┐
//                ├─> Pending ──> Resolved | Rejected  (one-way, once)
//   reject(e) ───┘         │
//                          └─> listeners fire in registration order,
//                              outside the state lock, on the settling
//                              thread (or marshaled via a Dispatcher)
//
// A `Future<T>` is a cheap clonable handle; every clone observes the same
// settlement. There is no blocking wait anywhere: "waiting" means
// registering a callback and returning.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;

//=== Internal Dependencies ===============================================

use crate::core::dispatch::Dispatcher;
use crate::core::error::CoreError;

//=== Listener Types ======================================================

type DoneListener<T> = Box<dyn FnOnce(T) + Send>;
type FailListener = Box<dyn FnOnce(CoreError) + Send>;
type ProgressListener = Box<dyn FnMut(f32) + Send>;

//=== FutureState =========================================================

/// Settlement state of a [`Future`].
///
/// The transition out of `Pending` is one-way and happens exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureState {
    Pending,
    Resolved,
    Rejected,
}

//=== Future ==============================================================

// Ids are opaque diagnostics handles. They are reassigned whenever a
// pooled instance is recycled, so they must never be used for identity
// comparison.
static NEXT_FUTURE_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_FUTURE_ID.fetch_add(1, Ordering::Relaxed)
}

struct Inner<T> {
    id: u64,
    state: FutureState,
    result: Option<T>,
    error: Option<CoreError>,
    progress: f32,
    done_listeners: Vec<DoneListener<T>>,
    fail_listeners: Vec<FailListener>,
    progress_listeners: Vec<ProgressListener>,
}

/// Settle-once asynchronous value.
///
/// Created `Pending`; transitions exactly once to `Resolved` or
/// `Rejected`. Listeners registered before settlement are stored
/// (append-only) and fired in registration order; listeners registered
/// after settlement fire immediately with a clone of the stored outcome
/// and are never stored.
///
/// Settling an already-settled future leaves the first outcome untouched
/// and returns [`CoreError::Misuse`]; callers that deliberately tolerate
/// late settlement (e.g. [`race`](crate::core::future::race)) discard
/// that error explicitly.
///
/// Listener invocation always happens outside the internal lock, on
/// whichever thread called `resolve`/`reject`, unless the caller marshals
/// the settlement onto the owner thread via [`Future::resolve_on`].
pub struct Future<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    //--- Construction -----------------------------------------------------

    /// Creates a fresh future in the `Pending` state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                id: next_id(),
                state: FutureState::Pending,
                result: None,
                error: None,
                progress: 0.0,
                done_listeners: Vec::new(),
                fail_listeners: Vec::new(),
                progress_listeners: Vec::new(),
            })),
        }
    }

    //--- Settlement -------------------------------------------------------

    /// Resolves the future with `value`.
    ///
    /// Drains and invokes every done listener, in registration order,
    /// synchronously on the calling thread. Fail and progress listeners
    /// are dropped. Returns [`CoreError::Misuse`] without touching
    /// anything if the future already left `Pending`.
    pub fn resolve(&self, value: T) -> Result<(), CoreError> {
        let listeners = {
            let mut inner = self.inner.lock();
            if inner.state != FutureState::Pending {
                return Err(CoreError::Misuse("resolve on settled future"));
            }
            inner.state = FutureState::Resolved;
            inner.result = Some(value.clone());
            inner.fail_listeners.clear();
            inner.progress_listeners.clear();
            std::mem::take(&mut inner.done_listeners)
        };
        for listener in listeners {
            listener(value.clone());
        }
        Ok(())
    }

    /// Rejects the future with `error`.
    ///
    /// Mirror of [`Future::resolve`] for the failure path: drains fail
    /// listeners, drops the others, errors on a settled instance.
    pub fn reject(&self, error: CoreError) -> Result<(), CoreError> {
        let listeners = {
            let mut inner = self.inner.lock();
            if inner.state != FutureState::Pending {
                return Err(CoreError::Misuse("reject on settled future"));
            }
            inner.state = FutureState::Rejected;
            inner.error = Some(error.clone());
            inner.done_listeners.clear();
            inner.progress_listeners.clear();
            std::mem::take(&mut inner.fail_listeners)
        };
        for listener in listeners {
            listener(error.clone());
        }
        Ok(())
    }

    /// Reports a progress value to every progress listener.
    ///
    /// Values are forwarded as-is, with no clamping or monotonicity
    /// checks; callers own that contract. Returns [`CoreError::Misuse`] on a
    /// settled future, invoking nothing.
    pub fn report_progress(&self, value: f32) -> Result<(), CoreError> {
        // Listeners are taken out for the duration of the callbacks so
        // user code runs outside the lock, then spliced back if the
        // future is still pending.
        let mut listeners = {
            let mut inner = self.inner.lock();
            if inner.state != FutureState::Pending {
                return Err(CoreError::Misuse("progress on settled future"));
            }
            inner.progress = value;
            std::mem::take(&mut inner.progress_listeners)
        };

        for listener in listeners.iter_mut() {
            listener(value);
        }

        let mut inner = self.inner.lock();
        if inner.state == FutureState::Pending {
            // Listeners registered during the callbacks land after the
            // pre-existing ones, preserving registration order.
            let registered_during = std::mem::take(&mut inner.progress_listeners);
            listeners.extend(registered_during);
            inner.progress_listeners = listeners;
        }
        Ok(())
    }

    //--- Marshaled Settlement ---------------------------------------------

    /// Resolves on the dispatcher's owner thread.
    ///
    /// Settles inline when already on the owner thread; otherwise the
    /// settlement is enqueued and runs during the owner thread's next
    /// [`Dispatcher::tick`]. A marshaled settlement that arrives after
    /// the future has already settled is logged, never a panic.
    pub fn resolve_on(&self, dispatcher: &Dispatcher, value: T) {
        if dispatcher.is_on_owner_thread() {
            if let Err(err) = self.resolve(value) {
                warn!("marshaled resolve arrived late: {err}");
            }
            return;
        }
        let future = self.clone();
        dispatcher.run_on_owner_thread(move || {
            if let Err(err) = future.resolve(value) {
                warn!("marshaled resolve arrived late: {err}");
            }
        });
    }

    /// Rejects on the dispatcher's owner thread. See [`Future::resolve_on`].
    pub fn reject_on(&self, dispatcher: &Dispatcher, error: CoreError) {
        if dispatcher.is_on_owner_thread() {
            if let Err(err) = self.reject(error) {
                warn!("marshaled reject arrived late: {err}");
            }
            return;
        }
        let future = self.clone();
        dispatcher.run_on_owner_thread(move || {
            if let Err(err) = future.reject(error) {
                warn!("marshaled reject arrived late: {err}");
            }
        });
    }

    //--- Listener Registration --------------------------------------------

    /// Registers a success listener.
    ///
    /// Queued while `Pending`; fires immediately (synchronously, exactly
    /// once) with a clone of the stored value if already `Resolved`;
    /// silently dropped if already `Rejected`.
    pub fn on_done<F>(&self, listener: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        match inner.state {
            FutureState::Pending => inner.done_listeners.push(Box::new(listener)),
            FutureState::Resolved => {
                let value = inner
                    .result
                    .clone()
                    .expect("resolved future holds a value");
                drop(inner);
                listener(value);
            }
            FutureState::Rejected => {}
        }
    }

    /// Registers a failure listener. Immediate-fire semantics mirror
    /// [`Future::on_done`].
    pub fn on_fail<F>(&self, listener: F)
    where
        F: FnOnce(CoreError) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        match inner.state {
            FutureState::Pending => inner.fail_listeners.push(Box::new(listener)),
            FutureState::Rejected => {
                let error = inner
                    .error
                    .clone()
                    .expect("rejected future holds an error");
                drop(inner);
                listener(error);
            }
            FutureState::Resolved => {}
        }
    }

    /// Registers a progress listener.
    ///
    /// Progress is only meaningful while `Pending`; registration on a
    /// settled future stores nothing and fires nothing.
    pub fn on_progress<F>(&self, listener: F)
    where
        F: FnMut(f32) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.state == FutureState::Pending {
            inner.progress_listeners.push(Box::new(listener));
        }
    }

    //--- Queries ----------------------------------------------------------

    /// Current settlement state.
    pub fn state(&self) -> FutureState {
        self.inner.lock().state
    }

    pub fn is_pending(&self) -> bool {
        self.state() == FutureState::Pending
    }

    pub fn is_settled(&self) -> bool {
        self.state() != FutureState::Pending
    }

    /// Clone of the stored value, if `Resolved`.
    pub fn result(&self) -> Option<T> {
        self.inner.lock().result.clone()
    }

    /// Clone of the stored error, if `Rejected`.
    pub fn error(&self) -> Option<CoreError> {
        self.inner.lock().error.clone()
    }

    /// Last reported progress value (0.0 if none was ever reported).
    pub fn progress(&self) -> f32 {
        self.inner.lock().progress
    }

    /// Opaque diagnostics id. Reassigned on pool recycle; never compare
    /// futures by id.
    pub fn id(&self) -> u64 {
        self.inner.lock().id
    }

    //--- Pool Integration (crate-internal) --------------------------------

    /// Resets the instance to a fresh `Pending` state with a new id.
    /// Only the pool calls this, and only on instances it owns.
    pub(crate) fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.id = next_id();
        inner.state = FutureState::Pending;
        inner.result = None;
        inner.error = None;
        inner.progress = 0.0;
        inner.done_listeners.clear();
        inner.fail_listeners.clear();
        inner.progress_listeners.clear();
    }

    /// True when no other handle to this future exists.
    pub(crate) fn is_unique(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }
}

impl<T: Clone + Send + 'static> Default for Future<T> {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================
// Tests
//=========================================================================
