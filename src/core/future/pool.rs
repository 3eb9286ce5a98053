//=========================================================================
// Future Pool
//=========================================================================
//
// Reuse of settled future instances for high call-volume sites.
//
// Lifecycle:
//   acquire() ──> PooledFuture (guard) ──> settle ──> drop
//                                                       │
//                     free list <── reset, fresh id ────┘
//
// Recycling is explicit and deterministic: the guard returns the
// instance on drop, but only when the future is settled and the guard
// holds the last handle. A guard dropped while the future is still
// pending marks an abandoned future, which is counted and logged
// instead of recycled.
//
// The free-list lock is held only around pop/push, never around user
// code.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;

//=== Internal Dependencies ===============================================

use super::Future;

//=== FuturePool ==========================================================

struct PoolInner<T> {
    free: Mutex<Vec<Future<T>>>,
    abandoned: AtomicUsize,
}

/// Shared free list of recycled [`Future`] instances.
///
/// Cloning the pool clones a handle to the same free list; acquire and
/// release are safe from any thread.
pub struct FuturePool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for FuturePool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> FuturePool<T> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                abandoned: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns a recycled instance if one is free, else allocates.
    ///
    /// The returned guard owns the instance through every exit path;
    /// hand clones to collaborators via [`PooledFuture::future`].
    pub fn acquire(&self) -> PooledFuture<T> {
        let recycled = self.inner.free.lock().pop();
        let future = recycled.unwrap_or_else(Future::new);
        PooledFuture {
            future,
            pool: self.clone(),
        }
    }

    /// Resets `future` (listeners cleared, outcome cleared, state back to
    /// `Pending`, fresh id) and returns it to the free list.
    pub fn release(&self, future: Future<T>) {
        future.reset();
        self.inner.free.lock().push(future);
    }

    /// Number of instances currently on the free list.
    pub fn len(&self) -> usize {
        self.inner.free.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.free.lock().is_empty()
    }

    /// Number of guards dropped while their future was still pending.
    pub fn abandoned(&self) -> usize {
        self.inner.abandoned.load(Ordering::Relaxed)
    }
}

impl<T: Clone + Send + 'static> Default for FuturePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

//=== PooledFuture ========================================================

/// RAII guard over a pool-owned future.
///
/// Derefs to the underlying [`Future`]; on drop, recycles the instance
/// when it is settled and no other handle to it remains. An unsettled or
/// still-shared instance is dropped normally rather than being reset out
/// from under listeners.
pub struct PooledFuture<T: Clone + Send + 'static> {
    future: Future<T>,
    pool: FuturePool<T>,
}

impl<T: Clone + Send + 'static> PooledFuture<T> {
    /// Plain handle to the underlying future, for handing to listeners
    /// and combinators. The guard keeps ownership.
    pub fn future(&self) -> Future<T> {
        self.future.clone()
    }
}

impl<T: Clone + Send + 'static> Deref for PooledFuture<T> {
    type Target = Future<T>;

    fn deref(&self) -> &Future<T> {
        &self.future
    }
}

impl<T: Clone + Send + 'static> Drop for PooledFuture<T> {
    fn drop(&mut self) {
        if !self.future.is_settled() {
            self.pool.inner.abandoned.fetch_add(1, Ordering::Relaxed);
            warn!(
                "pooled future #{} dropped while pending; not recycled",
                self.future.id()
            );
            return;
        }
        if self.future.is_unique() {
            self.future.reset();
            self.pool.inner.free.lock().push(self.future.clone());
        }
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::future::FutureState;

    #[test]
    fn acquire_on_empty_pool_allocates() {
        let pool: FuturePool<i32> = FuturePool::new();
        assert!(pool.is_empty());

        let guard = pool.acquire();
        assert_eq!(guard.state(), FutureState::Pending);
        assert!(pool.is_empty());

        guard.resolve(1).unwrap();
    }

    #[test]
    fn settled_unique_guard_recycles_on_drop() {
        let pool: FuturePool<i32> = FuturePool::new();
        {
            let guard = pool.acquire();
            guard.resolve(1).unwrap();
        }
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn recycled_instance_is_reset_with_a_fresh_id() {
        let pool: FuturePool<i32> = FuturePool::new();

        let first_id = {
            let guard = pool.acquire();
            guard.resolve(1).unwrap();
            guard.id()
        };
        assert_eq!(pool.len(), 1);

        let guard = pool.acquire();
        assert_eq!(pool.len(), 0);
        assert_eq!(guard.state(), FutureState::Pending);
        assert_eq!(guard.result(), None);
        assert_eq!(guard.progress(), 0.0);
        assert_ne!(guard.id(), first_id);

        guard.resolve(2).unwrap();
    }

    #[test]
    fn pending_guard_is_abandoned_not_recycled() {
        let pool: FuturePool<i32> = FuturePool::new();
        {
            let _guard = pool.acquire();
            // dropped without ever settling
        }
        assert!(pool.is_empty());
        assert_eq!(pool.abandoned(), 1);
    }

    #[test]
    fn shared_instance_is_not_recycled() {
        let pool: FuturePool<i32> = FuturePool::new();
        let escapee = {
            let guard = pool.acquire();
            guard.resolve(1).unwrap();
            guard.future()
        };
        // A live clone escaped the guard; recycling it would have reset
        // the instance out from under that handle.
        assert!(pool.is_empty());
        assert_eq!(escapee.result(), Some(1));
    }

    #[test]
    fn explicit_release_resets_and_returns() {
        let pool: FuturePool<i32> = FuturePool::new();
        let future: Future<i32> = Future::new();
        future.resolve(7).unwrap();

        pool.release(future);
        assert_eq!(pool.len(), 1);

        let guard = pool.acquire();
        assert!(guard.is_pending());
        guard.resolve(0).unwrap();
    }

    #[test]
    fn old_listeners_never_fire_after_recycle() {
        let pool: FuturePool<i32> = FuturePool::new();
        let fired = Arc::new(Mutex::new(Vec::new()));

        {
            let guard = pool.acquire();
            let sink = Arc::clone(&fired);
            guard.on_done(move |v| sink.lock().push(v));
            guard.resolve(1).unwrap();
        }
        assert_eq!(pool.len(), 1);

        let guard = pool.acquire();
        guard.resolve(2).unwrap();

        // Only the first settlement reached the first listener.
        assert_eq!(*fired.lock(), vec![1]);
    }
}
