//=========================================================================
// Future Combinators
//=========================================================================
//
// Derived futures built exclusively on the public Future surface:
//
//   then / then_or   sequential chaining into a Future<()>
//   channel          bridge settlement into a pre-existing future
//   always           one callback regardless of outcome
//   all              fan-in: every input must resolve
//   race             fan-out: first settlement wins
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;

//=== Internal Dependencies ===============================================

use crate::core::error::CoreError;
use super::Future;

//=== Chaining ============================================================

impl<T: Clone + Send + 'static> Future<T> {
    /// Derives a `Future<()>` that resolves after `on_done` has run.
    ///
    /// Rejection and progress are forwarded unchanged.
    pub fn then<F>(&self, on_done: F) -> Future<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        let derived = Future::new();

        {
            let derived = derived.clone();
            self.on_done(move |value| {
                on_done(value);
                let _ = derived.resolve(());
            });
        }
        {
            let derived = derived.clone();
            self.on_fail(move |error| {
                let _ = derived.reject(error);
            });
        }
        {
            let derived = derived.clone();
            self.on_progress(move |progress| {
                let _ = derived.report_progress(progress);
            });
        }
        derived
    }

    /// Like [`Future::then`], but `on_fail` runs before the derived
    /// future rejects.
    pub fn then_or<F, G>(&self, on_done: F, on_fail: G) -> Future<()>
    where
        F: FnOnce(T) + Send + 'static,
        G: FnOnce(CoreError) + Send + 'static,
    {
        let derived = Future::new();

        {
            let derived = derived.clone();
            self.on_done(move |value| {
                on_done(value);
                let _ = derived.resolve(());
            });
        }
        {
            let derived = derived.clone();
            self.on_fail(move |error| {
                on_fail(error.clone());
                let _ = derived.reject(error);
            });
        }
        {
            let derived = derived.clone();
            self.on_progress(move |progress| {
                let _ = derived.report_progress(progress);
            });
        }
        derived
    }

    /// Wires this future's eventual settlement (and progress) into a
    /// pre-existing future the caller already handed out.
    ///
    /// Delivery into an already-settled `other` is tolerated and logged:
    /// the bridge is used where the receiving end may have been settled
    /// by someone else first.
    pub fn channel(&self, other: &Future<T>) {
        {
            let other = other.clone();
            self.on_done(move |value| {
                if let Err(err) = other.resolve(value) {
                    warn!("channel delivered into settled future: {err}");
                }
            });
        }
        {
            let other = other.clone();
            self.on_fail(move |error| {
                if let Err(err) = other.reject(error) {
                    warn!("channel delivered into settled future: {err}");
                }
            });
        }
        {
            let other = other.clone();
            self.on_progress(move |progress| {
                let _ = other.report_progress(progress);
            });
        }
    }

    /// Runs `callback` exactly once on either outcome: with the resolved
    /// value, or with `T::default()` on rejection.
    pub fn always<F>(&self, callback: F)
    where
        T: Default,
        F: FnOnce(T) + Send + 'static,
    {
        // Only one of the two listeners ever fires (settlement is
        // exactly-once), but both need to capture the callback, so it
        // lives in a shared take-once slot.
        let slot = Arc::new(Mutex::new(Some(callback)));
        {
            let slot = Arc::clone(&slot);
            self.on_done(move |value| {
                if let Some(callback) = slot.lock().take() {
                    callback(value);
                }
            });
        }
        self.on_fail(move |_error| {
            if let Some(callback) = slot.lock().take() {
                callback(T::default());
            }
        });
    }
}

//=== all =================================================================

struct AllState {
    settled: usize,
    resolved: usize,
}

/// Resolves once every input has resolved; rejects at the first
/// rejection observed.
///
/// A rejection does not cancel or ignore the remaining inputs: their
/// settlements are still counted (and their own listeners still fire),
/// they just no longer affect the already-rejected aggregate. Empty
/// input resolves immediately.
///
/// While pending, the aggregate reports progress `settled/total` after
/// each individual settlement. Completion count only; progress is not
/// weighted by the size of the individual operations.
pub fn all<T, I>(futures: I) -> Future<()>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Future<T>>,
{
    let futures: Vec<Future<T>> = futures.into_iter().collect();
    let aggregate = Future::new();
    let total = futures.len();

    if total == 0 {
        let _ = aggregate.resolve(());
        return aggregate;
    }

    let state = Arc::new(Mutex::new(AllState {
        settled: 0,
        resolved: 0,
    }));

    for future in &futures {
        {
            let aggregate = aggregate.clone();
            let state = Arc::clone(&state);
            future.on_done(move |_value| {
                let (settled, resolved) = {
                    let mut state = state.lock();
                    state.settled += 1;
                    state.resolved += 1;
                    (state.settled, state.resolved)
                };
                let _ = aggregate.report_progress(settled as f32 / total as f32);
                if resolved == total {
                    let _ = aggregate.resolve(());
                }
            });
        }
        {
            let aggregate = aggregate.clone();
            let state = Arc::clone(&state);
            future.on_fail(move |error| {
                let settled = {
                    let mut state = state.lock();
                    state.settled += 1;
                    state.settled
                };
                let _ = aggregate.report_progress(settled as f32 / total as f32);
                // First rejection wins; later settlements are counted
                // but no longer move the aggregate.
                let _ = aggregate.reject(error);
            });
        }
    }
    aggregate
}

//=== race ================================================================

/// Settles with whichever input settles first, success or failure.
///
/// Later settlements are observed and deliberately discarded. An empty
/// input yields a future that never settles.
pub fn race<T, I>(futures: I) -> Future<T>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Future<T>>,
{
    let winner = Future::new();
    for future in futures {
        {
            let winner = winner.clone();
            future.on_done(move |value| {
                let _ = winner.resolve(value);
            });
        }
        {
            let winner = winner.clone();
            future.on_fail(move |error| {
                let _ = winner.reject(error);
            });
        }
    }
    winner
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::future::FutureState;

    #[test]
    fn then_runs_callback_before_resolving_the_derived_future() {
        let source = Future::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let derived = {
            let order = Arc::clone(&order);
            source.then(move |v| order.lock().push(("callback", v)))
        };
        {
            let order = Arc::clone(&order);
            derived.on_done(move |_| order.lock().push(("derived", 0)));
        }

        source.resolve(3).unwrap();
        assert_eq!(*order.lock(), vec![("callback", 3), ("derived", 0)]);
    }

    #[test]
    fn then_forwards_rejection() {
        let source: Future<i32> = Future::new();
        let derived = source.then(|_| {});

        source.reject(CoreError::other("boom")).unwrap();
        assert_eq!(derived.state(), FutureState::Rejected);
        assert_eq!(derived.error(), Some(CoreError::other("boom")));
    }

    #[test]
    fn then_forwards_progress() {
        let source: Future<i32> = Future::new();
        let derived = source.then(|_| {});

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        derived.on_progress(move |p| sink.lock().push(p));

        source.report_progress(0.5).unwrap();
        assert_eq!(*seen.lock(), vec![0.5]);
    }

    #[test]
    fn then_or_runs_error_callback_before_rejecting() {
        let source: Future<i32> = Future::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let derived = {
            let order = Arc::clone(&order);
            source.then_or(|_| {}, move |_| order.lock().push("on_fail"))
        };
        {
            let order = Arc::clone(&order);
            derived.on_fail(move |_| order.lock().push("derived"));
        }

        source.reject(CoreError::other("boom")).unwrap();
        assert_eq!(*order.lock(), vec!["on_fail", "derived"]);
    }

    #[test]
    fn channel_drives_a_preexisting_future() {
        let source = Future::new();
        let sink: Future<i32> = Future::new();

        source.channel(&sink);
        source.resolve(11).unwrap();

        assert_eq!(sink.result(), Some(11));
    }

    #[test]
    fn channel_tolerates_an_already_settled_receiver() {
        let source = Future::new();
        let sink: Future<i32> = Future::new();
        sink.resolve(1).unwrap();

        source.channel(&sink);
        source.resolve(2).unwrap();

        // Logged, not overwritten.
        assert_eq!(sink.result(), Some(1));
    }

    #[test]
    fn channel_forwards_progress_to_the_receiver() {
        let source: Future<i32> = Future::new();
        let sink: Future<i32> = Future::new();
        source.channel(&sink);

        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            sink.on_progress(move |p| seen.lock().push(p));
        }

        source.report_progress(0.25).unwrap();
        assert_eq!(*seen.lock(), vec![0.25]);
        assert_eq!(sink.progress(), 0.25);
    }

    #[test]
    fn always_fires_with_the_value_on_success() {
        let future: Future<i32> = Future::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        future.always(move |v| sink.lock().push(v));

        future.resolve(6).unwrap();
        assert_eq!(*seen.lock(), vec![6]);
    }

    #[test]
    fn always_fires_with_the_default_on_failure() {
        let future: Future<i32> = Future::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        future.always(move |v| sink.lock().push(v));

        future.reject(CoreError::other("boom")).unwrap();
        assert_eq!(*seen.lock(), vec![0]);
    }

    //--- all --------------------------------------------------------------

    #[test]
    fn all_of_empty_input_resolves_immediately() {
        let aggregate = all(Vec::<Future<i32>>::new());
        assert_eq!(aggregate.state(), FutureState::Resolved);
    }

    #[test]
    fn all_resolves_only_after_every_input() {
        let a: Future<i32> = Future::new();
        let b: Future<i32> = Future::new();
        let aggregate = all(vec![a.clone(), b.clone()]);

        b.resolve(2).unwrap();
        assert!(aggregate.is_pending());

        a.resolve(1).unwrap();
        assert_eq!(aggregate.state(), FutureState::Resolved);
    }

    #[test]
    fn all_rejects_at_the_first_rejection_without_waiting() {
        let a: Future<i32> = Future::new();
        let b: Future<i32> = Future::new();
        let c: Future<i32> = Future::new();
        let aggregate = all(vec![a.clone(), b.clone(), c.clone()]);

        let rejections = Arc::new(Mutex::new(0));
        {
            let rejections = Arc::clone(&rejections);
            aggregate.on_fail(move |_| *rejections.lock() += 1);
        }

        b.reject(CoreError::other("boom")).unwrap();
        assert_eq!(aggregate.state(), FutureState::Rejected);
        assert_eq!(*rejections.lock(), 1);

        // The remaining inputs still settle and their own listeners
        // still fire; the aggregate just ignores them.
        let a_seen = Arc::new(Mutex::new(false));
        {
            let a_seen = Arc::clone(&a_seen);
            a.on_done(move |_| *a_seen.lock() = true);
        }
        a.resolve(1).unwrap();
        c.resolve(3).unwrap();

        assert!(*a_seen.lock());
        assert_eq!(*rejections.lock(), 1);
        assert_eq!(aggregate.error(), Some(CoreError::other("boom")));
    }

    #[test]
    fn all_reports_progress_per_settlement() {
        let a: Future<i32> = Future::new();
        let b: Future<i32> = Future::new();
        let aggregate = all(vec![a.clone(), b.clone()]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            aggregate.on_progress(move |p| seen.lock().push(p));
        }

        a.resolve(1).unwrap();
        b.resolve(2).unwrap();

        assert_eq!(*seen.lock(), vec![0.5, 1.0]);
        assert_eq!(aggregate.state(), FutureState::Resolved);
    }

    //--- race -------------------------------------------------------------

    #[test]
    fn race_takes_the_first_success() {
        let a: Future<i32> = Future::new();
        let b: Future<i32> = Future::new();
        let winner = race(vec![a.clone(), b.clone()]);

        a.resolve(1).unwrap();
        assert_eq!(winner.result(), Some(1));

        // The loser's later rejection is observed and discarded.
        b.reject(CoreError::other("late")).unwrap();
        assert_eq!(winner.state(), FutureState::Resolved);
        assert_eq!(winner.result(), Some(1));
    }

    #[test]
    fn race_takes_the_first_failure_too() {
        let a: Future<i32> = Future::new();
        let b: Future<i32> = Future::new();
        let winner = race(vec![a.clone(), b.clone()]);

        a.reject(CoreError::other("boom")).unwrap();
        assert_eq!(winner.state(), FutureState::Rejected);

        b.resolve(2).unwrap();
        assert_eq!(winner.state(), FutureState::Rejected);
    }

    #[test]
    fn race_with_an_already_settled_input_settles_immediately() {
        let a: Future<i32> = Future::new();
        a.resolve(4).unwrap();
        let b: Future<i32> = Future::new();

        let winner = race(vec![a, b.clone()]);
        assert_eq!(winner.result(), Some(4));

        b.resolve(5).unwrap();
    }

    #[test]
    fn race_of_empty_input_never_settles() {
        let winner = race(Vec::<Future<i32>>::new());
        assert!(winner.is_pending());
    }
}
