//=========================================================================
// Module Resolver
//=========================================================================
//
// Future-driven dependency resolution with single-flight construction.
//
// Per-link state machine:
//   Unregistered -> Creating -> DependenciesPending -> Initializing -> Ready
//                      │                                   │
//                      └────────────> Failed <─────────────┘
//
// Flow for a fresh link:
//   create_module(link)
//     ├─ entry cached?  ── chain onto its ready future (single-flight)
//     ├─ insert entry, then factory.create(link)
//     ├─ set_up(ctx); settle the creation future (a mutual dependency
//     │  must be able to observe the instance)
//     ├─ wait on each declared dependency, pooled Future<()> per wait,
//     │  joined with all(); failures handled per DependencyFailurePolicy
//     └─ init(); on success mark ready and resolve, on failure reject
//
// Dependency waits apply a *shallow* cycle check: when a dependency is
// already in flight, its declared dependencies are inspected for a
// one-hop back-reference to the dependent. A longer cycle (A->B->C->A)
// is not detected and will leave both creations pending.
//
// Everything here runs synchronously on whichever thread settles the
// involved futures; the registry locks are never held across callbacks
// or recursion.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, error, warn};

//=== Internal Dependencies ===============================================

use crate::app::AppContext;
use crate::core::error::CoreError;
use crate::core::future::{all, Future, FuturePool, PooledFuture};
use super::registry::{EntrySnapshot, ModuleRegistry};
use super::{ModuleHandle, ModuleLink};

//=== DependencyFailurePolicy =============================================

/// How a failed dependency affects the module that declared it.
///
/// The framework default is `Tolerant`: partial boot beats total
/// failure, so a missing or broken dependency is logged and the
/// dependent initializes without it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyFailurePolicy {
    /// Log, count, and resolve the wait anyway.
    #[default]
    Tolerant,
    /// Propagate the failure to the dependent's own creation future.
    Strict,
}

//=== ResolverStats =======================================================

/// Snapshot of the resolver's diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// One-hop back-references detected (one per back-edge).
    pub circular_warnings: usize,
    /// Dependency failures swallowed under the tolerant policy.
    pub swallowed_dependency_failures: usize,
}

struct StatsCounters {
    circular_warnings: AtomicUsize,
    swallowed_dependency_failures: AtomicUsize,
}

//=== ModuleResolver ======================================================

pub(crate) struct ModuleResolver {
    registry: ModuleRegistry,
    // Per-dependency wait futures are short-lived and high-volume;
    // they cycle through this pool via RAII guards.
    wait_pool: FuturePool<()>,
    counters: Arc<StatsCounters>,
    policy: DependencyFailurePolicy,
    verbose: bool,
}

impl ModuleResolver {
    pub fn new(policy: DependencyFailurePolicy, verbose: bool) -> Self {
        Self {
            registry: ModuleRegistry::new(),
            wait_pool: FuturePool::new(),
            counters: Arc::new(StatsCounters {
                circular_warnings: AtomicUsize::new(0),
                swallowed_dependency_failures: AtomicUsize::new(0),
            }),
            policy,
            verbose,
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            circular_warnings: self.counters.circular_warnings.load(Ordering::Relaxed),
            swallowed_dependency_failures: self
                .counters
                .swallowed_dependency_failures
                .load(Ordering::Relaxed),
        }
    }

    //--- create_module() --------------------------------------------------

    /// Constructs and initializes the module behind `link`, exactly once
    /// per link. The returned future resolves once the module is ready
    /// (usable), or rejects with the construction or init failure.
    pub fn create_module(&self, ctx: &AppContext, link: ModuleLink) -> Future<ModuleHandle> {
        let outer = Future::new();

        if !ctx.factory().defines(link) {
            let err = CoreError::NotFound(link);
            error!("{err}");
            let _ = outer.reject(err);
            return outer;
        }

        // Single-flight: check and insert are one atomic operation, so
        // of any number of racing requests exactly one reaches the
        // factory; the rest join its entry. The entry lands before the
        // factory runs, so a re-entrant request observes it too. The
        // outer future doubles as the entry's ready future.
        let creation = Future::new();
        if let Some(entry) = self
            .registry
            .lookup_or_insert(link, creation.clone(), outer.clone())
        {
            self.chain_cached(link, entry, &outer);
            return outer;
        }

        self.diag(|| format!("creating module {link}"));

        let instance = ctx.factory().create(link);
        {
            let ctx = ctx.clone();
            let creation = creation.clone();
            let outer = outer.clone();
            instance.on_done(move |handle| {
                ctx.resolver().wire_instance(&ctx, link, handle, &creation, &outer);
            });
        }
        {
            let outer = outer.clone();
            instance.on_fail(move |cause| {
                let err = CoreError::Factory {
                    link,
                    reason: cause.to_string(),
                };
                error!("{err}");
                let _ = creation.reject(err.clone());
                let _ = outer.reject(err);
            });
        }
        outer
    }

    //--- Cached Path ------------------------------------------------------

    /// Chains a per-call future onto an existing registry entry.
    ///
    /// The entry's ready future settles once the original flow finishes
    /// init (the module's init is idempotent, so there is never a second
    /// initialization to race). Joining it, rather than poking init
    /// directly, also keeps an undetected long cycle pending instead of
    /// initializing a module whose dependencies were never resolved.
    fn chain_cached(&self, link: ModuleLink, entry: EntrySnapshot, outer: &Future<ModuleHandle>) {
        if entry.ready {
            self.diag(|| format!("reusing ready module {link}"));
        } else {
            self.diag(|| format!("joining in-flight creation of {link}"));
        }

        let outer_done = outer.clone();
        entry.ready_future.on_done(move |handle| {
            let _ = outer_done.resolve(handle);
        });
        let outer_fail = outer.clone();
        entry.ready_future.on_fail(move |err| {
            let _ = outer_fail.reject(err);
        });
    }

    //--- Instance Wiring --------------------------------------------------

    /// Runs set_up, settles the creation future, resolves dependencies,
    /// and hands off to init.
    fn wire_instance(
        &self,
        ctx: &AppContext,
        link: ModuleLink,
        handle: ModuleHandle,
        creation: &Future<ModuleHandle>,
        outer: &Future<ModuleHandle>,
    ) {
        handle.set_up(ctx);

        // The creation future settles before dependency resolution: a
        // mutual dependency discovered below must be able to observe
        // this instance, or both sides would wait on each other forever.
        let _ = creation.resolve(handle.clone());

        let dependencies = handle.dependencies();
        self.diag(|| format!("{link}: resolving {} dependencies", dependencies.len()));

        let waits: Vec<PooledFuture<()>> = dependencies
            .iter()
            .map(|_| self.wait_pool.acquire())
            .collect();
        for (dependency, wait) in dependencies.iter().zip(&waits) {
            self.wait_for_dependency(ctx, link, *dependency, wait.future());
        }

        let aggregate = all(waits.iter().map(|wait| wait.future()));
        {
            let ctx = ctx.clone();
            let outer = outer.clone();
            aggregate.on_done(move |_| {
                // The wait guards ride in this closure. When this fires
                // from inside the last wait's own resolve, that wait
                // still has a live handle on the settling stack, so its
                // guard drops the instance instead of recycling it; the
                // other waits (and, in the fully synchronous path, all
                // of them) return to the pool here.
                drop(waits);
                ctx.resolver().initialize(&ctx, link, handle, &outer);
            });
        }
        let outer_fail = outer.clone();
        aggregate.on_fail(move |err| {
            // Reachable only under the strict dependency policy.
            error!("dependency resolution for {link} failed: {err}");
            let _ = outer_fail.reject(err);
        });
    }

    //--- Dependency Waits -------------------------------------------------

    /// Settles `wait` once `dependency` is usable (or its failure has
    /// been dispositioned per policy).
    fn wait_for_dependency(
        &self,
        ctx: &AppContext,
        dependent: ModuleLink,
        dependency: ModuleLink,
        wait: Future<()>,
    ) {
        if let Some(entry) = self.registry.lookup(dependency) {
            self.diag(|| format!("{dependent}: waiting on in-flight {dependency}"));

            let dep_creation = entry.creation_future;
            let ctx = ctx.clone();
            let wait_done = wait.clone();
            dep_creation.on_done(move |dep_handle| {
                // Shallow cycle check: one hop of back-reference only.
                if dep_handle.dependencies().contains(&dependent) {
                    let warning = CoreError::CircularDependency {
                        from: dependent,
                        to: dependency,
                    };
                    warn!("{warning}; continuing without awaiting its init");
                    ctx.resolver()
                        .counters
                        .circular_warnings
                        .fetch_add(1, Ordering::Relaxed);
                    let _ = wait_done.resolve(());
                    return;
                }
                // No back-reference: chain a full create to await init.
                let resolved = ctx.resolver().create_module(&ctx, dependency);
                ctx.resolver()
                    .settle_wait(dependent, dependency, resolved, wait_done);
            });

            let policy = self.policy;
            let counters = Arc::clone(&self.counters);
            dep_creation.on_fail(move |err| {
                disposition_failure(policy, &counters, dependent, dependency, err, &wait);
            });
            return;
        }

        let resolved = self.create_module(ctx, dependency);
        self.settle_wait(dependent, dependency, resolved, wait);
    }

    fn settle_wait(
        &self,
        dependent: ModuleLink,
        dependency: ModuleLink,
        resolved: Future<ModuleHandle>,
        wait: Future<()>,
    ) {
        {
            let wait = wait.clone();
            resolved.on_done(move |_handle| {
                let _ = wait.resolve(());
            });
        }
        let policy = self.policy;
        let counters = Arc::clone(&self.counters);
        resolved.on_fail(move |err| {
            disposition_failure(policy, &counters, dependent, dependency, err, &wait);
        });
    }

    //--- Initialization ---------------------------------------------------

    fn initialize(
        &self,
        ctx: &AppContext,
        link: ModuleLink,
        handle: ModuleHandle,
        outer: &Future<ModuleHandle>,
    ) {
        self.diag(|| format!("initializing {link}"));

        let init = handle.init();
        {
            let ctx = ctx.clone();
            let outer = outer.clone();
            let handle = handle.clone();
            init.on_done(move |_| {
                ctx.resolver().registry.mark_ready(link, handle.clone());
                ctx.resolver().diag(|| format!("module {link} ready"));
                let _ = outer.resolve(handle);
            });
        }
        let outer = outer.clone();
        init.on_fail(move |cause| {
            let err = CoreError::Init {
                link,
                reason: cause.to_string(),
            };
            error!("{err}");
            // Never enters the ready registry; siblings are unaffected.
            let _ = outer.reject(err);
        });
    }

    //--- Diagnostics ------------------------------------------------------

    // Verbose module diagnostics are opt-in; control flow never depends
    // on the flag.
    fn diag<F: FnOnce() -> String>(&self, message: F) {
        if self.verbose {
            debug!("{}", message());
        }
    }
}

fn disposition_failure(
    policy: DependencyFailurePolicy,
    counters: &StatsCounters,
    dependent: ModuleLink,
    dependency: ModuleLink,
    error: CoreError,
    wait: &Future<()>,
) {
    match policy {
        DependencyFailurePolicy::Tolerant => {
            warn!("dependency {dependency} of {dependent} failed ({error}); continuing without it");
            counters
                .swallowed_dependency_failures
                .fetch_add(1, Ordering::Relaxed);
            let _ = wait.resolve(());
        }
        DependencyFailurePolicy::Strict => {
            let _ = wait.reject(error);
        }
    }
}

//=========================================================================
// Tests
//=========================================================================
