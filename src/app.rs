//=========================================================================
// Application Context
//=========================================================================
//
// Entry point and coordinator for the framework.
//
// Architecture:
// ```text
//     AppBuilder ──build()──> AppContext (cheap clonable handle)
//         │                      ├─ ModuleResolver + registry
//         ├─ with_factory()      ├─ ModuleFactory (collaborator)
//         ├─ with_*() knobs      └─ Dispatcher (owner = building thread)
//         └─ build()
// ```
//
// There is deliberately no process-wide singleton: the context is an
// explicit value handed to the resolver and into every module's set_up,
// and its lifecycle (build / shutdown) belongs to the caller. The host
// engine integrates by calling `tick()` once per logic-thread iteration
// and `shutdown()` on exit.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;

use log::info;

//=== Internal Dependencies ===============================================

use crate::core::dispatch::Dispatcher;
use crate::core::future::{all, Future};
use crate::core::module::{
    DependencyFailurePolicy, LoadPolicy, Module, ModuleFactory, ModuleHandle, ModuleLink,
    ModuleResolver, ResolverStats,
};

//=== AppBuilder ==========================================================

/// Builder for configuring and constructing an [`AppContext`].
///
/// # Default Values
///
/// - **Dependency failure policy**: [`DependencyFailurePolicy::Tolerant`]
/// - **Verbose module diagnostics**: off
/// - **Async worker threads**: 2
///
/// A factory is required; [`AppBuilder::build`] panics without one.
///
/// # Examples
///
/// ```no_run
/// use aetheric_framework::AppBuilder;
/// # use aetheric_framework::core::future::Future;
/// # use aetheric_framework::core::module::{LoadPolicy, ModuleFactory, ModuleHandle, ModuleLink};
/// # struct GameFactory;
/// # impl ModuleFactory for GameFactory {
/// #     fn create(&self, _: ModuleLink) -> Future<ModuleHandle> { Future::new() }
/// #     fn defined_links(&self, _: LoadPolicy) -> Vec<ModuleLink> { Vec::new() }
/// # }
///
/// let app = AppBuilder::new()
///     .with_factory(GameFactory)
///     .with_verbose_diagnostics(true)
///     .build();
/// app.boot();
/// ```
pub struct AppBuilder {
    factory: Option<Arc<dyn ModuleFactory>>,
    policy: DependencyFailurePolicy,
    verbose_diagnostics: bool,
    async_workers: usize,
}

impl AppBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            factory: None,
            policy: DependencyFailurePolicy::Tolerant,
            verbose_diagnostics: false,
            async_workers: 2,
        }
    }

    /// Sets the module factory. Required.
    pub fn with_factory<F>(self, factory: F) -> Self
    where
        F: ModuleFactory + 'static,
    {
        self.with_factory_arc(Arc::new(factory))
    }

    /// Sets an already-shared module factory.
    pub fn with_factory_arc<F>(mut self, factory: Arc<F>) -> Self
    where
        F: ModuleFactory + 'static,
    {
        self.factory = Some(factory);
        self
    }

    /// Sets how a failed dependency affects its dependents.
    ///
    /// Default: tolerant; partial boot beats total failure.
    pub fn with_dependency_failure_policy(mut self, policy: DependencyFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enables per-module resolution diagnostics at debug level.
    /// Control flow never varies with this flag.
    pub fn with_verbose_diagnostics(mut self, verbose: bool) -> Self {
        self.verbose_diagnostics = verbose;
        self
    }

    /// Sets the number of background worker threads for
    /// [`Dispatcher::run_async`].
    ///
    /// # Panics
    ///
    /// Panics if `count == 0`.
    pub fn with_async_workers(mut self, count: usize) -> Self {
        assert!(count > 0, "Worker count must be positive");
        self.async_workers = count;
        self
    }

    /// Builds the application context.
    ///
    /// The calling thread becomes the dispatcher's owner thread.
    ///
    /// # Panics
    ///
    /// Panics if no factory was configured.
    pub fn build(self) -> AppContext {
        let factory = self.factory.expect("AppBuilder requires a module factory");
        info!(
            "Building application context (policy: {:?}, workers: {})",
            self.policy, self.async_workers
        );

        AppContext {
            inner: Arc::new(AppInner {
                resolver: ModuleResolver::new(self.policy, self.verbose_diagnostics),
                factory,
                dispatcher: Dispatcher::new(self.async_workers),
            }),
        }
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//=== AppContext ==========================================================

struct AppInner {
    resolver: ModuleResolver,
    factory: Arc<dyn ModuleFactory>,
    dispatcher: Dispatcher,
}

/// Handle to the running application.
///
/// Cloning is cheap and every clone drives the same resolver, registry,
/// and dispatcher. This is the only surface by which the rest of the
/// framework (UI, gameplay) drives or queries module resolution.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<AppInner>,
}

impl AppContext {
    //--- Module Resolution ------------------------------------------------

    /// Constructs and initializes the module behind `link` (or joins the
    /// in-flight construction). See
    /// [`DependencyFailurePolicy`] for how dependency failures surface.
    pub fn create_module(&self, link: ModuleLink) -> Future<ModuleHandle> {
        self.inner.resolver.create_module(self, link)
    }

    /// Typed handle to a ready module, if one of type `T` finished init.
    ///
    /// A module whose init failed is simply absent here.
    pub fn get_module<T>(&self) -> Option<Arc<T>>
    where
        T: Module + 'static,
    {
        self.inner.resolver.registry().get_module::<T>()
    }

    /// Link under which a ready module of type `T` is registered.
    pub fn get_module_link<T>(&self) -> Option<ModuleLink>
    where
        T: Module + 'static,
    {
        self.inner.resolver.registry().get_module_link::<T>()
    }

    /// Creates every eagerly-loaded module the factory defines.
    ///
    /// The returned future resolves once all of them are ready;
    /// with the tolerant policy a failed module rejects only its own
    /// creation, so the boot aggregate rejects at the first such
    /// failure while the remaining modules keep coming up.
    pub fn boot(&self) -> Future<()> {
        let links = self.inner.factory.defined_links(LoadPolicy::Eager);
        info!("Booting {} eager modules", links.len());
        all(links.into_iter().map(|link| self.create_module(link)))
    }

    //--- Host Integration -------------------------------------------------

    /// Pumps the dispatcher: runs work marshaled onto the owner thread.
    /// Call once per logic-thread iteration.
    pub fn tick(&self) {
        self.inner.dispatcher.tick();
    }

    /// The owner-thread dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Snapshot of resolver diagnostics counters.
    pub fn stats(&self) -> ResolverStats {
        self.inner.resolver.stats()
    }

    /// Unloads every ready module in reverse readiness order and drops
    /// all registry entries. Modules are absent from
    /// [`AppContext::get_module`] afterwards.
    pub fn shutdown(&self) {
        info!(
            "Shutting down; unloading {} modules",
            self.inner.resolver.registry().ready_len()
        );
        self.inner.resolver.registry().shutdown();
    }

    //--- Crate-internal ---------------------------------------------------

    pub(crate) fn factory(&self) -> &dyn ModuleFactory {
        self.inner.factory.as_ref()
    }

    pub(crate) fn resolver(&self) -> &ModuleResolver {
        &self.inner.resolver
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use crate::core::error::CoreError;
    use crate::core::future::FutureState;
    use crate::core::module::{InitGate, ModuleKind, ModuleRole};

    //--- Test Modules -----------------------------------------------------

    struct ClockModule {
        gate: InitGate,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Module for ClockModule {
        fn set_up(&self, _ctx: &AppContext) {}

        fn init(&self) -> Future<()> {
            self.gate.get_or_start(|future| {
                let _ = future.resolve(());
            })
        }

        fn unload(&self) {
            self.events.lock().push("unload:clock".to_string());
        }

        fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    struct StorageModule {
        gate: InitGate,
        fail_init: bool,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Module for StorageModule {
        fn set_up(&self, _ctx: &AppContext) {}

        fn init(&self) -> Future<()> {
            self.gate.get_or_start(|future| {
                if self.fail_init {
                    let _ = future.reject(CoreError::other("db down"));
                } else {
                    let _ = future.resolve(());
                }
            })
        }

        fn unload(&self) {
            self.events.lock().push("unload:storage".to_string());
        }

        fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    //--- Test Factory -----------------------------------------------------

    struct MapFactory {
        eager: Vec<ModuleLink>,
        instances: HashMap<ModuleLink, ModuleHandle>,
    }

    impl ModuleFactory for MapFactory {
        fn create(&self, link: ModuleLink) -> Future<ModuleHandle> {
            let future = Future::new();
            match self.instances.get(&link) {
                Some(handle) => {
                    let _ = future.resolve(handle.clone());
                }
                None => {
                    let _ = future.reject(CoreError::other("no instance"));
                }
            }
            future
        }

        fn defined_links(&self, policy: LoadPolicy) -> Vec<ModuleLink> {
            match policy {
                LoadPolicy::Eager => self.eager.clone(),
                LoadPolicy::Lazy => Vec::new(),
            }
        }
    }

    fn clock_link() -> ModuleLink {
        ModuleLink::new(ModuleRole("clock"), ModuleKind("system_clock"))
    }

    fn storage_link() -> ModuleLink {
        ModuleLink::new(ModuleRole("storage"), ModuleKind("disk_storage"))
    }

    fn two_module_app(fail_storage: bool, events: Arc<Mutex<Vec<String>>>) -> AppContext {
        let mut instances: HashMap<ModuleLink, ModuleHandle> = HashMap::new();
        instances.insert(
            clock_link(),
            Arc::new(ClockModule {
                gate: InitGate::new(),
                events: Arc::clone(&events),
            }),
        );
        instances.insert(
            storage_link(),
            Arc::new(StorageModule {
                gate: InitGate::new(),
                fail_init: fail_storage,
                events,
            }),
        );
        AppBuilder::new()
            .with_factory(MapFactory {
                eager: vec![clock_link(), storage_link()],
                instances,
            })
            .build()
    }

    //--- Builder Tests ----------------------------------------------------

    #[test]
    fn builder_defaults() {
        let builder = AppBuilder::new();
        assert_eq!(builder.policy, DependencyFailurePolicy::Tolerant);
        assert!(!builder.verbose_diagnostics);
        assert_eq!(builder.async_workers, 2);
    }

    #[test]
    fn builder_fluent_api_chaining() {
        let builder = AppBuilder::new()
            .with_dependency_failure_policy(DependencyFailurePolicy::Strict)
            .with_verbose_diagnostics(true)
            .with_async_workers(4);
        assert_eq!(builder.policy, DependencyFailurePolicy::Strict);
        assert!(builder.verbose_diagnostics);
        assert_eq!(builder.async_workers, 4);
    }

    #[test]
    #[should_panic(expected = "requires a module factory")]
    fn builder_build_panics_without_a_factory() {
        AppBuilder::new().build();
    }

    #[test]
    #[should_panic(expected = "Worker count must be positive")]
    fn builder_rejects_zero_workers() {
        AppBuilder::new().with_async_workers(0);
    }

    //--- Context Tests ----------------------------------------------------

    #[test]
    fn boot_readies_every_eager_module() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let app = two_module_app(false, events);

        let booted = app.boot();
        assert_eq!(booted.state(), FutureState::Resolved);
        assert!(app.get_module::<ClockModule>().is_some());
        assert!(app.get_module::<StorageModule>().is_some());
    }

    #[test]
    fn failed_module_is_absent_from_typed_lookup() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let app = two_module_app(true, events);

        let booted = app.boot();
        // The boot aggregate reports the failure...
        assert_eq!(booted.state(), FutureState::Rejected);
        // ...but the sibling still came up.
        assert!(app.get_module::<ClockModule>().is_some());
        assert!(app.get_module::<StorageModule>().is_none());
    }

    #[test]
    fn get_module_link_finds_the_registration_key() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let app = two_module_app(false, events);
        app.boot();

        assert_eq!(app.get_module_link::<ClockModule>(), Some(clock_link()));
        assert_eq!(
            app.get_module_link::<StorageModule>(),
            Some(storage_link())
        );
    }

    #[test]
    fn get_module_on_an_unbooted_app_is_none() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let app = two_module_app(false, events);
        assert!(app.get_module::<ClockModule>().is_none());
        assert_eq!(app.get_module_link::<ClockModule>(), None);
    }

    #[test]
    fn shutdown_unloads_in_reverse_readiness_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let app = two_module_app(false, Arc::clone(&events));

        // Readiness order: clock first, then storage.
        app.create_module(clock_link());
        app.create_module(storage_link());
        app.shutdown();

        assert_eq!(
            *events.lock(),
            vec!["unload:storage".to_string(), "unload:clock".to_string()]
        );
        assert!(app.get_module::<ClockModule>().is_none());
        assert!(app.get_module::<StorageModule>().is_none());
    }

    #[test]
    fn tick_pumps_marshaled_settlements() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let app = two_module_app(false, events);

        let future: Future<i32> = Future::new();
        {
            let dispatcher = app.dispatcher().clone();
            let future = future.clone();
            std::thread::spawn(move || future.resolve_on(&dispatcher, 21))
                .join()
                .unwrap();
        }

        assert!(future.is_pending());
        app.tick();
        assert_eq!(future.result(), Some(21));
    }

    #[test]
    fn clones_share_the_same_registry() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let app = two_module_app(false, events);
        let clone = app.clone();

        clone.boot();
        assert!(app.get_module::<ClockModule>().is_some());
    }
}
