//=========================================================================
// Module Trait
//=========================================================================
//
// Contract every resolvable service implements.
//
// Lifecycle (driven by the resolver):
//   factory create ──> set_up(ctx) ──> dependencies wired ──> init()
//
// Modules are held behind `Arc<dyn Module>` and shared across futures
// and threads, so implementations take `&self` and manage their own
// interior mutability.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

//=== Internal Dependencies ===============================================

use crate::app::AppContext;
use crate::core::future::Future;
use super::ModuleLink;

//=== Module ==============================================================

/// Shared handle to a constructed module instance.
pub type ModuleHandle = Arc<dyn Module>;

/// A resolvable service.
pub trait Module: Send + Sync {
    /// Called once, immediately after construction, before dependency
    /// resolution. Stash whatever the module needs from the context.
    fn set_up(&self, ctx: &AppContext);

    /// Starts (or joins) asynchronous initialization.
    ///
    /// Must be idempotent: repeated calls return the *same* future, so a
    /// duplicate resolution request never initializes twice. [`InitGate`]
    /// provides this behavior ready-made.
    fn init(&self) -> Future<()>;

    /// Links this module depends on. A static table per kind; the
    /// resolver never discovers dependencies by introspection.
    fn dependencies(&self) -> Vec<ModuleLink> {
        Vec::new()
    }

    /// Called during application shutdown, in reverse readiness order.
    fn unload(&self) {}

    /// Downcast support for typed registry queries; implement as
    /// `fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> { self }`.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

//=== InitGate ============================================================

/// Take-once holder for a module's shared init future.
///
/// Embeds the idempotency the [`Module::init`] contract requires:
/// the first call creates the future and hands the starter a settle
/// handle; every later call returns the same future, whatever its state.
pub struct InitGate {
    slot: Mutex<Option<Future<()>>>,
}

impl InitGate {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Returns the shared init future, running `start` exactly once on
    /// the first call. `start` receives a handle it settles when the
    /// module's initialization completes (possibly synchronously).
    pub fn get_or_start<F>(&self, start: F) -> Future<()>
    where
        F: FnOnce(Future<()>),
    {
        let created = {
            let mut slot = self.slot.lock();
            if let Some(existing) = &*slot {
                return existing.clone();
            }
            let future = Future::new();
            *slot = Some(future.clone());
            future
        };
        // `start` runs outside the lock: it may settle synchronously and
        // fire listeners.
        start(created.clone());
        created
    }
}

impl Default for InitGate {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================
// Tests
//=========================================================================
