//=========================================================================
// Aetheric Framework — Library Root
//
// Application framework layered over the Aetheric Engine.
//
// Responsibilities:
// - Expose the settle-once Future primitive and its combinators
// - Provide the owner-thread Dispatcher for cross-thread marshaling
// - Resolve declarative module graphs (construction, dependency
//   ordering, single-flight caching) through the AppContext
//
// Typical usage:
// ```no_run
// use aetheric_framework::AppBuilder;
// # use aetheric_framework::core::future::Future;
// # use aetheric_framework::core::module::{LoadPolicy, ModuleFactory, ModuleHandle, ModuleLink};
// # struct GameFactory;
// # impl ModuleFactory for GameFactory {
// #     fn create(&self, _: ModuleLink) -> Future<ModuleHandle> { Future::new() }
// #     fn defined_links(&self, _: LoadPolicy) -> Vec<ModuleLink> { Vec::new() }
// # }
//
// let app = AppBuilder::new().with_factory(GameFactory).build();
// let booted = app.boot();
// // integrate with the host loop:
// loop {
//     app.tick();
//     if booted.is_settled() { break; }
// }
// ```
//
//=========================================================================

//--- Public Modules ------------------------------------------------------
//
// `core` contains the framework subsystems (futures, dispatch, modules).
// It is exposed publicly for framework-level extensibility, but normal
// application code will mostly use the top-level `AppContext` facade.
//
pub mod core;

//--- Internal Modules ----------------------------------------------------
//
// `app` defines the application entry point: the builder and the
// context handle every module receives.
//
mod app;

//--- Public Exports ------------------------------------------------------
//
// Re-exports the builder and context as the main entry points, so users
// can `use aetheric_framework::AppBuilder;` without knowing the internal
// module structure.
//
pub use app::{AppBuilder, AppContext};

pub mod prelude;
