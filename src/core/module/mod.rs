//=========================================================================
// Module Subsystem
//=========================================================================
//
// Declarative service modules: the identity key, the module and factory
// contracts, and the future-driven resolver with its registry.
//
//=========================================================================

mod factory;
mod link;
mod module;
mod registry;
mod resolver;

pub use factory::{LoadPolicy, ModuleFactory};
pub use link::{ModuleKind, ModuleLink, ModuleRole};
pub use module::{InitGate, Module, ModuleHandle};
pub use resolver::{DependencyFailurePolicy, ResolverStats};

pub(crate) use resolver::ModuleResolver;
