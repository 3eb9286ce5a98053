//=========================================================================
// Prelude
//=========================================================================
//
// Convenience module that re-exports commonly used types and traits.
//
// Usage:
//   use aetheric_framework::prelude::*;
//
//=========================================================================

//=== Public API ==========================================================

// Application entry points
pub use crate::app::{AppBuilder, AppContext};

// Future primitive and combinators
pub use crate::core::future::{all, race, Future, FutureState};

// Dispatch
pub use crate::core::dispatch::Dispatcher;

// Module system
pub use crate::core::module::{
    DependencyFailurePolicy, InitGate, LoadPolicy, Module, ModuleFactory, ModuleHandle,
    ModuleKind, ModuleLink, ModuleRole,
};

// Errors
pub use crate::core::error::CoreError;
