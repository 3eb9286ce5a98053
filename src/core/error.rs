//=========================================================================
// Core Errors
//=========================================================================
//
// Error taxonomy shared by the future primitive and the module resolver.
//
// Errors travel inside futures, and a rejected future fans its error out
// to every registered fail listener, so every variant must be cheap to
// clone. Formatted messages are part of the observable contract (they are
// what diagnostics and tests look at), hence the derive.
//
//=========================================================================

//=== External Dependencies ===============================================

use thiserror::Error;

//=== Internal Dependencies ===============================================

use crate::core::module::ModuleLink;

//=== CoreError ===========================================================

/// Errors produced by the future primitive and the module resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A settle or progress call was made on a future that already left
    /// the `Pending` state. The first outcome is untouched; the offending
    /// call is a no-op apart from this error.
    #[error("future misuse: {0}")]
    Misuse(&'static str),

    /// No implementation is mapped to the requested link.
    #[error("no module defined for {0}")]
    NotFound(ModuleLink),

    /// The factory failed to produce an instance for the link.
    #[error("cannot create module of kind {} implementing {}: {reason}", .link.kind, .link.role)]
    Factory { link: ModuleLink, reason: String },

    /// A one-hop dependency cycle was detected during resolution.
    ///
    /// Under the tolerant policy this is only ever logged and counted;
    /// it surfaces as a rejection only when a test harness asks for it.
    #[error("circular dependency: {from} <-> {to}")]
    CircularDependency { from: ModuleLink, to: ModuleLink },

    /// The module's own `init` failed. Fatal to that module only.
    #[error("module {link} failed to initialize: {reason}")]
    Init { link: ModuleLink, reason: String },

    /// Free-form failure raised by user callbacks or test doubles.
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Convenience constructor for user-originated failures.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::module::{ModuleKind, ModuleRole};

    fn link() -> ModuleLink {
        ModuleLink::new(ModuleRole("clock"), ModuleKind("system_clock"))
    }

    #[test]
    fn factory_error_message_names_kind_and_role() {
        let err = CoreError::Factory {
            link: link(),
            reason: "prefab missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot create module of kind system_clock implementing clock: prefab missing"
        );
    }

    #[test]
    fn errors_are_cloneable_and_comparable() {
        let err = CoreError::NotFound(link());
        let copy = err.clone();
        assert_eq!(err, copy);
    }

    #[test]
    fn misuse_message_carries_context() {
        let err = CoreError::Misuse("resolve on settled future");
        assert_eq!(err.to_string(), "future misuse: resolve on settled future");
    }
}
