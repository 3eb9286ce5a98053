//=========================================================================
// Module Link
//=========================================================================
//
// Identity key for module resolution.
//
// A link pairs the interface role a module fulfils with the concrete
// kind that implements it. Equality is structural, so a link can be
// rebuilt anywhere and still hit the same registry entry. Callers never
// hold on to instance identity.
//
//=========================================================================

use std::fmt;

//=== Role / Kind =========================================================

/// Interface role a module fulfils (e.g. "clock", "storage").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleRole(pub &'static str);

impl fmt::Display for ModuleRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Concrete implementation kind behind a role (e.g. "system_clock").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleKind(pub &'static str);

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

//=== ModuleLink ==========================================================

/// Identity key pairing an interface role with an implementation kind.
///
/// Used as the map key for every cache in the resolver. Structural
/// equality only; two links with the same role and kind are the same
/// module as far as the registry is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleLink {
    pub role: ModuleRole,
    pub kind: ModuleKind,
}

impl ModuleLink {
    /// Creates a link from a role and the kind implementing it.
    pub fn new(role: ModuleRole, kind: ModuleKind) -> Self {
        Self { role, kind }
    }
}

impl fmt::Display for ModuleLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.role)
    }
}

//=========================================================================
// Tests
//=========================================================================
