//=========================================================================
// Module Factory
//=========================================================================
//
// Collaborator contract for producing raw module instances.
//
// The resolver never assumes how instances come to exist (engine
// instantiation, plain allocation, loading from an asset bundle); it
// only sees a future for the handle.
//
//=========================================================================

use crate::core::future::Future;
use super::{ModuleHandle, ModuleLink};

//=== LoadPolicy ==========================================================

/// When a defined link is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Constructed during application boot.
    Eager,
    /// Constructed on first request.
    Lazy,
}

//=== ModuleFactory =======================================================

/// Produces module instances for defined links.
pub trait ModuleFactory: Send + Sync {
    /// Instantiates the raw module behind `link`. May settle
    /// synchronously or after asynchronous work (asset loads, engine
    /// instantiation). `set_up`/`init` are the resolver's job, not the
    /// factory's.
    fn create(&self, link: ModuleLink) -> Future<ModuleHandle>;

    /// Every link defined under the given load policy.
    fn defined_links(&self, policy: LoadPolicy) -> Vec<ModuleLink>;

    /// Whether any implementation is mapped to `link`.
    fn defines(&self, link: ModuleLink) -> bool {
        self.defined_links(LoadPolicy::Eager).contains(&link)
            || self.defined_links(LoadPolicy::Lazy).contains(&link)
    }
}
