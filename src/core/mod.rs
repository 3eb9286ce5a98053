//=========================================================================
// Framework Core
//=========================================================================
//
// The load-bearing subsystems, leaves first:
//
// - `future`:   settle-once async values, combinators, instance pool
// - `dispatch`: owner-thread job queue and async worker pool
// - `module`:   declarative service modules and the dependency resolver
//
// `error` holds the taxonomy shared by all of them.
//
//=========================================================================

pub mod dispatch;
pub mod error;
pub mod future;
pub mod module;
