//=========================================================================
// Future Subsystem
//=========================================================================
//
// Settle-once futures, the derived combinators, and the instance pool.
//
//=========================================================================

mod combinators;
mod future;
mod pool;

pub use combinators::{all, race};
pub use future::{Future, FutureState};
pub use pool::{FuturePool, PooledFuture};
