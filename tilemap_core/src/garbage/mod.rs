//! Deferred destruction of tiles evicted from the tile cache.

mod collector;
mod scheduler;

pub use collector::*;
pub use scheduler::*;
