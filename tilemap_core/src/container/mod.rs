//! The tile cache.
//!
//! Decoded tiles are kept in [`MapStorage`] tiers. [`TileMapContainer`] decides, per layer
//! and importance, which tier the renderer draws from, preferring any tier that covers
//! the whole view over the one that is merely current.

mod coverage;
mod storage;
mod tile_container;

pub use coverage::*;
pub use storage::*;
pub use tile_container::*;
