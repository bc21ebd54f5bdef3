//! The format description and everything derived from it: tile pyramids, categories,
//! layer info and the generation of tile addresses for a viewport.

mod category;
mod desc;
mod layer_info;
mod params_gen;
mod tile_scale;

pub use category::TileCategory;
pub use desc::*;
pub use layer_info::LayerInfo;
pub use params_gen::*;
pub use tile_scale::{TileGeometry, TileScale};

#[cfg(any(test, feature = "test"))]
mod mock;
#[cfg(any(test, feature = "test"))]
pub use mock::*;
