//! The packed tile address.

mod tile_map_params;
pub use tile_map_params::*;
