//! Value types shared across the crate: coordinates, boxes, addresses and buffers.

mod blob;
pub use blob::*;

mod constants;
pub use constants::*;

mod layer;
pub use layer::*;

mod mc2_bbox;
pub use mc2_bbox::*;

mod mc2_coord;
pub use mc2_coord::*;

mod route_id;
pub use route_id::*;

mod tile_map_type;
pub use tile_map_type::*;
