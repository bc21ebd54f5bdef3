//! Tile features and their arguments.
//!
//! A data tile is a list of [`TileFeature`]s. Each feature has a type and a list of
//! [`FeatureArg`]s whose shape is given by the format description. Coordinates live in
//! one arena per tile; arguments and primitives refer to it by index range.

mod arg;
mod arg_container;
pub mod arg_name;
mod tile_feature;

pub use arg::*;
pub use arg_container::*;
pub use arg_name::ArgName;
pub use tile_feature::*;
