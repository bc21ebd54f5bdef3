//! Tile map core: the codec and the cache behind a tiled vector map.
//!
//! This crate exposes the building blocks a map client needs between the network and the
//! renderer:
//! - a bit codec ([`io`]) and the tile formats built on it: feature arguments, features,
//!   whole tiles and the format description that describes them,
//! - the packed tile address [`TileMapParams`] and its generation for a viewport,
//! - a chained buffer cache ([`DBufRequester`], [`MemoryDBufRequester`]),
//! - the tile cache [`TileMapContainer`], which picks the best of four tiers of decoded
//!   tiles for every layer and importance,
//! - a deferred collector ([`TileMapGarbage`]) that destroys evicted tiles at idle time.
//!
//! # Quick start
//! ```rust
//! use tilemap_core::*;
//!
//! let params = TileMapParams::new_data(MAP_LAYER, 2, 1, -3, 4);
//! let text = params.to_string();
//! let decoded = TileMapParams::from_string(&text);
//! assert!(decoded.is_valid());
//! assert_eq!(decoded, params);
//! ```

pub mod io;

mod buffer;
/// Re-exports the buffer request chain and the bounded memory cache.
pub use buffer::*;

mod compression;
pub use compression::*;

mod config;
pub use config::*;

mod container;
/// Re-exports the tile cache and its storage tiers.
pub use container::*;

mod feature;
/// Re-exports feature arguments, features and primitives.
pub use feature::*;

mod format;
/// Re-exports the format description and parameter generation.
pub use format::*;

mod garbage;
pub use garbage::*;

mod importance;
pub use importance::*;

mod params;
pub use params::*;

mod tile_map;
pub use tile_map::*;

mod types;
pub use types::*;
