//! # tilemap
//!
//! Command line tools around [`tilemap_core`]: decode and encode tile addresses, summarise
//! format descriptions, dump single tiles and list the tiles covering a viewport.
//!
//! The library part only re-exports the core crate.
//!
//! ```rust
//! use tilemap::core::*;
//!
//! let params = TileMapParams::from_string("G!");
//! assert!(!params.is_valid());
//! ```

pub use tilemap_core as core;
