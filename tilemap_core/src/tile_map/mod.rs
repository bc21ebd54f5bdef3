//! Decoded tiles and their binary layout.
//!
//! # Overview
//!
//! A tile buffer is byte aligned and may be gzipped as a whole. It starts with an empty
//! string and continues by tile type:
//!
//! - data tiles: the header arguments, a 31-bit feature count and the feature records;
//! - string tiles: 4-bit string index width, 4-bit feature index width, the feature count,
//!   the number of features with strings and the number of strings, then
//!   `(feature index, string index)` pairs and the NUL-terminated strings.
//!
//! After alignment follow the CRC (BA u32, only for non-empty tiles) and the empty
//! importance bitmap (BA u16). String tiles with features end with the feature category
//! table and the extended string table. The CRC of a data tile covers its header and
//! features. Its string tile repeats it so that a mismatched pair can be detected.

mod tables;
mod tile;

pub use tables::{ExtendedString, FeatureCategory};
pub use tile::*;
