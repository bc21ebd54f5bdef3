//! Gzip wrapping of whole tile buffers and the CRC-32 used to pair data and string tiles.

mod gzip;
pub use gzip::*;
