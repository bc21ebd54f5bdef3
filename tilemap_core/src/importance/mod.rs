//! Importance tables: which feature types are worth sending at which scale and detail level.

mod notice;
mod table;

pub use notice::*;
pub use table::*;
