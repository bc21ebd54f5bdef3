//! Coordinate and layer constants shared by the codec, the format description and the cache.

/// MC2 units per meter along the equator: 2^32 units spread over 40 000 km.
pub const METER_TO_MC2SCALE: f64 = 4_294_967_296.0 / 40_000_000.0;

/// MC2 units per degree: 2^32 units per full circle.
pub const MC2_UNITS_PER_DEGREE: f64 = 4_294_967_296.0 / 360.0;

/// Southern limit used when capping string tiles to the drawable latitude range.
pub const MIN_CAPPED_LAT: i32 = i32::MIN / 2 + 1;

/// Northern limit used when capping string tiles to the drawable latitude range.
pub const MAX_CAPPED_LAT: i32 = i32::MAX / 2 - 1;

/// Layer id of the base map.
pub const MAP_LAYER: u32 = 0;
/// Layer id of the route overlay. Only this layer carries a route id in its address.
pub const ROUTE_LAYER: u32 = 1;
pub const POI_LAYER: u32 = 2;
pub const TRAFFIC_LAYER: u32 = 3;
pub const ACP_LAYER: u32 = 4;
pub const EVENT_LAYER: u32 = 5;

/// Language code used for data tiles, which carry no text.
pub const NEUTRAL_LANGUAGE: u32 = 0;
