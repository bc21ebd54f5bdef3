//! Numeric names of feature arguments, stored as 8 bits on the wire.

pub type ArgName = u8;

pub const COLOR: ArgName = 0;
pub const BORDER_COLOR: ArgName = 1;
pub const WIDTH: ArgName = 2;
pub const WIDTH_METERS: ArgName = 3;
pub const BORDER_WIDTH: ArgName = 4;
pub const COORD: ArgName = 5;
pub const COORDS: ArgName = 6;
pub const IMAGE_NAME: ArgName = 7;
pub const NAME_TYPE: ArgName = 8;
pub const FONT_TYPE: ArgName = 9;
pub const FONT_SIZE: ArgName = 10;
pub const LEVEL: ArgName = 11;
pub const TIME: ArgName = 12;
pub const DURATION: ArgName = 13;
pub const EXT_ID: ArgName = 14;
pub const REAL_FEATURE_TYPE: ArgName = 15;
pub const MIN_SCALE: ArgName = 16;
pub const MAX_SCALE: ArgName = 17;
pub const RADIUS: ArgName = 18;
