use super::MC2_UNITS_PER_DEGREE;
use std::fmt::Debug;

/// A position in MC2 units, the integer world coordinate system of the tile format.
///
/// 2^32 units cover the full circle, so latitude and longitude both fit in an `i32`.
/// Coordinates stored in a tile are always snapped to a multiple of the tile's
/// scale quantum, see [`Mc2Coord::snapped`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mc2Coord {
	pub lat: i32,
	pub lon: i32,
}

impl Mc2Coord {
	#[must_use]
	pub const fn new(lat: i32, lon: i32) -> Mc2Coord {
		Mc2Coord { lat, lon }
	}

	/// Converts WGS84 degrees into MC2 units. Values outside the `i32` range saturate.
	#[must_use]
	pub fn from_degrees(lat: f64, lon: f64) -> Mc2Coord {
		Mc2Coord {
			lat: (lat * MC2_UNITS_PER_DEGREE).round() as i32,
			lon: (lon * MC2_UNITS_PER_DEGREE).round() as i32,
		}
	}

	/// Returns `(lat, lon)` in degrees.
	#[must_use]
	pub fn as_degrees(&self) -> (f64, f64) {
		(
			f64::from(self.lat) / MC2_UNITS_PER_DEGREE,
			f64::from(self.lon) / MC2_UNITS_PER_DEGREE,
		)
	}

	/// Rounds both components towards zero to a multiple of `scale`.
	///
	/// A non-positive scale leaves the coordinate untouched.
	#[must_use]
	pub fn snapped(&self, scale: i32) -> Mc2Coord {
		if scale <= 0 {
			return *self;
		}
		Mc2Coord {
			lat: scale * (self.lat / scale),
			lon: scale * (self.lon / scale),
		}
	}
}

impl Debug for Mc2Coord {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "({}, {})", self.lat, self.lon)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case((1005, -1005), 10, (1000, -1000))]
	#[case((999, 9), 10, (990, 0))]
	#[case((7, 7), 1, (7, 7))]
	#[case((7, 7), 0, (7, 7))]
	fn snapping(#[case] input: (i32, i32), #[case] scale: i32, #[case] expected: (i32, i32)) {
		let snapped = Mc2Coord::new(input.0, input.1).snapped(scale);
		assert_eq!((snapped.lat, snapped.lon), expected);
	}

	#[test]
	fn degrees() {
		let coord = Mc2Coord::from_degrees(45.0, -90.0);
		assert_eq!(coord, Mc2Coord::new(536_870_912, -1_073_741_824));
		let (lat, lon) = coord.as_degrees();
		assert!((lat - 45.0).abs() < 1e-9);
		assert!((lon + 90.0).abs() < 1e-9);
	}
}
