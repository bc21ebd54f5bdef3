use super::Mc2Coord;
use anyhow::{Result, ensure};
use std::fmt::Debug;

/// An axis-aligned box in MC2 units, inclusive on all sides.
///
/// Used for the projected viewport handed to parameter generation and for the
/// bounding box of a decoded coordinate sequence.
///
/// # Examples
/// ```
/// use tilemap_core::{Mc2BBox, Mc2Coord};
///
/// let mut bbox = Mc2BBox::from_coord(Mc2Coord::new(10, 20));
/// bbox.extend(Mc2Coord::new(-5, 40));
/// assert_eq!(bbox.as_tuple(), (-5, 20, 10, 40));
/// assert_eq!(bbox.center(), Mc2Coord::new(2, 30));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mc2BBox {
	pub min_lat: i32,
	pub min_lon: i32,
	pub max_lat: i32,
	pub max_lon: i32,
}

impl Mc2BBox {
	/// Creates a box from `min_lat, min_lon, max_lat, max_lon`.
	///
	/// # Errors
	/// Returns an error if a minimum is larger than its maximum.
	pub fn new(min_lat: i32, min_lon: i32, max_lat: i32, max_lon: i32) -> Result<Mc2BBox> {
		ensure!(min_lat <= max_lat, "min_lat ({min_lat}) must be <= max_lat ({max_lat})");
		ensure!(min_lon <= max_lon, "min_lon ({min_lon}) must be <= max_lon ({max_lon})");
		Ok(Mc2BBox {
			min_lat,
			min_lon,
			max_lat,
			max_lon,
		})
	}

	/// Creates a box from corners given in degrees, in any order.
	pub fn from_degrees(lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> Mc2BBox {
		let a = Mc2Coord::from_degrees(lat0, lon0);
		let b = Mc2Coord::from_degrees(lat1, lon1);
		let mut bbox = Mc2BBox::from_coord(a);
		bbox.extend(b);
		bbox
	}

	/// A degenerate box containing exactly one coordinate.
	#[must_use]
	pub fn from_coord(coord: Mc2Coord) -> Mc2BBox {
		Mc2BBox {
			min_lat: coord.lat,
			min_lon: coord.lon,
			max_lat: coord.lat,
			max_lon: coord.lon,
		}
	}

	/// Grows the box so that it contains `coord`.
	pub fn extend(&mut self, coord: Mc2Coord) {
		self.min_lat = self.min_lat.min(coord.lat);
		self.min_lon = self.min_lon.min(coord.lon);
		self.max_lat = self.max_lat.max(coord.lat);
		self.max_lon = self.max_lon.max(coord.lon);
	}

	/// Returns a copy enlarged by `units` on every side, saturating at the `i32` range.
	#[must_use]
	pub fn grown(&self, units: i32) -> Mc2BBox {
		Mc2BBox {
			min_lat: self.min_lat.saturating_sub(units),
			min_lon: self.min_lon.saturating_sub(units),
			max_lat: self.max_lat.saturating_add(units),
			max_lon: self.max_lon.saturating_add(units),
		}
	}

	pub fn contains(&self, coord: Mc2Coord) -> bool {
		(self.min_lat..=self.max_lat).contains(&coord.lat) && (self.min_lon..=self.max_lon).contains(&coord.lon)
	}

	pub fn height(&self) -> i64 {
		i64::from(self.max_lat) - i64::from(self.min_lat)
	}

	pub fn width(&self) -> i64 {
		i64::from(self.max_lon) - i64::from(self.min_lon)
	}

	/// Area in square MC2 units. The world box does not fit an `i64`.
	pub fn area(&self) -> i128 {
		i128::from(self.height()) * i128::from(self.width())
	}

	pub fn center(&self) -> Mc2Coord {
		Mc2Coord::new(
			(self.min_lat as i64 + self.height() / 2) as i32,
			(self.min_lon as i64 + self.width() / 2) as i32,
		)
	}

	/// Splits the box into four quarters sharing the center lines.
	pub fn quarters(&self) -> [Mc2BBox; 4] {
		let center = self.center();
		[
			Mc2BBox { min_lat: center.lat, max_lon: center.lon, ..*self },
			Mc2BBox { min_lat: center.lat, min_lon: center.lon, ..*self },
			Mc2BBox { max_lat: center.lat, min_lon: center.lon, ..*self },
			Mc2BBox { max_lat: center.lat, max_lon: center.lon, ..*self },
		]
	}

	pub fn as_tuple(&self) -> (i32, i32, i32, i32) {
		(self.min_lat, self.min_lon, self.max_lat, self.max_lon)
	}
}

impl Debug for Mc2BBox {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"[{}, {}, {}, {}]",
			self.min_lat, self.min_lon, self.max_lat, self.max_lon
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_is_checked() {
		assert!(Mc2BBox::new(0, 0, 10, 10).is_ok());
		assert!(Mc2BBox::new(11, 0, 10, 10).is_err());
		assert!(Mc2BBox::new(0, 11, 10, 10).is_err());
	}

	#[test]
	fn area_does_not_overflow() -> Result<()> {
		let bbox = Mc2BBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX)?;
		assert_eq!(bbox.height(), u32::MAX as i64);
		assert_eq!(bbox.area(), i128::from(u32::MAX) * i128::from(u32::MAX));
		assert_eq!(bbox.center(), Mc2Coord::new(-1, -1));
		Ok(())
	}

	#[test]
	fn quarters_cover_the_box() -> Result<()> {
		let bbox = Mc2BBox::new(0, 0, 100, 200)?;
		let quarters = bbox.quarters();
		assert_eq!(quarters[0].as_tuple(), (50, 0, 100, 100));
		assert_eq!(quarters[1].as_tuple(), (50, 100, 100, 200));
		assert_eq!(quarters[2].as_tuple(), (0, 100, 50, 200));
		assert_eq!(quarters[3].as_tuple(), (0, 0, 50, 100));
		Ok(())
	}

	#[test]
	fn grown_saturates() -> Result<()> {
		let bbox = Mc2BBox::new(i32::MAX - 1, 0, i32::MAX, 0)?.grown(10);
		assert_eq!(bbox.as_tuple(), (i32::MAX - 11, -10, i32::MAX, 10));
		assert!(bbox.contains(Mc2Coord::new(i32::MAX, 0)));
		Ok(())
	}
}
