use crate::METER_TO_MC2SCALE;

/// Size and entry scale of the tiles of one detail level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileScale {
	/// Edge length of a tile in MC2 units.
	pub mc2_units: i32,
	/// Scale (meters per pixel) above which this detail level is used.
	pub max_scale: u16,
}

/// The parameters a layer's tile pyramid is derived from.
///
/// Factors are stored in thousandths, the way they travel in the description.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGeometry {
	pub meters: u16,
	pub pixels: u16,
	pub dpi: u16,
	pub zoom_factor_milli: u32,
	pub exchange_factor_milli: u32,
	pub detail_levels: u8,
}

impl TileGeometry {
	/// Computes the pyramid: each level zooms the previous one by `zoom_factor`, and switches
	/// in at a scale interpolated by `exchange_factor` between the two.
	///
	/// Tile sizes that leave the `i32` range become `i32::MIN`, which makes the level two
	/// tiles wide.
	pub fn tile_scales(&self) -> Vec<TileScale> {
		let zoom_factor = f64::from(self.zoom_factor_milli) / 1000.0;
		let exchange_factor = f64::from(self.exchange_factor_milli) / 1000.0;

		let mut prev_scale = f64::from(self.meters) / f64::from(self.pixels.max(1));
		let mut prev_units = (f64::from(self.meters) * METER_TO_MC2SCALE).round_ties_even();

		(0..self.detail_levels)
			.map(|_| {
				let scale = prev_scale * zoom_factor;
				let mut units = (prev_units * zoom_factor).round_ties_even();
				if units < f64::from(i32::MIN) || units > f64::from(i32::MAX) {
					units = f64::from(i32::MIN);
				}
				let entry = TileScale {
					mc2_units: units as i32,
					max_scale: (prev_scale + (scale - prev_scale) * exchange_factor) as u16,
				};
				prev_scale = scale;
				prev_units = units;
				entry
			})
			.collect()
	}
}

/// Detail level to use at `scale`: the highest level whose entry scale lies below it.
pub fn detail_level_for_scale(scales: &[TileScale], scale: u16) -> u32 {
	scales
		.iter()
		.rposition(|entry| scale > entry.max_scale)
		.unwrap_or(0) as u32
}

/// Index of the tile containing `value` along one axis.
///
/// Negative values step one further down after truncation, so a coordinate exactly on a
/// negative tile edge lands in the tile below it. Clients and servers agree on this.
pub fn tile_index_1d(value: i32, mc2_units: i32) -> Option<i32> {
	let index = value.checked_div(mc2_units)?;
	Some(if value < 0 { index.saturating_sub(1) } else { index })
}
