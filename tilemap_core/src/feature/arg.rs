//! This module defines [`FeatureArg`], one typed argument of a tile feature, and its bit codec.
//!
//! # Overview
//!
//! Features of a tile are stored one after another. Consecutive features of the same type
//! share argument shapes, so every argument is written relative to the argument at the same
//! position of the previous feature:
//!
//! - `Simple` and `Text` values start with a "same as previous" bit.
//! - `Coord` values are 16-bit offsets from the tile reference in units of the tile's
//!   scale quantum.
//! - `Coords` sequences start at the last coordinate of the previous sequence when there is
//!   one, and otherwise at the tile reference. The deltas after the first point are written
//!   at a uniform width picked from the largest delta of the sequence.
//!
//! Coordinate sequences never own their points. They reference a half-open range of the
//! owning tile's coordinate arena, so every codec call receives that arena explicitly.

use super::ArgName;
use crate::{
	Mc2BBox, Mc2Coord,
	io::{BitReader, BitWriter, nbr_bits},
};
use anyhow::{Context, Result, bail, ensure};
use std::ops::Range;

/// Wire tag of an argument, written as 3 bits in the full-argument form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgKind {
	Simple = 0,
	Coord = 1,
	Coords = 2,
	Text = 3,
}

impl ArgKind {
	pub fn from_u32(value: u32) -> Result<ArgKind> {
		Ok(match value {
			0 => ArgKind::Simple,
			1 => ArgKind::Coord,
			2 => ArgKind::Coords,
			3 => ArgKind::Text,
			_ => bail!("unknown argument kind {value}"),
		})
	}
}

/// The geometry frame of a tile: reference coordinate and scale quantum.
///
/// Coordinates stored in a tile are multiples of `mc2_scale` away from `reference`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoordFrame {
	pub reference: Mc2Coord,
	pub mc2_scale: i32,
}

impl CoordFrame {
	#[must_use]
	pub fn new(reference: Mc2Coord, mc2_scale: i32) -> CoordFrame {
		CoordFrame { reference, mc2_scale }
	}

	/// Frame used for arguments stored outside of a tile, e.g. schema defaults.
	#[must_use]
	pub fn neutral() -> CoordFrame {
		CoordFrame {
			reference: Mc2Coord::default(),
			mc2_scale: 1,
		}
	}

	fn scale(&self) -> i64 {
		i64::from(self.mc2_scale.max(1))
	}

	fn offset(&self, value: i32, base: i32) -> i64 {
		(i64::from(value) - i64::from(base)) / self.scale()
	}

	fn apply(&self, diff: i32, base: i32) -> i32 {
		diff.wrapping_mul(self.mc2_scale.max(1)).wrapping_add(base)
	}
}

impl Default for CoordFrame {
	fn default() -> Self {
		CoordFrame::neutral()
	}
}

/// One argument of a tile feature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeatureArg {
	/// Unsigned values of `size` bits, one per scale index or a single value for all.
	Simple { name: ArgName, size: u8, values: Vec<u32> },
	/// Strings, one per scale index or a single string for all.
	Text { name: ArgName, values: Vec<String> },
	/// One snapped coordinate.
	Coord { name: ArgName, coord: Mc2Coord },
	/// A coordinate sequence in the tile's arena.
	Coords {
		name: ArgName,
		range: Range<usize>,
		bbox: Option<Mc2BBox>,
	},
}

impl FeatureArg {
	pub fn simple(name: ArgName, size: u8, value: u32) -> FeatureArg {
		FeatureArg::Simple {
			name,
			size,
			values: vec![value],
		}
	}

	pub fn text(name: ArgName, value: &str) -> FeatureArg {
		FeatureArg::Text {
			name,
			values: vec![value.to_string()],
		}
	}

	pub fn coord(name: ArgName, coord: Mc2Coord) -> FeatureArg {
		FeatureArg::Coord { name, coord }
	}

	/// An empty coordinate sequence. Points are added with [`FeatureArg::add_coord`].
	pub fn coords(name: ArgName) -> FeatureArg {
		FeatureArg::Coords {
			name,
			range: 0..0,
			bbox: None,
		}
	}

	pub fn name(&self) -> ArgName {
		match self {
			FeatureArg::Simple { name, .. }
			| FeatureArg::Text { name, .. }
			| FeatureArg::Coord { name, .. }
			| FeatureArg::Coords { name, .. } => *name,
		}
	}

	/// The same argument under another name.
	#[must_use]
	pub fn renamed(mut self, new_name: ArgName) -> FeatureArg {
		match &mut self {
			FeatureArg::Simple { name, .. }
			| FeatureArg::Text { name, .. }
			| FeatureArg::Coord { name, .. }
			| FeatureArg::Coords { name, .. } => *name = new_name,
		}
		self
	}

	pub fn kind(&self) -> ArgKind {
		match self {
			FeatureArg::Simple { .. } => ArgKind::Simple,
			FeatureArg::Text { .. } => ArgKind::Text,
			FeatureArg::Coord { .. } => ArgKind::Coord,
			FeatureArg::Coords { .. } => ArgKind::Coords,
		}
	}

	/// Returns an argument of the same kind and name with its value reset, ready for loading.
	#[must_use]
	pub fn template(&self) -> FeatureArg {
		match self {
			FeatureArg::Simple { name, size, .. } => FeatureArg::Simple {
				name: *name,
				size: *size,
				values: Vec::new(),
			},
			FeatureArg::Text { name, .. } => FeatureArg::Text {
				name: *name,
				values: Vec::new(),
			},
			FeatureArg::Coord { name, .. } => FeatureArg::coord(*name, Mc2Coord::default()),
			FeatureArg::Coords { name, .. } => FeatureArg::coords(*name),
		}
	}

	/// Value of a `Simple` argument for `scale_idx`. A single value applies to every index.
	pub fn simple_value(&self, scale_idx: usize) -> Option<u32> {
		match self {
			FeatureArg::Simple { values, .. } if values.len() == 1 => values.first().copied(),
			FeatureArg::Simple { values, .. } => values.get(scale_idx).copied(),
			_ => None,
		}
	}

	/// String of a `Text` argument for `scale_idx`. A single string applies to every index.
	pub fn text_value(&self, scale_idx: usize) -> Option<&str> {
		match self {
			FeatureArg::Text { values, .. } if values.len() == 1 => values.first().map(String::as_str),
			FeatureArg::Text { values, .. } => values.get(scale_idx).map(String::as_str),
			_ => None,
		}
	}

	/// Replaces the values of a `Simple` argument. Other kinds are left untouched.
	pub fn set_simple_values(&mut self, new_values: Vec<u32>) {
		if let FeatureArg::Simple { values, .. } = self {
			*values = new_values;
		}
	}

	pub fn coord_range(&self) -> Option<Range<usize>> {
		match self {
			FeatureArg::Coords { range, .. } => Some(range.clone()),
			_ => None,
		}
	}

	/// Appends a point to a `Coords` argument, snapped to `mc2_scale`.
	///
	/// A point equal to the current last point is skipped. The sequence must be the most
	/// recent one written into `arena`.
	///
	/// # Errors
	/// Returns an error for other argument kinds and when another sequence was appended to
	/// the arena after this one.
	pub fn add_coord(&mut self, arena: &mut Vec<Mc2Coord>, coord: Mc2Coord, mc2_scale: i32) -> Result<()> {
		let FeatureArg::Coords { name, range, bbox } = self else {
			bail!("argument {} is not a coordinate sequence", self.name());
		};
		if range.is_empty() {
			*range = arena.len()..arena.len();
		}
		ensure!(
			range.end == arena.len(),
			"coordinate sequence {name} is no longer at the end of the arena"
		);
		let coord = coord.snapped(mc2_scale);
		if range.end > range.start && arena[range.end - 1] == coord {
			return Ok(());
		}
		arena.push(coord);
		range.end = arena.len();
		match bbox {
			Some(bbox) => bbox.extend(coord),
			None => *bbox = Some(Mc2BBox::from_coord(coord)),
		}
		Ok(())
	}

	/// Writes the value of this argument.
	///
	/// `prev` is the argument at the same position of the previous feature, or `None` when
	/// that feature had another type. `arena` holds the coordinates of the tile.
	///
	/// # Errors
	/// Returns an error if a value does not fit its wire field.
	pub fn save(&self, writer: &mut BitWriter, frame: &CoordFrame, arena: &[Mc2Coord], prev: Option<&FeatureArg>) -> Result<()> {
		match self {
			FeatureArg::Simple { name, size, values } => {
				let same = matches!(prev, Some(FeatureArg::Simple { values: prev_values, .. }) if prev_values == values);
				writer.write_bool(same);
				if same {
					return Ok(());
				}
				ensure!(!values.is_empty(), "simple argument {name} has no value");
				ensure!(values.len() < 32, "simple argument {name} has {} values", values.len());
				let multi = values.len() > 1;
				writer.write_bool(multi);
				if multi {
					writer.write_bits(values.len() as u32, 5);
				}
				for value in values {
					writer.write_bits(*value, u32::from(*size));
				}
			}
			FeatureArg::Text { name, values } => {
				let same = matches!(prev, Some(FeatureArg::Text { values: prev_values, .. }) if prev_values == values);
				writer.write_bool(same);
				if same {
					return Ok(());
				}
				ensure!(!values.is_empty(), "text argument {name} has no value");
				ensure!(values.len() < 32, "text argument {name} has {} values", values.len());
				let multi = values.len() > 1;
				writer.write_bool(multi);
				if multi {
					writer.write_bits(values.len() as u32, 5);
				}
				writer.align_to_byte();
				for value in values {
					writer.write_string(value);
				}
			}
			FeatureArg::Coord { name, coord } => {
				let lat = frame.offset(coord.lat, frame.reference.lat);
				let lon = frame.offset(coord.lon, frame.reference.lon);
				let (Ok(lat), Ok(lon)) = (i16::try_from(lat), i16::try_from(lon)) else {
					bail!("coordinate {name} {coord:?} is too far from the tile reference");
				};
				writer.write_ba_i16(lat);
				writer.write_ba_i16(lon);
			}
			FeatureArg::Coords { name, range, .. } => {
				let points = arena
					.get(range.clone())
					.with_context(|| format!("coordinate range {range:?} of {name} is outside the arena"))?;
				save_coords(writer, frame, points, previous_last_coord(prev, arena))?;
			}
		}
		Ok(())
	}

	/// Reads the value of this argument in place, keeping kind, name and size.
	///
	/// Decoded coordinate sequences are appended to `arena`.
	///
	/// # Errors
	/// Returns an error if the buffer ends early.
	pub fn load(&mut self, reader: &mut BitReader, frame: &CoordFrame, arena: &mut Vec<Mc2Coord>, prev: Option<&FeatureArg>) -> Result<()> {
		match self {
			FeatureArg::Simple { size, values, .. } => {
				if reader.read_bool()? {
					*values = match prev {
						Some(FeatureArg::Simple { values: prev_values, .. }) => prev_values.clone(),
						_ => Vec::new(),
					};
					return Ok(());
				}
				let count = if reader.read_bool()? { reader.read_bits(5)? } else { 1 };
				*values = (0..count)
					.map(|_| reader.read_bits(u32::from(*size)))
					.collect::<Result<Vec<u32>>>()?;
			}
			FeatureArg::Text { values, .. } => {
				if reader.read_bool()? {
					*values = match prev {
						Some(FeatureArg::Text { values: prev_values, .. }) => prev_values.clone(),
						_ => Vec::new(),
					};
					return Ok(());
				}
				let count = if reader.read_bool()? { reader.read_bits(5)? } else { 1 };
				reader.align_to_byte();
				*values = (0..count).map(|_| reader.read_string()).collect::<Result<Vec<String>>>()?;
			}
			FeatureArg::Coord { coord, .. } => {
				let lat = i32::from(reader.read_ba_i16()?);
				let lon = i32::from(reader.read_ba_i16()?);
				*coord = Mc2Coord::new(
					frame.apply(lat, frame.reference.lat),
					frame.apply(lon, frame.reference.lon),
				);
			}
			FeatureArg::Coords { range, bbox, .. } => {
				let reference = previous_last_coord(prev, arena).unwrap_or(frame.reference);
				let start = arena.len();
				load_coords(reader, frame, arena, reference)?;
				*range = start..arena.len();
				*bbox = bbox_of(&arena[start..]);
			}
		}
		Ok(())
	}

	/// Writes kind, name and (for `Simple`) size, then the value without a previous record.
	///
	/// Coordinate sequences are written empty since they have no arena outside a tile.
	pub fn save_full(&self, writer: &mut BitWriter) -> Result<()> {
		writer.write_bits(self.kind() as u32, 3);
		writer.write_bits(u32::from(self.name()), 8);
		if let FeatureArg::Simple { size, .. } = self {
			writer.write_bits(u32::from(*size), 5);
		}
		match self {
			FeatureArg::Coords { name, .. } => FeatureArg::coords(*name).save(writer, &CoordFrame::neutral(), &[], None),
			_ => self.save(writer, &CoordFrame::neutral(), &[], None),
		}
	}

	/// Reads an argument written by [`FeatureArg::save_full`].
	pub fn load_full(reader: &mut BitReader) -> Result<FeatureArg> {
		let kind = ArgKind::from_u32(reader.read_bits(3)?)?;
		let name = reader.read_bits(8)? as ArgName;
		let mut arg = match kind {
			ArgKind::Simple => FeatureArg::Simple {
				name,
				size: reader.read_bits(5)? as u8,
				values: Vec::new(),
			},
			ArgKind::Coord => FeatureArg::coord(name, Mc2Coord::default()),
			ArgKind::Coords => FeatureArg::coords(name),
			ArgKind::Text => FeatureArg::Text {
				name,
				values: Vec::new(),
			},
		};
		let mut scratch = Vec::new();
		arg.load(reader, &CoordFrame::neutral(), &mut scratch, None)?;
		if let FeatureArg::Coords { range, bbox, .. } = &mut arg {
			*range = 0..0;
			*bbox = None;
		}
		Ok(arg)
	}
}

fn previous_last_coord(prev: Option<&FeatureArg>, arena: &[Mc2Coord]) -> Option<Mc2Coord> {
	match prev {
		Some(FeatureArg::Coords { range, .. }) if !range.is_empty() => arena.get(range.end - 1).copied(),
		_ => None,
	}
}

fn bbox_of(points: &[Mc2Coord]) -> Option<Mc2BBox> {
	let (first, rest) = points.split_first()?;
	let mut bbox = Mc2BBox::from_coord(*first);
	rest.iter().for_each(|coord| bbox.extend(*coord));
	Some(bbox)
}

/// Width of a signed field holding `-span..span`, capped by the 4-bit width field.
fn checked_width(span: i64, what: &str) -> Result<u32> {
	let half = u32::try_from(span.max(1) - 1).with_context(|| format!("{what} offset span {span} is too large"))?;
	let width = nbr_bits(half) + 1;
	ensure!(width <= 15, "{what} needs {width} bits, at most 15 fit the width field");
	Ok(width)
}

/// Half range a signed field must cover for `delta`: `d + 1` for non-negative values, `-d`
/// otherwise.
fn span_of(delta: i64) -> i64 {
	if delta >= 0 { delta + 1 } else { -delta }
}

fn save_coords(writer: &mut BitWriter, frame: &CoordFrame, points: &[Mc2Coord], reference: Option<Mc2Coord>) -> Result<()> {
	let reference = reference.unwrap_or(frame.reference);

	let size_bits = nbr_bits(u32::try_from(points.len())?);
	ensure!(size_bits <= 15, "{} coordinates do not fit a sequence", points.len());
	writer.write_bits(size_bits, 4);
	writer.write_bits(points.len() as u32, size_bits);

	let Some(first) = points.first() else {
		return Ok(());
	};

	let start_lat = frame.offset(first.lat, reference.lat);
	let start_lon = frame.offset(first.lon, reference.lon);

	let deltas: Vec<(i64, i64)> = points
		.windows(2)
		.map(|pair| (frame.offset(pair[1].lat, pair[0].lat), frame.offset(pair[1].lon, pair[0].lon)))
		.collect();
	let max_lat = deltas.iter().map(|d| span_of(d.0)).max().unwrap_or(0);
	let max_lon = deltas.iter().map(|d| span_of(d.1)).max().unwrap_or(0);

	let start_bits = checked_width(span_of(start_lat).max(span_of(start_lon)), "start")?;
	let lat_bits = checked_width(max_lat, "latitude")?;
	let lon_bits = checked_width(max_lon, "longitude")?;

	writer.write_bits(start_bits, 4);
	writer.write_signed_bits(start_lat as i32, start_bits);
	writer.write_signed_bits(start_lon as i32, start_bits);
	writer.write_bits(lat_bits, 4);
	writer.write_bits(lon_bits, 4);
	for (lat, lon) in deltas {
		writer.write_signed_bits(lat as i32, lat_bits);
		writer.write_signed_bits(lon as i32, lon_bits);
	}
	Ok(())
}

fn load_coords(reader: &mut BitReader, frame: &CoordFrame, arena: &mut Vec<Mc2Coord>, reference: Mc2Coord) -> Result<()> {
	let size_bits = reader.read_bits(4)?;
	let count = reader.read_bits(size_bits)?;
	if count == 0 {
		return Ok(());
	}

	let start_bits = reader.read_bits(4)?;
	let start_lat = reader.read_signed_bits(start_bits)?;
	let start_lon = reader.read_signed_bits(start_bits)?;
	let lat_bits = reader.read_bits(4)?;
	let lon_bits = reader.read_bits(4)?;

	let mut current = Mc2Coord::new(
		frame.apply(start_lat, reference.lat),
		frame.apply(start_lon, reference.lon),
	);
	arena.reserve(count as usize);
	arena.push(current);
	for _ in 1..count {
		let lat = reader.read_signed_bits(lat_bits)?;
		let lon = reader.read_signed_bits(lon_bits)?;
		current = Mc2Coord::new(frame.apply(lat, current.lat), frame.apply(lon, current.lon));
		arena.push(current);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::super::arg_name::{COLOR, COORD, COORDS, IMAGE_NAME};
	use super::*;
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	const SCALE: i32 = 10;

	fn frame() -> CoordFrame {
		CoordFrame::new(Mc2Coord::new(1_000_000, 2_000_000), SCALE)
	}

	fn build_coords(arena: &mut Vec<Mc2Coord>, points: &[(i32, i32)]) -> Result<FeatureArg> {
		let mut arg = FeatureArg::coords(COORDS);
		for (lat, lon) in points {
			arg.add_coord(arena, Mc2Coord::new(*lat, *lon), SCALE)?;
		}
		Ok(arg)
	}

	fn reload(bytes: &[u8], template: &FeatureArg, prev: Option<&FeatureArg>, arena: &mut Vec<Mc2Coord>) -> Result<FeatureArg> {
		let mut reader = BitReader::new(bytes);
		let mut arg = template.template();
		arg.load(&mut reader, &frame(), arena, prev)?;
		Ok(arg)
	}

	#[test]
	fn simple_same_as_previous_costs_one_bit() -> Result<()> {
		let prev = FeatureArg::simple(COLOR, 24, 0x00FF_00FF);
		let arg = FeatureArg::simple(COLOR, 24, 0x00FF_00FF);
		let mut writer = BitWriter::new();
		arg.save(&mut writer, &frame(), &[], Some(&prev))?;
		assert_eq!(writer.current_bit_offset(), 1);

		let loaded = reload(writer.as_slice(), &arg, Some(&prev), &mut Vec::new())?;
		assert_eq!(loaded, arg);
		Ok(())
	}

	#[test]
	fn simple_values_per_scale_index() -> Result<()> {
		let arg = FeatureArg::Simple {
			name: COLOR,
			size: 7,
			values: vec![1, 2, 127],
		};
		let mut writer = BitWriter::new();
		arg.save(&mut writer, &frame(), &[], None)?;
		assert_eq!(writer.current_bit_offset(), 1 + 1 + 5 + 3 * 7);

		let loaded = reload(writer.as_slice(), &arg, None, &mut Vec::new())?;
		assert_eq!(loaded.simple_value(2), Some(127));
		assert_eq!(loaded.simple_value(3), None);
		assert_eq!(FeatureArg::simple(COLOR, 4, 9).simple_value(5), Some(9));
		Ok(())
	}

	#[test]
	fn text_values() -> Result<()> {
		let arg = FeatureArg::Text {
			name: IMAGE_NAME,
			values: vec!["small".into(), "large".into()],
		};
		let mut writer = BitWriter::new();
		arg.save(&mut writer, &frame(), &[], None)?;
		let loaded = reload(writer.as_slice(), &arg, None, &mut Vec::new())?;
		assert_eq!(loaded, arg);
		assert_eq!(loaded.text_value(1), Some("large"));

		let mut writer = BitWriter::new();
		arg.save(&mut writer, &frame(), &[], Some(&loaded))?;
		assert_eq!(writer.current_bit_offset(), 1);
		Ok(())
	}

	#[test]
	fn coord_is_relative_to_reference() -> Result<()> {
		let arg = FeatureArg::coord(COORD, Mc2Coord::new(1_000_120, 1_999_950));
		let mut writer = BitWriter::new();
		arg.save(&mut writer, &frame(), &[], None)?;
		assert_eq!(writer.as_slice(), &[0x00, 12, 0xFF, 0xFB]);

		let loaded = reload(writer.as_slice(), &arg, None, &mut Vec::new())?;
		assert_eq!(loaded, arg);

		let far = FeatureArg::coord(COORD, Mc2Coord::new(1_000_000 + 40_000 * SCALE, 0));
		assert!(far.save(&mut BitWriter::new(), &frame(), &[], None).is_err());
		Ok(())
	}

	#[rstest]
	#[case::empty(vec![])]
	#[case::single(vec![(1_000_500, 2_000_500)])]
	#[case::line(vec![(1_000_500, 2_000_500), (1_000_510, 2_000_490), (1_000_600, 2_000_200)])]
	#[case::one_bit(vec![(1_000_000, 2_000_000), (999_990, 1_999_990), (999_980, 1_999_980)])]
	#[case::widest(vec![(1_000_000, 2_000_000), (1_000_000 + 16_382 * SCALE, 2_000_000 - 16_383 * SCALE)])]
	fn coordinate_sequences_survive(#[case] points: Vec<(i32, i32)>) -> Result<()> {
		let mut arena = Vec::new();
		let arg = build_coords(&mut arena, &points)?;
		let mut writer = BitWriter::new();
		arg.save(&mut writer, &frame(), &arena, None)?;

		let mut loaded_arena = Vec::new();
		let loaded = reload(writer.as_slice(), &arg, None, &mut loaded_arena)?;
		let expected: Vec<Mc2Coord> = points.iter().map(|(lat, lon)| Mc2Coord::new(*lat, *lon).snapped(SCALE)).collect();
		assert_eq!(loaded_arena, expected);
		assert_eq!(loaded.coord_range(), Some(0..expected.len()));
		Ok(())
	}

	#[rstest]
	#[case::delta(vec![(0, 0), (20_000 * SCALE, 0)])]
	#[case::positive_delta(vec![(1_000_000, 2_000_000), (1_000_000 + 16_384 * SCALE, 2_000_000)])]
	#[case::negative_delta(vec![(1_000_000, 2_000_000), (1_000_000, 2_000_000 - 16_385 * SCALE)])]
	#[case::start(vec![(1_000_000 - 16_385 * SCALE, 2_000_000)])]
	#[case::positive_start(vec![(1_000_000, 2_000_000 + 16_384 * SCALE)])]
	fn offsets_beyond_fifteen_bits_are_rejected(#[case] points: Vec<(i32, i32)>) -> Result<()> {
		let mut arena = Vec::new();
		let arg = build_coords(&mut arena, &points)?;
		assert!(arg.save(&mut BitWriter::new(), &frame(), &arena, None).is_err());
		Ok(())
	}

	#[test]
	fn fifteen_bit_extremes_fit() -> Result<()> {
		let start = (1_000_000 - 16_384 * SCALE, 2_000_000 + 16_383 * SCALE);
		let points = [start, (start.0 + 16_383 * SCALE, start.1 - 16_384 * SCALE)];
		let mut arena = Vec::new();
		let arg = build_coords(&mut arena, &points)?;
		let mut writer = BitWriter::new();
		arg.save(&mut writer, &frame(), &arena, None)?;
		// count width, count, start width, two starts, two delta widths, one delta pair
		assert_eq!(writer.current_bit_offset(), 4 + 2 + 4 + 2 * 15 + 4 + 4 + 2 * 15);

		let mut loaded_arena = Vec::new();
		reload(writer.as_slice(), &arg, None, &mut loaded_arena)?;
		assert_eq!(loaded_arena, points.map(|(lat, lon)| Mc2Coord::new(lat, lon)).to_vec());
		Ok(())
	}

	#[test]
	fn sequence_chains_from_previous_last_point() -> Result<()> {
		let mut arena = Vec::new();
		let first = build_coords(&mut arena, &[(1_000_000, 2_000_000), (1_100_000, 2_100_000)])?;
		let second = build_coords(&mut arena, &[(1_100_010, 2_100_010), (1_100_020, 2_100_000)])?;

		let mut chained = BitWriter::new();
		second.save(&mut chained, &frame(), &arena, Some(&first))?;
		let mut unchained = BitWriter::new();
		second.save(&mut unchained, &frame(), &arena, None)?;
		assert!(chained.current_bit_offset() < unchained.current_bit_offset());

		let mut writer = BitWriter::new();
		first.save(&mut writer, &frame(), &arena, None)?;
		second.save(&mut writer, &frame(), &arena, Some(&first))?;

		let data = writer.into_vec();
		let mut reader = BitReader::new(&data);
		let mut loaded_arena = Vec::new();
		let mut a = first.template();
		a.load(&mut reader, &frame(), &mut loaded_arena, None)?;
		let mut b = second.template();
		b.load(&mut reader, &frame(), &mut loaded_arena, Some(&a))?;
		assert_eq!(loaded_arena, arena);
		assert_eq!(b.coord_range(), Some(2..4));
		Ok(())
	}

	#[test]
	fn add_coord_snaps_and_skips_duplicates() -> Result<()> {
		let mut arena = Vec::new();
		let arg = build_coords(&mut arena, &[(15, 25), (19, 29), (31, 25), (15, 25)])?;
		assert_eq!(arena, vec![Mc2Coord::new(10, 20), Mc2Coord::new(30, 20), Mc2Coord::new(10, 20)]);
		let FeatureArg::Coords { bbox, .. } = &arg else {
			unreachable!()
		};
		assert_eq!(bbox.map(|b| b.as_tuple()), Some((10, 20, 30, 20)));
		Ok(())
	}

	#[test]
	fn full_form_keeps_kind_name_and_size() -> Result<()> {
		let args = vec![
			FeatureArg::simple(COLOR, 24, 0x00AB_CDEF),
			FeatureArg::coord(COORD, Mc2Coord::new(-3, 4)),
			FeatureArg::coords(COORDS),
			FeatureArg::text(IMAGE_NAME, "poi_bank"),
		];
		let mut writer = BitWriter::new();
		for arg in &args {
			arg.save_full(&mut writer)?;
		}
		let data = writer.into_vec();
		let mut reader = BitReader::new(&data);
		for arg in &args {
			assert_eq!(&FeatureArg::load_full(&mut reader)?, arg);
		}
		Ok(())
	}

	#[test]
	fn unknown_kind_is_an_error() {
		let mut reader = BitReader::new(&[0b1110_0000, 0, 0]);
		assert!(FeatureArg::load_full(&mut reader).is_err());
	}
}
