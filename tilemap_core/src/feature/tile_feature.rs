use super::{ArgName, CoordFrame, FeatureArg};
use crate::{
	Mc2Coord,
	io::{BitReader, BitWriter},
};
use anyhow::{Context, Result, bail, ensure};
use std::ops::Range;

/// Primitive feature types. Complex types are non-negative and schema defined.
pub const PRIMITIVE_CIRCLE: i16 = -4;
pub const PRIMITIVE_BITMAP: i16 = -3;
pub const PRIMITIVE_POLYGON: i16 = -2;
pub const PRIMITIVE_LINE: i16 = -1;

/// Supplies the argument template of each feature type when decoding a tile.
pub trait ArgTemplates {
	/// Arguments a feature of `feature_type` carries, in wire order.
	fn args_for_type(&self, feature_type: i16) -> Option<&[FeatureArg]>;
}

/// One map feature of a data tile: a type and its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileFeature {
	pub feature_type: i16,
	pub args: Vec<FeatureArg>,
	/// Position of the feature in its tile.
	pub feature_nbr: usize,
}

impl TileFeature {
	pub fn new(feature_type: i16, args: Vec<FeatureArg>) -> TileFeature {
		TileFeature {
			feature_type,
			args,
			feature_nbr: 0,
		}
	}

	pub fn arg(&self, name: ArgName) -> Option<&FeatureArg> {
		self.args.iter().find(|arg| arg.name() == name)
	}

	pub fn arg_mut(&mut self, name: ArgName) -> Option<&mut FeatureArg> {
		self.args.iter_mut().find(|arg| arg.name() == name)
	}

	/// Range of the first coordinate sequence, if the feature has one.
	pub fn coord_range(&self) -> Option<Range<usize>> {
		self.args.iter().find_map(FeatureArg::coord_range)
	}

	/// The points of the first coordinate sequence, borrowed from the tile's arena.
	pub fn coords<'a>(&self, arena: &'a [Mc2Coord]) -> &'a [Mc2Coord] {
		self
			.coord_range()
			.and_then(|range| arena.get(range))
			.unwrap_or_default()
	}

	/// Writes one feature record.
	///
	/// A record of the same type as `prev` costs one bit for the type and writes its
	/// arguments relative to the arguments of `prev`. A type change writes the type as
	/// 8 signed bits and resets the chain.
	pub fn save(&self, writer: &mut BitWriter, frame: &CoordFrame, arena: &[Mc2Coord], prev: Option<&TileFeature>) -> Result<()> {
		let prev = prev.filter(|p| p.feature_type == self.feature_type);
		writer.write_bool(prev.is_some());
		if prev.is_none() {
			ensure!(
				i8::try_from(self.feature_type).is_ok(),
				"feature type {} does not fit 8 bits",
				self.feature_type
			);
			writer.write_signed_bits(i32::from(self.feature_type), 8);
		}
		for (index, arg) in self.args.iter().enumerate() {
			let prev_arg = prev.and_then(|p| p.args.get(index)).filter(|p| p.kind() == arg.kind());
			arg
				.save(writer, frame, arena, prev_arg)
				.with_context(|| format!("saving argument {} of feature type {}", arg.name(), self.feature_type))?;
		}
		Ok(())
	}

	/// Reads one feature record written by [`TileFeature::save`].
	///
	/// # Errors
	/// Returns an error if the type has no template, the first record claims to repeat a
	/// previous type, or the buffer ends early.
	pub fn load(
		reader: &mut BitReader,
		templates: &impl ArgTemplates,
		frame: &CoordFrame,
		arena: &mut Vec<Mc2Coord>,
		prev: Option<&TileFeature>,
	) -> Result<TileFeature> {
		let same_type = reader.read_bool()?;
		let (feature_type, prev) = if same_type {
			let Some(prev) = prev else {
				bail!("first feature of a tile repeats a previous type");
			};
			(prev.feature_type, Some(prev))
		} else {
			(reader.read_signed_bits(8)? as i16, None)
		};

		let template = templates
			.args_for_type(feature_type)
			.with_context(|| format!("no argument template for feature type {feature_type}"))?;

		let mut args = Vec::with_capacity(template.len());
		for (index, template_arg) in template.iter().enumerate() {
			let mut arg = template_arg.template();
			let prev_arg = prev.and_then(|p| p.args.get(index));
			arg.load(reader, frame, arena, prev_arg)?;
			args.push(arg);
		}
		Ok(TileFeature::new(feature_type, args))
	}
}

/// A drawable piece of a feature: circle, bitmap, polygon or line.
///
/// Primitives own their arguments but not their coordinates: `coords` is the range of the
/// owning feature's sequence in the tile's arena.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TilePrimitiveFeature {
	pub feature_type: i16,
	pub args: Vec<FeatureArg>,
	/// `feature_nbr` of the owning feature.
	pub feature_nbr: usize,
	pub coords: Range<usize>,
}

impl TilePrimitiveFeature {
	pub fn arg(&self, name: ArgName) -> Option<&FeatureArg> {
		self.args.iter().find(|arg| arg.name() == name)
	}

	pub fn coords<'a>(&self, arena: &'a [Mc2Coord]) -> &'a [Mc2Coord] {
		arena.get(self.coords.clone()).unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::super::arg_name::{COLOR, COORDS, WIDTH};
	use super::*;
	use pretty_assertions::assert_eq;
	use std::collections::HashMap;

	struct Templates(HashMap<i16, Vec<FeatureArg>>);

	impl ArgTemplates for Templates {
		fn args_for_type(&self, feature_type: i16) -> Option<&[FeatureArg]> {
			self.0.get(&feature_type).map(Vec::as_slice)
		}
	}

	fn templates() -> Templates {
		Templates(HashMap::from([
			(3, vec![FeatureArg::simple(WIDTH, 4, 0), FeatureArg::coords(COORDS)]),
			(-5, vec![FeatureArg::simple(COLOR, 24, 0)]),
		]))
	}

	fn road(arena: &mut Vec<Mc2Coord>, width: u32, points: &[(i32, i32)]) -> Result<TileFeature> {
		let mut coords = FeatureArg::coords(COORDS);
		for (lat, lon) in points {
			coords.add_coord(arena, Mc2Coord::new(*lat, *lon), 1)?;
		}
		Ok(TileFeature::new(3, vec![FeatureArg::simple(WIDTH, 4, width), coords]))
	}

	#[test]
	fn stream_of_features() -> Result<()> {
		let frame = CoordFrame::new(Mc2Coord::new(100, 100), 1);
		let mut arena = Vec::new();
		let features = vec![
			road(&mut arena, 3, &[(100, 100), (110, 120)])?,
			road(&mut arena, 3, &[(111, 121), (130, 130), (140, 90)])?,
			TileFeature::new(-5, vec![FeatureArg::simple(COLOR, 24, 0x00FF_0000)]),
			road(&mut arena, 5, &[(90, 90)])?,
		];

		let mut writer = BitWriter::new();
		let mut prev = None;
		for feature in &features {
			feature.save(&mut writer, &frame, &arena, prev)?;
			prev = Some(feature);
		}

		let data = writer.into_vec();
		let mut reader = BitReader::new(&data);
		let mut loaded_arena = Vec::new();
		let mut loaded: Vec<TileFeature> = Vec::new();
		for _ in 0..features.len() {
			let feature = TileFeature::load(&mut reader, &templates(), &frame, &mut loaded_arena, loaded.last())?;
			loaded.push(feature);
		}
		assert_eq!(loaded, features);
		assert_eq!(loaded_arena, arena);
		assert_eq!(loaded[1].coords(&loaded_arena), &arena[2..5]);
		Ok(())
	}

	#[test]
	fn type_change_resets_the_chain() -> Result<()> {
		let frame = CoordFrame::neutral();
		let a = TileFeature::new(-5, vec![FeatureArg::simple(COLOR, 24, 7)]);
		let b = TileFeature::new(3, vec![FeatureArg::simple(WIDTH, 4, 7), FeatureArg::coords(COORDS)]);

		let mut writer = BitWriter::new();
		b.save(&mut writer, &frame, &[], Some(&a))?;
		// type flag, 8 bit type, full width value, empty sequence
		assert_eq!(writer.current_bit_offset(), 1 + 8 + 2 + 4 + 4);
		Ok(())
	}

	#[test]
	fn unknown_type_and_dangling_repeat_are_errors() {
		let frame = CoordFrame::neutral();
		let mut arena = Vec::new();
		let mut reader = BitReader::new(&[0b0000_0010, 0]);
		assert!(TileFeature::load(&mut reader, &templates(), &frame, &mut arena, None).is_err());
		let mut reader = BitReader::new(&[0b1000_0000]);
		assert!(TileFeature::load(&mut reader, &templates(), &frame, &mut arena, None).is_err());
	}
}
