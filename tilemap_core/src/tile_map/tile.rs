use super::{
	ExtendedString, FeatureCategory,
	tables::{load_extended_strings, load_feature_categories, save_extended_strings, save_feature_categories},
};
use crate::{
	ArgContainer, ArgName, Blob, CoordFrame, FeatureArg, METER_TO_MC2SCALE, Mc2Coord, TileFeature, TileMapFormatDesc,
	TileMapParams, TileMapType, TilePrimitiveFeature, compress_if_smaller, crc32, decompress_gzip,
	arg_name::LEVEL,
	io::{BitReader, BitWriter, nbr_bits},
};
use anyhow::{Context, Result, ensure};
use std::collections::BTreeMap;

/// Drawing level of primitives without a level argument.
const DEFAULT_LEVEL: u32 = 13;

/// One decoded tile: the features of a data tile or the strings of a string tile.
///
/// Coordinates of all features live in one arena owned by the tile. Features and their
/// primitives refer to it by index range.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMap {
	params: TileMapParams,
	frame: CoordFrame,
	/// Tile-wide arguments preceding the features.
	pub header: ArgContainer,
	features: Vec<TileFeature>,
	coords: Vec<Mc2Coord>,
	strings: Vec<String>,
	str_idx_by_feature: Vec<Option<u32>>,
	feature_idx_in_text_order: Vec<u32>,
	pub categories: Vec<FeatureCategory>,
	pub extended_strings: Vec<ExtendedString>,
	crc: Option<u32>,
	/// Bit `i` set: importance `i` of this tile has no features.
	pub empty_importances: u16,
	load_size: usize,
}

impl TileMap {
	/// An empty tile for `params`, framed by the tile's corner and entry scale.
	///
	/// # Errors
	/// Returns an error if the description has no such layer or detail level.
	pub fn new(params: TileMapParams, desc: &TileMapFormatDesc) -> Result<TileMap> {
		let frame = frame_for(&params, desc)?;
		Ok(TileMap {
			params,
			frame,
			header: ArgContainer::new(),
			features: Vec::new(),
			coords: Vec::new(),
			strings: Vec::new(),
			str_idx_by_feature: Vec::new(),
			feature_idx_in_text_order: Vec::new(),
			categories: Vec::new(),
			extended_strings: Vec::new(),
			crc: None,
			empty_importances: 0,
			load_size: 0,
		})
	}

	pub fn params(&self) -> &TileMapParams {
		&self.params
	}

	pub fn frame(&self) -> &CoordFrame {
		&self.frame
	}

	pub fn features(&self) -> &[TileFeature] {
		&self.features
	}

	pub fn feature(&self, feature_nbr: usize) -> Option<&TileFeature> {
		self.features.get(feature_nbr)
	}

	/// The coordinate arena.
	pub fn coords(&self) -> &[Mc2Coord] {
		&self.coords
	}

	pub fn strings(&self) -> &[String] {
		&self.strings
	}

	/// CRC of the data section. A string tile carries the CRC of its data tile.
	pub fn crc(&self) -> Option<u32> {
		self.crc
	}

	pub fn set_crc(&mut self, crc: Option<u32>) {
		self.crc = crc;
	}

	/// Uncompressed size of the buffer this tile was loaded from.
	pub fn load_size(&self) -> usize {
		self.load_size
	}

	pub fn is_empty(&self) -> bool {
		self.features.is_empty() && self.strings.is_empty() && self.extended_strings.is_empty()
	}

	/// Appends a feature and returns its number.
	pub fn add_feature(&mut self, mut feature: TileFeature) -> usize {
		feature.feature_nbr = self.features.len();
		self.features.push(feature);
		self.features.len() - 1
	}

	/// A coordinate argument snapped to the tile's quantum.
	pub fn coord_arg(&self, name: ArgName, coord: Mc2Coord) -> FeatureArg {
		FeatureArg::coord(name, coord.snapped(self.frame.mc2_scale))
	}

	/// A coordinate sequence appended to the arena. Must be built right before the next one.
	pub fn coords_arg(&mut self, name: ArgName, points: &[Mc2Coord]) -> Result<FeatureArg> {
		let mut arg = FeatureArg::coords(name);
		for point in points {
			arg.add_coord(&mut self.coords, *point, self.frame.mc2_scale)?;
		}
		Ok(arg)
	}

	/// Attaches `text` to a feature of the paired data tile. Equal texts share one entry.
	pub fn set_feature_string(&mut self, feature_idx: u32, text: &str) {
		let str_idx = match self.strings.iter().position(|s| s == text) {
			Some(index) => index,
			None => {
				self.strings.push(text.to_string());
				self.strings.len() - 1
			}
		} as u32;
		let slot = feature_idx as usize;
		if self.str_idx_by_feature.len() <= slot {
			self.str_idx_by_feature.resize(slot + 1, None);
		}
		if self.str_idx_by_feature[slot].replace(str_idx).is_none() {
			self.feature_idx_in_text_order.push(feature_idx);
		}
	}

	pub fn string_for_feature(&self, feature_idx: usize) -> Option<&str> {
		let str_idx = (*self.str_idx_by_feature.get(feature_idx)?)?;
		self.strings.get(str_idx as usize).map(String::as_str)
	}

	/// Features with a string, in the order their strings were attached.
	pub fn features_in_text_order(&self) -> &[u32] {
		&self.feature_idx_in_text_order
	}

	pub fn extended_strings_for(&self, feature_idx: u32) -> impl Iterator<Item = &ExtendedString> {
		self.extended_strings.iter().filter(move |s| s.feature_idx == feature_idx)
	}

	pub fn category_of(&self, feature_idx: u32) -> Option<u32> {
		self
			.categories
			.iter()
			.find(|c| c.feature_idx == feature_idx)
			.map(|c| c.category_id)
	}

	/// Address of the string tile belonging to this data tile.
	pub fn string_map_params(&self, language: u32) -> Option<TileMapParams> {
		(self.params.map_type() == TileMapType::Data).then(|| self.params.sibling(TileMapType::Strings, language))
	}

	/// Address of the data tile belonging to this string tile.
	pub fn data_map_params(&self) -> Option<TileMapParams> {
		(self.params.map_type() == TileMapType::Strings).then(|| self.params.sibling(TileMapType::Data, 0))
	}

	/// The primitives of all features, grouped by drawing level.
	pub fn primitives_by_level(&self, desc: &TileMapFormatDesc) -> BTreeMap<u32, Vec<TilePrimitiveFeature>> {
		let mut levels: BTreeMap<u32, Vec<TilePrimitiveFeature>> = BTreeMap::new();
		for feature in &self.features {
			for primitive in desc.primitives_for(feature) {
				let level = primitive
					.arg(LEVEL)
					.and_then(|arg| arg.simple_value(0))
					.unwrap_or(DEFAULT_LEVEL);
				levels.entry(level).or_default().push(primitive);
			}
		}
		levels
	}

	fn save_data_section(&self, writer: &mut BitWriter) -> Result<()> {
		self.header.save(writer)?;
		ensure!(self.features.len() < 1 << 31, "too many features: {}", self.features.len());
		writer.write_bits(self.features.len() as u32, 31);
		let mut prev = None;
		for feature in &self.features {
			feature
				.save(writer, &self.frame, &self.coords, prev)
				.with_context(|| format!("saving feature {} of {}", feature.feature_nbr, self.params))?;
			prev = Some(feature);
		}
		Ok(())
	}

	/// CRC-32 of the data section, `None` for string tiles and tiles without features.
	pub fn data_crc(&self) -> Result<Option<u32>> {
		if self.params.map_type() != TileMapType::Data || self.features.is_empty() {
			return Ok(None);
		}
		let mut writer = BitWriter::new();
		self.save_data_section(&mut writer)?;
		writer.align_to_byte();
		Ok(Some(crc32(writer.as_slice())))
	}

	fn string_widths(&self) -> Result<(u32, u32, u32)> {
		let feature_size = self.features.len().max(self.str_idx_by_feature.len());
		let nbr_strings = self.strings.len() + self.extended_strings.len();
		let feature_bits = nbr_bits(u32::try_from(feature_size)?);
		let str_bits = nbr_bits(u32::try_from(nbr_strings)?);
		ensure!(feature_bits <= 15, "{feature_size} features do not fit a string tile");
		ensure!(str_bits <= 15, "{nbr_strings} strings do not fit a string tile");
		Ok((feature_size as u32, feature_bits, str_bits))
	}

	fn save_strings_section(&self, writer: &mut BitWriter, feature_size: u32, feature_bits: u32, str_bits: u32) {
		writer.write_bits(str_bits, 4);
		writer.write_bits(feature_bits, 4);
		writer.write_bits(feature_size, feature_bits);
		writer.write_bits(self.feature_idx_in_text_order.len() as u32, feature_bits);
		writer.write_bits((self.strings.len() + self.extended_strings.len()) as u32, str_bits);
		for feature_idx in &self.feature_idx_in_text_order {
			let str_idx = self
				.str_idx_by_feature
				.get(*feature_idx as usize)
				.copied()
				.flatten()
				.unwrap_or(0);
			writer.write_bits(*feature_idx, feature_bits);
			writer.write_bits(str_idx, str_bits);
		}
		writer.align_to_byte();
		for text in self.strings.iter().chain(self.extended_strings.iter().map(|s| &s.text)) {
			writer.write_string(text);
		}
	}

	/// Encodes the tile, gzipped when the address asks for it and that is smaller.
	///
	/// Data tiles with features write the CRC of their data section. String tiles write
	/// the CRC they carry.
	pub fn save(&self) -> Result<Blob> {
		let mut writer = BitWriter::new();
		writer.write_string("");

		let map_type = self.params.map_type();
		let (feature_size, feature_bits, str_bits) = self.string_widths()?;
		let crc = match map_type {
			TileMapType::Data => {
				let start = writer.as_slice().len();
				self.save_data_section(&mut writer)?;
				writer.align_to_byte();
				(!self.features.is_empty()).then(|| crc32(&writer.as_slice()[start..]))
			}
			TileMapType::Strings => {
				self.save_strings_section(&mut writer, feature_size, feature_bits, str_bits);
				if self.is_empty() {
					None
				} else {
					Some(self.crc.unwrap_or(u32::MAX))
				}
			}
		};

		writer.align_to_byte();
		if let Some(crc) = crc {
			writer.write_ba_u32(crc);
		}
		writer.write_ba_u16(self.empty_importances);

		if map_type == TileMapType::Strings && feature_size > 0 {
			save_feature_categories(&mut writer, &self.categories, feature_bits)?;
			for string in &self.extended_strings {
				ensure!(
					string.feature_idx < feature_size,
					"extended string of feature {} outside the tile",
					string.feature_idx
				);
			}
			save_extended_strings(
				&mut writer,
				&self.extended_strings,
				feature_bits,
				str_bits,
				self.strings.len() as u32,
			)?;
		}
		writer.align_to_byte();

		let blob = writer.into_blob();
		log::trace!("saved tile {} with {} bytes", self.params, blob.len());
		if self.params.use_gzip() {
			compress_if_smaller(blob)
		} else {
			Ok(blob)
		}
	}

	/// Decodes a tile. The buffer does not carry the address, so the caller passes it.
	///
	/// Gzipped buffers are recognised by their magic bytes.
	///
	/// # Errors
	/// Returns an error for truncated or inconsistent buffers and for addresses the
	/// description does not know.
	pub fn load(blob: &Blob, desc: &TileMapFormatDesc, params: &TileMapParams) -> Result<TileMap> {
		let inflated;
		let data = if blob.is_gzip() {
			inflated = decompress_gzip(blob).with_context(|| format!("inflating tile {params}"))?;
			inflated.as_slice()
		} else {
			blob.as_slice()
		};

		let mut tile = TileMap::new(params.clone(), desc)?;
		tile.load_size = data.len();
		tile
			.load_body(&mut BitReader::new(data), desc)
			.with_context(|| format!("loading tile {params}"))?;
		log::trace!(
			"loaded tile {params}: {} features, {} strings",
			tile.features.len(),
			tile.strings.len()
		);
		Ok(tile)
	}

	fn load_body(&mut self, reader: &mut BitReader, desc: &TileMapFormatDesc) -> Result<()> {
		reader.read_string().context("reading the leading empty string")?;

		let mut feature_bits = 0;
		let mut str_bits = 0;
		let mut nbr_strings = 0;
		match self.params.map_type() {
			TileMapType::Data => {
				self.header = ArgContainer::load(reader).context("reading the tile header")?;
				let count = reader.read_bits(31)? as usize;
				ensure!(count <= reader.bits_left(), "{count} features cannot fit the buffer");
				self.features.reserve(count);
				for feature_nbr in 0..count {
					let mut feature = TileFeature::load(reader, desc, &self.frame, &mut self.coords, self.features.last())
						.with_context(|| format!("reading feature {feature_nbr}"))?;
					feature.feature_nbr = feature_nbr;
					self.features.push(feature);
				}
			}
			TileMapType::Strings => {
				str_bits = reader.read_bits(4)?;
				feature_bits = reader.read_bits(4)?;
				let nbr_features = reader.read_bits(feature_bits)?;
				let nbr_string_features = reader.read_bits(feature_bits)?;
				nbr_strings = reader.read_bits(str_bits)? as usize;

				self.str_idx_by_feature = vec![None; nbr_features as usize];
				for _ in 0..nbr_string_features {
					let feature_idx = reader.read_bits(feature_bits)?;
					let str_idx = reader.read_bits(str_bits)?;
					ensure!(feature_idx < nbr_features, "string of feature {feature_idx} outside the tile");
					ensure!((str_idx as usize) < nbr_strings, "feature {feature_idx} refers to missing string {str_idx}");
					self.str_idx_by_feature[feature_idx as usize] = Some(str_idx);
					self.feature_idx_in_text_order.push(feature_idx);
				}
				reader.align_to_byte();
				for i in 0..nbr_strings {
					let text = reader.read_string().with_context(|| format!("reading string {i}"))?;
					self.strings.push(text);
				}
			}
		}
		reader.align_to_byte();

		if !(self.features.is_empty() && self.strings.is_empty()) && reader.bytes_left() >= 4 {
			self.crc = Some(reader.read_ba_u32()?).filter(|crc| *crc != u32::MAX);
		}

		if reader.bytes_left() >= 2 {
			self.empty_importances = reader.read_ba_u16()?;
			if self.params.map_type() == TileMapType::Strings && !self.feature_idx_in_text_order.is_empty() {
				if reader.bytes_left() >= 2 {
					self.categories = load_feature_categories(reader, feature_bits)?;
				}
				if reader.bits_left() > 0 {
					self.extended_strings = load_extended_strings(reader, &self.strings, feature_bits, str_bits)?;
					self.strings.truncate(nbr_strings.saturating_sub(self.extended_strings.len()));
				}
			}
		}
		Ok(())
	}
}

fn frame_for(params: &TileMapParams, desc: &TileMapFormatDesc) -> Result<CoordFrame> {
	let (corner, scale) = desc
		.coord_and_scale_for_tile(params.layer(), params.detail_level(), params.lat_idx(), params.lon_idx())
		.with_context(|| format!("no tile pyramid for {params}"))?;
	let mc2_scale = (f64::from(scale) * METER_TO_MC2SCALE) as i32;
	Ok(CoordFrame::new(corner.snapped(mc2_scale), mc2_scale))
}
