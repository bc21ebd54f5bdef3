//! This module defines [`TileMapFormatDesc`], the schema every tile is read with.
//!
//! # Overview
//!
//! The description is fetched once per session. It holds, per layer, the tile pyramid and the
//! importance table, and for the whole map the argument template of every feature type, the
//! rules that split a feature into drawable primitives, the POI categories and a few display
//! settings.
//!
//! # Wire layout
//!
//! All fields are byte aligned and big-endian. In order:
//!
//! 1. server prefix as a decimal string, BA u8 layer count, then per layer its geometry
//!    (u16 meters, u16 pixels, u16 dpi, u32 zoom factor, u32 exchange factor, both in
//!    thousandths, u8 detail levels), u8 layer id, name and importance table;
//! 2. u16 template count, then per feature type `0..count` the u16 type, u8 argument count
//!    and the arguments in full form;
//! 3. u8 count and u32 values of the scale levels;
//! 4. the primitive default arguments as an argument container;
//! 5. u16 count of primitive rules, each: u16 feature type, u8 primitive count, then per
//!    primitive its u16 type, u8 argument count and u16 indices into the defaults;
//! 6. u16 count of transfer maps, each: u16 feature type, u16 entry count, then per entry
//!    u8 source argument, u16 primitive index and u8 target argument;
//! 7. u32 background color.
//!
//! Later blocks are optional and recognised by the number of bytes left: reserve settings
//! (two u32), language (u32) with a category table, CRC and timestamp (two u32), the
//! refined tile scales of every layer, the copyright line, a second category table that
//! replaces the first, and extended layer info.

use super::{
	LayerInfo, TileCategory, TileGeometry, TileScale,
	category::{disabled_feature_types, load_categories, save_categories},
	layer_info::{load_layer_infos, save_layer_infos},
	tile_scale::{detail_level_for_scale, tile_index_1d},
};
use crate::{
	ArgContainer, ArgName, ArgTemplates, Blob, Config, FeatureArg, ImportanceNotice, ImportanceTable, MAX_CAPPED_LAT,
	MIN_CAPPED_LAT, Mc2BBox, Mc2Coord, TileFeature, TileMapParams, TilePrimitiveFeature,
	decompress_if_gzip,
	io::{BitReader, BitWriter},
};
use anyhow::{Context, Result, ensure};
use std::collections::{BTreeMap, BTreeSet};

/// One layer of the description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerDesc {
	pub id: u32,
	pub name: String,
	pub geometry: TileGeometry,
	/// Effective pyramid, indexed by detail level.
	pub tile_scales: Vec<TileScale>,
	pub importance: ImportanceTable,
}

impl LayerDesc {
	/// A layer whose pyramid is computed from `geometry`.
	pub fn new(id: u32, name: &str, geometry: TileGeometry, importance: ImportanceTable) -> LayerDesc {
		LayerDesc {
			id,
			name: name.to_string(),
			tile_scales: geometry.tile_scales(),
			geometry,
			importance,
		}
	}
}

/// A primitive a complex feature type is drawn with, and its constant arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimitiveDefault {
	pub feature_type: i16,
	/// Indices into [`TileMapFormatDesc::default_args`].
	pub arg_indices: Vec<u16>,
}

/// Moves an argument of a complex feature into one of its primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArgTransfer {
	pub from: ArgName,
	/// Index into the feature type's [`PrimitiveDefault`] list.
	pub primitive: u16,
	pub to: ArgName,
}

/// The format description.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMapFormatDesc {
	pub server_prefix: u32,
	pub layers: Vec<LayerDesc>,
	/// Argument template per feature type, indexed by type.
	pub arg_templates: Vec<Vec<FeatureArg>>,
	pub scale_levels: Vec<u32>,
	pub default_args: ArgContainer,
	pub primitive_defaults: BTreeMap<i16, Vec<PrimitiveDefault>>,
	/// Transfer map per feature type, indexed by type.
	pub arg_transfers: Vec<Vec<ArgTransfer>>,
	pub background_color: u32,
	pub reserve_detail: u32,
	pub reserve_extra_tiles: u32,
	pub language: Option<u32>,
	pub categories: Vec<TileCategory>,
	pub crc: Option<u32>,
	pub timestamp: u32,
	pub copyright: String,
	pub layer_infos: Vec<LayerInfo>,
}

impl TileMapFormatDesc {
	/// An empty description with the fallbacks from `config`.
	pub fn new(server_prefix: u32, config: &Config) -> TileMapFormatDesc {
		TileMapFormatDesc {
			server_prefix,
			layers: Vec::new(),
			arg_templates: Vec::new(),
			scale_levels: Vec::new(),
			default_args: ArgContainer::new(),
			primitive_defaults: BTreeMap::new(),
			arg_transfers: Vec::new(),
			background_color: 0,
			reserve_detail: config.reserve_detail,
			reserve_extra_tiles: config.reserve_extra_tiles,
			language: None,
			categories: Vec::new(),
			crc: None,
			timestamp: 0,
			copyright: config.default_copyright.clone(),
			layer_infos: Vec::new(),
		}
	}

	/// Parses a description blob, gzip-compressed or not.
	///
	/// Categories whose id exists in `previous` keep the enabled state they had there.
	///
	/// # Errors
	/// Returns an error if a mandatory block is truncated or the content is inconsistent.
	pub fn load(blob: &Blob, previous: Option<&TileMapFormatDesc>, config: &Config) -> Result<TileMapFormatDesc> {
		let blob = decompress_if_gzip(blob.clone()).context("unpacking format description")?;
		let mut reader = BitReader::new(blob.as_slice());
		let mut desc = TileMapFormatDesc::new(0, config);

		let prefix = reader.read_string().context("reading server prefix")?;
		desc.server_prefix = prefix
			.trim()
			.parse()
			.with_context(|| format!("server prefix {prefix:?} is not a number"))?;

		let nbr_layers = reader.read_ba_u8().context("reading layer count")?;
		for _ in 0..nbr_layers {
			let layer = load_layer(&mut reader).with_context(|| format!("reading layer {}", desc.layers.len()))?;
			desc.layers.push(layer);
		}

		let nbr_templates = reader.read_ba_u16().context("reading template count")?;
		for index in 0..nbr_templates {
			let feature_type = reader.read_ba_i16()?;
			ensure!(
				i32::from(feature_type) == i32::from(index),
				"argument template {index} is for type {feature_type}"
			);
			let nbr_args = reader.read_ba_u8()?;
			let args = (0..nbr_args)
				.map(|_| FeatureArg::load_full(&mut reader))
				.collect::<Result<Vec<_>>>()
				.with_context(|| format!("reading argument template of type {feature_type}"))?;
			reader.align_to_byte();
			desc.arg_templates.push(args);
		}

		let nbr_scale_levels = reader.read_ba_u8().context("reading scale levels")?;
		desc.scale_levels = (0..nbr_scale_levels)
			.map(|_| reader.read_ba_u32())
			.collect::<Result<Vec<_>>>()?;

		desc.default_args = ArgContainer::load(&mut reader).context("reading primitive default arguments")?;
		reader.align_to_byte();

		let nbr_rules = reader.read_ba_u16().context("reading primitive rules")?;
		for _ in 0..nbr_rules {
			let feature_type = reader.read_ba_i16()?;
			let nbr_primitives = reader.read_ba_u8()?;
			let mut primitives = Vec::with_capacity(usize::from(nbr_primitives));
			for _ in 0..nbr_primitives {
				let primitive_type = reader.read_ba_i16()?;
				let nbr_args = reader.read_ba_u8()?;
				let arg_indices = (0..nbr_args)
					.map(|_| reader.read_ba_u16())
					.collect::<Result<Vec<_>>>()?;
				for index in &arg_indices {
					ensure!(
						usize::from(*index) < desc.default_args.len(),
						"primitive {primitive_type} of type {feature_type} refers to default argument {index}, only {} exist",
						desc.default_args.len()
					);
				}
				primitives.push(PrimitiveDefault {
					feature_type: primitive_type,
					arg_indices,
				});
				reader.align_to_byte();
			}
			desc.primitive_defaults.insert(feature_type, primitives);
		}

		let nbr_transfer_maps = reader.read_ba_u16().context("reading transfer maps")?;
		for index in 0..nbr_transfer_maps {
			let feature_type = reader.read_ba_i16()?;
			ensure!(
				i32::from(feature_type) == i32::from(index),
				"transfer map {index} is for type {feature_type}"
			);
			let nbr_entries = reader.read_ba_u16()?;
			let entries = (0..nbr_entries)
				.map(|_| {
					Ok(ArgTransfer {
						from: reader.read_ba_u8()?,
						primitive: reader.read_ba_u16()?,
						to: reader.read_ba_u8()?,
					})
				})
				.collect::<Result<Vec<_>>>()?;
			desc.arg_transfers.push(entries);
		}

		desc.background_color = reader.read_ba_u32().context("reading background color")?;

		desc.load_optional_blocks(&mut reader, previous)?;
		if desc.layer_infos.is_empty() {
			desc.layer_infos = desc.layers.iter().map(|l| LayerInfo::basic(l.id, &l.name)).collect();
		}

		log::debug!(
			"loaded format description: {} layers, {} feature types, crc {:?}",
			desc.layers.len(),
			desc.arg_templates.len(),
			desc.crc
		);
		Ok(desc)
	}

	fn load_optional_blocks(&mut self, reader: &mut BitReader, previous: Option<&TileMapFormatDesc>) -> Result<()> {
		let previous_categories = previous.map(|p| p.categories.as_slice());

		if reader.bytes_left() < 8 {
			return Ok(());
		}
		self.reserve_detail = reader.read_ba_u32()?;
		self.reserve_extra_tiles = reader.read_ba_u32()?;

		if reader.bytes_left() < 12 {
			return Ok(());
		}
		let language = reader.read_ba_u32()?;
		self.language = (language != u32::MAX).then_some(language);
		self.categories = load_categories(reader, previous_categories)?;

		if reader.bytes_left() < 8 {
			return Ok(());
		}
		let crc = reader.read_ba_u32()?;
		self.crc = (crc != u32::MAX).then_some(crc);
		self.timestamp = reader.read_ba_u32()?;

		if reader.bytes_left() > 0 {
			for layer in &mut self.layers {
				let nbr_details = reader.read_ba_u8().context("reading refined tile scales")?;
				layer.tile_scales = (0..nbr_details)
					.map(|_| {
						Ok(TileScale {
							mc2_units: reader.read_ba_u32()? as i32,
							max_scale: reader.read_ba_u16()?,
						})
					})
					.collect::<Result<Vec<_>>>()?;
				check_tile_scales(layer)?;
			}
		}

		if reader.bytes_left() > 0 {
			self.copyright = reader.read_string().context("reading copyright")?;
		}

		if reader.bytes_left() < 8 {
			return Ok(());
		}
		self.categories = load_categories(reader, previous_categories)?;

		if reader.bytes_left() < 8 {
			return Ok(());
		}
		self.layer_infos = load_layer_infos(reader)?;
		Ok(())
	}

	/// Writes the description with every optional block present.
	pub fn save(&self) -> Result<Blob> {
		let mut writer = BitWriter::new();
		writer.write_string(&self.server_prefix.to_string());

		ensure!(self.layers.len() <= usize::from(u8::MAX), "too many layers");
		writer.write_ba_u8(self.layers.len() as u8);
		for layer in &self.layers {
			let geometry = &layer.geometry;
			writer.write_ba_u16(geometry.meters);
			writer.write_ba_u16(geometry.pixels);
			writer.write_ba_u16(geometry.dpi);
			writer.write_ba_u32(geometry.zoom_factor_milli);
			writer.write_ba_u32(geometry.exchange_factor_milli);
			writer.write_ba_u8(geometry.detail_levels);
			ensure!(layer.id <= u32::from(u8::MAX), "layer id {} does not fit", layer.id);
			writer.write_ba_u8(layer.id as u8);
			writer.write_string(&layer.name);
			layer.importance.save(&mut writer)?;
		}

		ensure!(self.arg_templates.len() <= i16::MAX as usize, "too many feature types");
		writer.write_ba_u16(self.arg_templates.len() as u16);
		for (feature_type, args) in self.arg_templates.iter().enumerate() {
			writer.write_ba_u16(feature_type as u16);
			ensure!(args.len() <= usize::from(u8::MAX), "type {feature_type} has too many arguments");
			writer.write_ba_u8(args.len() as u8);
			for arg in args {
				arg.save_full(&mut writer)?;
			}
			writer.align_to_byte();
		}

		ensure!(self.scale_levels.len() <= usize::from(u8::MAX), "too many scale levels");
		writer.write_ba_u8(self.scale_levels.len() as u8);
		for level in &self.scale_levels {
			writer.write_ba_u32(*level);
		}

		self.default_args.save(&mut writer)?;
		writer.align_to_byte();

		writer.write_ba_u16(self.primitive_defaults.len() as u16);
		for (feature_type, primitives) in &self.primitive_defaults {
			writer.write_ba_i16(*feature_type);
			writer.write_ba_u8(primitives.len() as u8);
			for primitive in primitives {
				writer.write_ba_i16(primitive.feature_type);
				writer.write_ba_u8(primitive.arg_indices.len() as u8);
				for index in &primitive.arg_indices {
					writer.write_ba_u16(*index);
				}
				writer.align_to_byte();
			}
		}

		writer.write_ba_u16(self.arg_transfers.len() as u16);
		for (feature_type, entries) in self.arg_transfers.iter().enumerate() {
			writer.write_ba_u16(feature_type as u16);
			writer.write_ba_u16(entries.len() as u16);
			for entry in entries {
				writer.write_ba_u8(entry.from);
				writer.write_ba_u16(entry.primitive);
				writer.write_ba_u8(entry.to);
			}
		}

		writer.write_ba_u32(self.background_color);
		writer.write_ba_u32(self.reserve_detail);
		writer.write_ba_u32(self.reserve_extra_tiles);
		writer.write_ba_u32(self.language.unwrap_or(u32::MAX));
		save_categories(&mut writer, &self.categories);
		writer.write_ba_u32(self.crc.unwrap_or(u32::MAX));
		writer.write_ba_u32(self.timestamp);

		for layer in &self.layers {
			writer.write_ba_u8(layer.tile_scales.len() as u8);
			for entry in &layer.tile_scales {
				writer.write_ba_u32(entry.mc2_units as u32);
				writer.write_ba_u16(entry.max_scale);
			}
		}
		writer.write_string(&self.copyright);
		save_categories(&mut writer, &self.categories);
		save_layer_infos(&mut writer, &self.layer_infos)?;

		Ok(writer.into_blob())
	}

	pub fn layer(&self, layer_id: u32) -> Option<&LayerDesc> {
		self.layers.iter().find(|layer| layer.id == layer_id)
	}

	/// Position of the layer in [`layers`](Self::layers).
	pub fn layer_nbr(&self, layer_id: u32) -> Option<usize> {
		self.layers.iter().position(|layer| layer.id == layer_id)
	}

	fn tile_scale(&self, layer_id: u32, detail_level: u32) -> Option<TileScale> {
		self.layer(layer_id)?.tile_scales.get(detail_level as usize).copied()
	}

	pub fn nbr_detail_levels(&self, layer_id: u32) -> Option<u32> {
		self.layer(layer_id).map(|layer| layer.tile_scales.len() as u32)
	}

	pub fn detail_level_for_scale(&self, layer_id: u32, scale: u16) -> Option<u32> {
		self
			.layer(layer_id)
			.map(|layer| detail_level_for_scale(&layer.tile_scales, scale))
	}

	pub fn mc2_units_per_tile(&self, layer_id: u32, detail_level: u32) -> Option<i32> {
		self.tile_scale(layer_id, detail_level).map(|entry| entry.mc2_units)
	}

	pub fn scale_for_detail_level(&self, layer_id: u32, detail_level: u32) -> Option<u16> {
		self.tile_scale(layer_id, detail_level).map(|entry| entry.max_scale)
	}

	/// `(lat_idx, lon_idx)` of the tile containing `coord`.
	pub fn tile_index(&self, layer_id: u32, detail_level: u32, coord: Mc2Coord) -> Option<(i32, i32)> {
		let units = self.mc2_units_per_tile(layer_id, detail_level)?;
		Some((tile_index_1d(coord.lat, units)?, tile_index_1d(coord.lon, units)?))
	}

	/// Narrows a latitude index range to the tiles that lie fully inside the drawable band.
	///
	/// Unknown layers and detail levels leave the range untouched.
	pub fn cap_lat_idx(&self, layer_id: u32, detail_level: u32, min_idx: i32, max_idx: i32) -> (i32, i32) {
		let south = self.tile_index(layer_id, detail_level, Mc2Coord::new(MIN_CAPPED_LAT, 0));
		let north = self.tile_index(layer_id, detail_level, Mc2Coord::new(MAX_CAPPED_LAT, 0));
		match (south, north) {
			(Some((south, _)), Some((north, _))) => (min_idx.max(south + 1), max_idx.min(north - 1)),
			_ => (min_idx, max_idx),
		}
	}

	/// Reference corner and entry scale of a tile, the frame its coordinates are stored in.
	///
	/// The corner wraps like the tile index arithmetic on the server does.
	pub fn coord_and_scale_for_tile(&self, layer_id: u32, detail_level: u32, lat_idx: i32, lon_idx: i32) -> Option<(Mc2Coord, u16)> {
		let entry = self.tile_scale(layer_id, detail_level)?;
		let corner = Mc2Coord::new(entry.mc2_units.wrapping_mul(lat_idx), entry.mc2_units.wrapping_mul(lon_idx));
		Some((corner, entry.max_scale))
	}

	/// The area a tile covers, clamped to the `i32` range.
	pub fn bbox_for_tile(&self, layer_id: u32, detail_level: u32, lat_idx: i32, lon_idx: i32) -> Option<Mc2BBox> {
		let units = i64::from(self.mc2_units_per_tile(layer_id, detail_level)?);
		let clamp = |value: i64| value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
		let min_lat = units * i64::from(lat_idx);
		let min_lon = units * i64::from(lon_idx);
		let (lat0, lat1) = (clamp(min_lat), clamp(min_lat + units));
		let (lon0, lon1) = (clamp(min_lon), clamp(min_lon + units));
		Some(Mc2BBox {
			min_lat: lat0.min(lat1),
			min_lon: lon0.min(lon1),
			max_lat: lat0.max(lat1),
			max_lon: lon0.max(lon1),
		})
	}

	/// The notice behind the importance of `params`.
	pub fn importance_for(&self, params: &TileMapParams) -> Option<&ImportanceNotice> {
		self
			.layer(params.layer())?
			.importance
			.importance(params.importance() as usize, params.detail_level())
	}

	/// `(min, max)` scale at which the tile of `params` is drawn.
	pub fn scale_range(&self, params: &TileMapParams) -> Option<(u16, u16)> {
		let layer = self.layer(params.layer())?;
		let detail = params.detail_level() as usize;
		let min = if detail == 0 {
			0
		} else {
			layer.tile_scales.get(detail)?.max_scale
		};
		let next = layer.tile_scales.get(detail + 1).map_or(u16::MAX, |entry| entry.max_scale);
		let notice = self.importance_for(params)?;
		Some((min, notice.max_scale.min(next)))
	}

	/// Whether `params` names an existing layer and detail level and a tile inside the
	/// drawable latitude band.
	pub fn valid(&self, params: &TileMapParams) -> bool {
		let Some(units) = self.mc2_units_per_tile(params.layer(), params.detail_level()) else {
			return false;
		};
		let units = f64::from(units);
		let lat_idx = f64::from(params.lat_idx());
		!((lat_idx + 1.0) * units >= f64::from(i32::MAX / 2) || lat_idx * units < f64::from(i32::MIN / 2))
	}

	pub fn is_valid_importance(&self, params: &TileMapParams) -> bool {
		self.layer(params.layer()).is_some_and(|layer| {
			layer
				.importance
				.is_valid_importance(params.importance() as usize, params.detail_level())
		})
	}

	/// Tiles of transient layers and invalid addresses must not be cached on disk.
	pub fn allowed_on_disk(&self, params: &TileMapParams) -> bool {
		if !params.is_valid() {
			return false;
		}
		match self.layer_infos.iter().find(|info| info.id == params.layer()) {
			Some(info) => !info.transient,
			None => {
				log::warn!("no layer info for tile {params}");
				false
			}
		}
	}

	pub fn categories(&self) -> &[TileCategory] {
		&self.categories
	}

	/// Returns `false` if no category has this id.
	pub fn set_category_enabled(&mut self, id: u16, enabled: bool) -> bool {
		match self.categories.iter_mut().find(|c| c.id == id) {
			Some(category) => {
				category.enabled = enabled;
				true
			}
			None => false,
		}
	}

	pub fn features_disabled_by_categories(&self) -> BTreeSet<i16> {
		disabled_feature_types(&self.categories)
	}

	/// Position of a scale level among the per-scale values of arguments.
	pub fn scale_index_for_level(&self, level: u32) -> Option<usize> {
		self.scale_levels.iter().position(|l| *l == level)
	}

	/// Splits a feature into the primitives it is drawn with.
	///
	/// Every primitive starts with its default arguments. Arguments named in the feature
	/// type's transfer map are then copied from the feature, replacing a default of the same
	/// target name. All primitives share the feature's coordinate range.
	pub fn primitives_for(&self, feature: &TileFeature) -> Vec<TilePrimitiveFeature> {
		let Some(rules) = self.primitive_defaults.get(&feature.feature_type) else {
			return Vec::new();
		};
		let coords = feature.coord_range().unwrap_or(0..0);
		let mut primitives: Vec<TilePrimitiveFeature> = rules
			.iter()
			.map(|rule| TilePrimitiveFeature {
				feature_type: rule.feature_type,
				args: rule
					.arg_indices
					.iter()
					.filter_map(|i| self.default_args.get(usize::from(*i)).cloned())
					.collect(),
				feature_nbr: feature.feature_nbr,
				coords: coords.clone(),
			})
			.collect();

		let transfers = usize::try_from(feature.feature_type)
			.ok()
			.and_then(|t| self.arg_transfers.get(t))
			.map_or(&[][..], Vec::as_slice);
		for transfer in transfers {
			let Some(arg) = feature.arg(transfer.from) else {
				continue;
			};
			let Some(primitive) = primitives.get_mut(usize::from(transfer.primitive)) else {
				log::trace!("transfer to missing primitive {} of type {}", transfer.primitive, feature.feature_type);
				continue;
			};
			let arg = arg.clone().renamed(transfer.to);
			match primitive.args.iter_mut().find(|a| a.name() == transfer.to) {
				Some(slot) => *slot = arg,
				None => primitive.args.push(arg),
			}
		}
		primitives
	}
}

impl ArgTemplates for TileMapFormatDesc {
	fn args_for_type(&self, feature_type: i16) -> Option<&[FeatureArg]> {
		let index = usize::try_from(feature_type).ok()?;
		self.arg_templates.get(index).map(Vec::as_slice)
	}
}

fn load_layer(reader: &mut BitReader) -> Result<LayerDesc> {
	let geometry = TileGeometry {
		meters: reader.read_ba_u16()?,
		pixels: reader.read_ba_u16()?,
		dpi: reader.read_ba_u16()?,
		zoom_factor_milli: reader.read_ba_u32()?,
		exchange_factor_milli: reader.read_ba_u32()?,
		detail_levels: reader.read_ba_u8()?,
	};
	let id = u32::from(reader.read_ba_u8()?);
	let name = reader.read_string()?;
	let importance = ImportanceTable::load(reader).with_context(|| format!("reading importance table of layer {id}"))?;
	let layer = LayerDesc::new(id, &name, geometry, importance);
	check_tile_scales(&layer)?;
	log::trace!("layer {id} ({name}) has {} detail levels", layer.tile_scales.len());
	Ok(layer)
}

fn check_tile_scales(layer: &LayerDesc) -> Result<()> {
	for (detail, entry) in layer.tile_scales.iter().enumerate() {
		ensure!(
			entry.mc2_units != 0 && entry.mc2_units != -1,
			"layer {} has tile size {} at detail level {detail}",
			layer.id,
			entry.mc2_units
		);
	}
	Ok(())
}
