//! This module defines [`TileMapParams`], the address of one tile and its string form.
//!
//! # Overview
//!
//! An address is packed into a bit stream and printed with a 64-symbol alphabet, 6 bits per
//! character, after a one-character tag (`'G'` for data tiles, `'T'` for string tiles).
//! Fields in bit order:
//!
//! | field                         | bits                              |
//! |-------------------------------|-----------------------------------|
//! | importance, low part          | 4                                 |
//! | detail level                  | 4                                 |
//! | index width `w`               | 4, only if detail level > 0 (else `w` = 15) |
//! | lat/lon index                 | `w` each; if `w` > 8: low 8 of both, then high `w - 8` of both |
//! | layer                         | 4                                 |
//! | server prefix, low part       | 5                                 |
//! | language, low 3 then next 3   | 6, string tiles only              |
//! | extended language flag        | 1, followed by 7 more language bits if set |
//! | importance, high bit          | 1                                 |
//! | inverted gzip flag            | 1                                 |
//! | route id                      | 64, route layer only              |
//!
//! Trailing zero symbols are dropped from the printed form. A decoder sees 8 bits for
//! every character of the string (tag included) with zeros past the last symbol, so
//! symbols are only dropped while that budget still covers every written bit.
//!
//! Indices outside [`PARAMS_INDEX_RANGE`] do not fit the 15-bit field. Such addresses are
//! built with `is_valid() == false` instead of being truncated.
//!
//! Decoding never fails: malformed input gives an address with `is_valid() == false`.

use crate::{
	NEUTRAL_LANGUAGE, ROUTE_LAYER, RouteId, TileMapType,
	io::{BitReader, BitWriter, nbr_bits_signed},
};
use anyhow::{Result, bail, ensure};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// The 64 printable symbols, in value order. `'!'` is zero.
pub const PARAMS_ALPHABET: &[u8; 64] = b"!()*+-<>@ABCDEFGHIJKLMNOPQRSTUVWXYZ[]^abcdefghijklmnopqrstuvwxyz";

/// Largest language code that fits the address.
pub const MAX_PARAMS_LANGUAGE: u32 = (1 << 13) - 1;

/// Latitude and longitude indices an address can carry.
pub const PARAMS_INDEX_RANGE: std::ops::RangeInclusive<i32> = -(1 << 14)..=(1 << 14) - 1;

#[derive(Clone, Copy, PartialEq, Eq)]
struct Fields {
	server_prefix: u32,
	use_gzip: bool,
	layer: u32,
	map_type: TileMapType,
	importance: u32,
	language: u32,
	detail_level: u32,
	lat_idx: i32,
	lon_idx: i32,
	route_id: Option<RouteId>,
}

/// The complete address of a tile.
///
/// Equality, ordering and hashing follow the printed form, which is also the key used by
/// the buffer cache.
#[derive(Clone)]
pub struct TileMapParams {
	fields: Fields,
	valid: bool,
	text: String,
}

impl TileMapParams {
	/// Address of a gzip-compressed data tile.
	pub fn new_data(layer: u32, detail_level: u32, importance: u32, lat_idx: i32, lon_idx: i32) -> TileMapParams {
		TileMapParams::from_fields(Fields {
			server_prefix: 0,
			use_gzip: true,
			layer,
			map_type: TileMapType::Data,
			importance,
			language: NEUTRAL_LANGUAGE,
			detail_level,
			lat_idx,
			lon_idx,
			route_id: None,
		})
	}

	fn from_fields(mut fields: Fields) -> TileMapParams {
		fields.server_prefix &= 0x1f;
		fields.layer &= 0xf;
		fields.importance &= 0x1f;
		fields.detail_level &= 0xf;
		fields.language = match fields.map_type {
			TileMapType::Data => NEUTRAL_LANGUAGE,
			TileMapType::Strings => fields.language & MAX_PARAMS_LANGUAGE,
		};
		fields.route_id = if fields.layer == ROUTE_LAYER {
			Some(fields.route_id.unwrap_or_else(RouteId::invalid))
		} else {
			None
		};
		let valid = PARAMS_INDEX_RANGE.contains(&fields.lat_idx) && PARAMS_INDEX_RANGE.contains(&fields.lon_idx);
		if !valid {
			log::trace!("tile index ({}, {}) out of range", fields.lat_idx, fields.lon_idx);
		}
		TileMapParams {
			text: encode(&fields),
			fields,
			valid,
		}
	}

	fn with(&self, change: impl FnOnce(&mut Fields)) -> TileMapParams {
		let mut fields = self.fields;
		change(&mut fields);
		TileMapParams::from_fields(fields)
	}

	#[must_use]
	pub fn with_server_prefix(&self, server_prefix: u32) -> TileMapParams {
		self.with(|f| f.server_prefix = server_prefix)
	}

	#[must_use]
	pub fn with_gzip(&self, use_gzip: bool) -> TileMapParams {
		self.with(|f| f.use_gzip = use_gzip)
	}

	/// Sets the language. Data tiles always keep the neutral language.
	#[must_use]
	pub fn with_language(&self, language: u32) -> TileMapParams {
		self.with(|f| f.language = language)
	}

	/// Sets the route id. Ignored outside of the route layer, where addresses without one
	/// carry [`RouteId::invalid`].
	#[must_use]
	pub fn with_route_id(&self, route_id: RouteId) -> TileMapParams {
		self.with(|f| f.route_id = Some(route_id))
	}

	#[must_use]
	pub fn with_importance(&self, importance: u32) -> TileMapParams {
		self.with(|f| f.importance = importance)
	}

	/// The address of the other tile at the same place, e.g. the string tile of a data tile.
	#[must_use]
	pub fn sibling(&self, map_type: TileMapType, language: u32) -> TileMapParams {
		self.with(|f| {
			f.map_type = map_type;
			f.language = language;
		})
	}

	/// Parses a printed address. Malformed input gives an invalid address.
	pub fn from_string(text: &str) -> TileMapParams {
		match decode(text) {
			Ok(fields) => TileMapParams {
				fields,
				valid: true,
				text: text.to_string(),
			},
			Err(error) => {
				log::debug!("invalid tile address {text:?}: {error}");
				TileMapParams {
					fields: Fields {
						server_prefix: 0,
						use_gzip: false,
						layer: 0,
						map_type: TileMapType::Data,
						importance: 0,
						language: NEUTRAL_LANGUAGE,
						detail_level: 0,
						lat_idx: 0,
						lon_idx: 0,
						route_id: None,
					},
					valid: false,
					text: text.to_string(),
				}
			}
		}
	}

	pub fn is_valid(&self) -> bool {
		self.valid
	}

	pub fn as_str(&self) -> &str {
		&self.text
	}

	pub fn server_prefix(&self) -> u32 {
		self.fields.server_prefix
	}

	pub fn use_gzip(&self) -> bool {
		self.fields.use_gzip
	}

	pub fn layer(&self) -> u32 {
		self.fields.layer
	}

	pub fn map_type(&self) -> TileMapType {
		self.fields.map_type
	}

	pub fn importance(&self) -> u32 {
		self.fields.importance
	}

	pub fn language(&self) -> u32 {
		self.fields.language
	}

	pub fn detail_level(&self) -> u32 {
		self.fields.detail_level
	}

	pub fn lat_idx(&self) -> i32 {
		self.fields.lat_idx
	}

	pub fn lon_idx(&self) -> i32 {
		self.fields.lon_idx
	}

	pub fn route_id(&self) -> Option<RouteId> {
		self.fields.route_id
	}
}

fn encode(fields: &Fields) -> String {
	let mut writer = BitWriter::new();
	writer.write_bits(fields.importance & 0xf, 4);
	writer.write_bits(fields.detail_level, 4);

	let width = if fields.detail_level > 0 {
		let width = nbr_bits_signed(fields.lat_idx.unsigned_abs().max(fields.lon_idx.unsigned_abs())).min(15);
		writer.write_bits(width, 4);
		width
	} else {
		15
	};
	if width > 8 {
		writer.write_bits(fields.lat_idx as u32 & 0xff, 8);
		writer.write_bits(fields.lon_idx as u32 & 0xff, 8);
		writer.write_signed_bits(fields.lat_idx >> 8, width - 8);
		writer.write_signed_bits(fields.lon_idx >> 8, width - 8);
	} else {
		writer.write_signed_bits(fields.lat_idx, width);
		writer.write_signed_bits(fields.lon_idx, width);
	}

	writer.write_bits(fields.layer, 4);
	writer.write_bits(fields.server_prefix, 5);
	if fields.map_type == TileMapType::Strings {
		writer.write_bits(fields.language & 0x7, 3);
		writer.write_bits((fields.language >> 3) & 0x7, 3);
	}
	let extended_language = fields.language >= 64;
	writer.write_bool(extended_language);
	if extended_language {
		writer.write_bits((fields.language >> 6) & 0x7f, 7);
	}
	writer.write_bits(fields.importance >> 4, 1);
	writer.write_bool(!fields.use_gzip);
	if fields.layer == ROUTE_LAYER {
		let route_id = fields.route_id.unwrap_or_else(RouteId::invalid);
		writer.write_bits(route_id.id, 32);
		writer.write_bits(route_id.create_time, 32);
	}

	let nbr_bits = writer.current_bit_offset();
	let nbr_chars = nbr_bits.div_ceil(6);
	let mut data = writer.into_vec();
	data.resize((nbr_chars * 6).div_ceil(8), 0);

	let mut reader = BitReader::new(&data);
	let mut symbols: Vec<u8> = (0..nbr_chars)
		.map(|_| reader.read_bits(6).map_or(PARAMS_ALPHABET[0], |v| PARAMS_ALPHABET[v as usize]))
		.collect();
	// Every character, the tag included, gives the decoder 8 bits.
	while symbols.last() == Some(&PARAMS_ALPHABET[0]) && 8 * symbols.len() >= nbr_bits {
		symbols.pop();
	}

	let mut text = String::with_capacity(symbols.len() + 1);
	text.push(fields.map_type.tag());
	text.extend(symbols.into_iter().map(char::from));
	text
}

fn decode(text: &str) -> Result<Fields> {
	let mut chars = text.chars();
	let tag = chars.next();
	let Some(map_type) = tag.and_then(TileMapType::from_tag) else {
		bail!("unknown tag {tag:?}");
	};

	let mut writer = BitWriter::new();
	for c in chars {
		let value = u8::try_from(c)
			.ok()
			.and_then(|b| PARAMS_ALPHABET.iter().position(|s| *s == b));
		let Some(value) = value else {
			bail!("character {c:?} is not part of the alphabet");
		};
		writer.write_bits(value as u32, 6);
	}
	let mut data = writer.into_vec();
	data.resize(text.len(), 0);
	let mut reader = BitReader::new(&data);

	let importance_low = reader.read_bits(4)?;
	let detail_level = reader.read_bits(4)?;
	let width = if detail_level > 0 { reader.read_bits(4)? } else { 15 };
	ensure!(width > 0, "index width is zero");
	let (lat_idx, lon_idx) = if width > 8 {
		let lat_low = reader.read_bits(8)? as i32;
		let lon_low = reader.read_bits(8)? as i32;
		let lat_high = reader.read_signed_bits(width - 8)?;
		let lon_high = reader.read_signed_bits(width - 8)?;
		((lat_high << 8) | lat_low, (lon_high << 8) | lon_low)
	} else {
		(reader.read_signed_bits(width)?, reader.read_signed_bits(width)?)
	};

	let layer = reader.read_bits(4)?;
	let server_prefix = reader.read_bits(5)?;
	let mut language = match map_type {
		TileMapType::Strings => {
			let low = reader.read_bits(3)?;
			let high = reader.read_bits(3)?;
			(high << 3) | low
		}
		TileMapType::Data => NEUTRAL_LANGUAGE,
	};
	if reader.read_bool()? {
		language |= reader.read_bits(7)? << 6;
	}
	let importance = (reader.read_bits(1)? << 4) | importance_low;
	let use_gzip = !reader.read_bool()?;
	let route_id = if layer == ROUTE_LAYER {
		let id = reader.read_bits(32)?;
		let create_time = reader.read_bits(32)?;
		Some(RouteId::new(id, create_time))
	} else {
		None
	};

	if map_type == TileMapType::Data {
		language = NEUTRAL_LANGUAGE;
	}

	Ok(Fields {
		server_prefix,
		use_gzip,
		layer,
		map_type,
		importance,
		language,
		detail_level,
		lat_idx,
		lon_idx,
		route_id,
	})
}

impl Display for TileMapParams {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.text)
	}
}

impl Debug for TileMapParams {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if !self.valid {
			return write!(f, "TileMapParams({:?}, invalid)", self.text);
		}
		let fields = &self.fields;
		write!(
			f,
			"TileMapParams({:?}, {} layer {} detail {} [{}, {}] imp {} lang {}",
			self.text, fields.map_type, fields.layer, fields.detail_level, fields.lat_idx, fields.lon_idx, fields.importance, fields.language
		)?;
		if let Some(route_id) = fields.route_id {
			write!(f, " route {route_id}")?;
		}
		f.write_str(")")
	}
}

impl PartialEq for TileMapParams {
	fn eq(&self, other: &Self) -> bool {
		self.text == other.text
	}
}

impl Eq for TileMapParams {}

impl Hash for TileMapParams {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.text.hash(state);
	}
}

impl PartialOrd for TileMapParams {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for TileMapParams {
	fn cmp(&self, other: &Self) -> Ordering {
		self.text.cmp(&other.text)
	}
}

impl FromStr for TileMapParams {
	type Err = Infallible;

	fn from_str(text: &str) -> std::result::Result<Self, Self::Err> {
		Ok(TileMapParams::from_string(text))
	}
}

impl From<&str> for TileMapParams {
	fn from(text: &str) -> Self {
		TileMapParams::from_string(text)
	}
}
