use crate::io::{BitReader, BitWriter};
use anyhow::{Context, Result, ensure};
use std::collections::BTreeSet;

/// A user-facing group of feature types, e.g. "Restaurants", that can be hidden as a whole.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileCategory {
	pub name: String,
	pub id: u16,
	pub enabled: bool,
	pub feature_types: Vec<i16>,
}

impl TileCategory {
	pub fn new(name: &str, id: u16, enabled: bool, feature_types: Vec<i16>) -> TileCategory {
		TileCategory {
			name: name.to_string(),
			id,
			enabled,
			feature_types,
		}
	}
}

/// Writes a category table: BA u32 count, BA u32 total number of types, then per category
/// its name, BA u16 id, BA u8 enabled flag, BA u32 type count and BA u32 types.
pub(crate) fn save_categories(writer: &mut BitWriter, categories: &[TileCategory]) {
	let total: usize = categories.iter().map(|c| c.feature_types.len()).sum();
	writer.write_ba_u32(categories.len() as u32);
	writer.write_ba_u32(total as u32);
	for category in categories {
		writer.write_string(&category.name);
		writer.write_ba_u16(category.id);
		writer.write_ba_u8(u8::from(category.enabled));
		writer.write_ba_u32(category.feature_types.len() as u32);
		for feature_type in &category.feature_types {
			writer.write_ba_u32(i32::from(*feature_type) as u32);
		}
	}
}

/// Reads a category table written by [`save_categories`].
///
/// A category whose id also exists in `previous` takes the enabled state from there, so a
/// user's choice survives a description update.
pub(crate) fn load_categories(reader: &mut BitReader, previous: Option<&[TileCategory]>) -> Result<Vec<TileCategory>> {
	let count = reader.read_ba_u32().context("reading category count")?;
	let total = reader.read_ba_u32()?;
	ensure!(
		count as usize <= reader.bytes_left(),
		"category count {count} exceeds the remaining {} bytes",
		reader.bytes_left()
	);

	let mut categories = Vec::with_capacity(count as usize);
	let mut read_types = 0u32;
	for _ in 0..count {
		let name = reader.read_string()?;
		let id = reader.read_ba_u16()?;
		let mut enabled = reader.read_ba_u8()? != 0;
		let nbr_types = reader.read_ba_u32()?;
		ensure!(
			read_types.saturating_add(nbr_types) <= total,
			"category {id} has more types than announced"
		);
		read_types += nbr_types;
		let feature_types = (0..nbr_types)
			.map(|_| reader.read_ba_u32().map(|t| t as i32 as i16))
			.collect::<Result<Vec<_>>>()
			.with_context(|| format!("reading types of category {id}"))?;

		if let Some(old) = previous.and_then(|prev| prev.iter().find(|c| c.id == id)) {
			enabled = old.enabled;
		}
		categories.push(TileCategory {
			name,
			id,
			enabled,
			feature_types,
		});
	}
	Ok(categories)
}

/// Feature types of all disabled categories.
pub(crate) fn disabled_feature_types(categories: &[TileCategory]) -> BTreeSet<i16> {
	categories
		.iter()
		.filter(|c| !c.enabled)
		.flat_map(|c| c.feature_types.iter().copied())
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn categories() -> Vec<TileCategory> {
		vec![
			TileCategory::new("Restaurants", 3, true, vec![40, 41]),
			TileCategory::new("Petrol stations", 7, false, vec![52]),
			TileCategory::new("Hotels", 9, true, vec![]),
		]
	}

	fn round_trip(categories: &[TileCategory], previous: Option<&[TileCategory]>) -> Result<Vec<TileCategory>> {
		let mut writer = BitWriter::new();
		save_categories(&mut writer, categories);
		let data = writer.into_vec();
		load_categories(&mut BitReader::new(&data), previous)
	}

	#[test]
	fn save_and_load() -> Result<()> {
		assert_eq!(round_trip(&categories(), None)?, categories());
		Ok(())
	}

	#[test]
	fn enabled_state_is_inherited_by_id() -> Result<()> {
		let previous = vec![
			TileCategory::new("Restaurants (old name)", 3, false, vec![40]),
			TileCategory::new("Petrol stations", 7, true, vec![52]),
		];
		let loaded = round_trip(&categories(), Some(&previous))?;
		let enabled: Vec<bool> = loaded.iter().map(|c| c.enabled).collect();
		assert_eq!(enabled, vec![false, true, true]);
		assert_eq!(loaded[0].name, "Restaurants");
		Ok(())
	}

	#[test]
	fn disabled_types() {
		assert_eq!(disabled_feature_types(&categories()), BTreeSet::from([52]));
	}

	#[test]
	fn truncated_table_is_an_error() {
		let mut writer = BitWriter::new();
		save_categories(&mut writer, &categories());
		let data = writer.into_vec();
		assert!(load_categories(&mut BitReader::new(&data[..data.len() - 3]), None).is_err());
	}
}
