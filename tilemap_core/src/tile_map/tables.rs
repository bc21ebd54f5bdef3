use crate::io::{BitReader, BitWriter, nbr_bits};
use anyhow::{Context, Result, ensure};

/// A string attached to a feature beyond its name, e.g. an address or an event time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedString {
	pub feature_idx: u32,
	pub string_type: u16,
	pub text: String,
}

/// Membership of a feature in a POI category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureCategory {
	pub feature_idx: u32,
	pub category_id: u32,
}

fn ensure_width(bits: u32, what: &str) -> Result<u32> {
	ensure!(bits <= 15, "{what} needs {bits} bits, at most 15 fit");
	Ok(bits)
}

/// Align, BA u32 reserved, a presence bit, then 4-bit size width, 4-bit id width, the count
/// and `(feature index, category id)` pairs.
pub(super) fn save_feature_categories(writer: &mut BitWriter, categories: &[FeatureCategory], feature_bits: u32) -> Result<()> {
	writer.align_to_byte();
	writer.write_ba_u32(0);
	writer.write_bool(!categories.is_empty());
	if categories.is_empty() {
		return Ok(());
	}
	let size_bits = ensure_width(nbr_bits(categories.len() as u32), "category count")?;
	let max_id = categories.iter().map(|c| c.category_id).max().unwrap_or(0);
	let id_bits = ensure_width(nbr_bits(max_id), "category id")?;
	writer.write_bits(size_bits, 4);
	writer.write_bits(id_bits, 4);
	writer.write_bits(categories.len() as u32, size_bits);
	for category in categories {
		writer.write_bits(category.feature_idx, feature_bits);
		writer.write_bits(category.category_id, id_bits);
	}
	Ok(())
}

pub(super) fn load_feature_categories(reader: &mut BitReader, feature_bits: u32) -> Result<Vec<FeatureCategory>> {
	reader.align_to_byte();
	reader.read_ba_u32().context("reading reserved category word")?;
	if !reader.read_bool()? {
		return Ok(Vec::new());
	}
	let size_bits = reader.read_bits(4)?;
	let id_bits = reader.read_bits(4)?;
	let count = reader.read_bits(size_bits)?;
	(0..count)
		.map(|_| {
			Ok(FeatureCategory {
				feature_idx: reader.read_bits(feature_bits)?,
				category_id: reader.read_bits(id_bits)?,
			})
		})
		.collect::<Result<Vec<_>>>()
		.context("reading feature categories")
}

/// A presence bit, then 4-bit type width, 4-bit size width and the count. Each entry holds
/// a "same feature as before" bit (not for the first entry), the feature index if it
/// changed, the type and the index of its text in the string table, counted from
/// `first_str_idx`.
pub(super) fn save_extended_strings(
	writer: &mut BitWriter,
	strings: &[ExtendedString],
	feature_bits: u32,
	str_bits: u32,
	first_str_idx: u32,
) -> Result<()> {
	writer.write_bool(!strings.is_empty());
	if strings.is_empty() {
		return Ok(());
	}
	let max_type = strings.iter().map(|s| u32::from(s.string_type)).max().unwrap_or(0);
	let type_bits = ensure_width(nbr_bits(max_type).max(1), "extended string type")?;
	let size_bits = ensure_width(nbr_bits(strings.len() as u32), "extended string count")?;
	writer.write_bits(type_bits, 4);
	writer.write_bits(size_bits, 4);
	writer.write_bits(strings.len() as u32, size_bits);

	let mut prev_feature = None;
	for (str_idx, string) in (first_str_idx..).zip(strings) {
		match prev_feature {
			None => writer.write_bits(string.feature_idx, feature_bits),
			Some(prev) if prev == string.feature_idx => writer.write_bool(true),
			Some(_) => {
				writer.write_bool(false);
				writer.write_bits(string.feature_idx, feature_bits);
			}
		}
		prev_feature = Some(string.feature_idx);
		writer.write_bits(u32::from(string.string_type), type_bits);
		writer.write_bits(str_idx, str_bits);
	}
	Ok(())
}

/// Reads the table written by [`save_extended_strings`], resolving texts in `strings`.
pub(super) fn load_extended_strings(
	reader: &mut BitReader,
	strings: &[String],
	feature_bits: u32,
	str_bits: u32,
) -> Result<Vec<ExtendedString>> {
	if !reader.read_bool()? {
		return Ok(Vec::new());
	}
	let type_bits = reader.read_bits(4)?;
	let size_bits = reader.read_bits(4)?;
	let count = reader.read_bits(size_bits)?;

	let mut table = Vec::with_capacity(count as usize);
	let mut feature_idx = 0;
	for i in 0..count {
		if i == 0 || !reader.read_bool()? {
			feature_idx = reader.read_bits(feature_bits)?;
		}
		let string_type = reader.read_bits(type_bits)? as u16;
		let str_idx = reader.read_bits(str_bits)?;
		let text = strings
			.get(str_idx as usize)
			.with_context(|| format!("extended string {i} refers to missing string {str_idx}"))?;
		table.push(ExtendedString {
			feature_idx,
			string_type,
			text: text.clone(),
		});
	}
	Ok(table)
}
