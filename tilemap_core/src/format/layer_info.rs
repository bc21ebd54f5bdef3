use crate::io::{BitReader, BitWriter};
use anyhow::{Context, Result, ensure};

const FLAG_VISIBLE: u8 = 1;
const FLAG_TRANSIENT: u8 = 2;
const FLAG_OPTIONAL: u8 = 4;

/// What a viewer needs to know about a layer beyond its tile pyramid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerInfo {
	pub id: u32,
	pub name: String,
	/// Shown when the viewer starts.
	pub visible: bool,
	/// Tiles go stale quickly and must not be cached on disk.
	pub transient: bool,
	/// The user may switch the layer off.
	pub optional: bool,
	/// Minutes between refreshes, 0 for never.
	pub update_period_minutes: u32,
}

impl LayerInfo {
	/// Plain visible layer, as assumed for descriptions without extended layer info.
	pub fn basic(id: u32, name: &str) -> LayerInfo {
		LayerInfo {
			id,
			name: name.to_string(),
			visible: true,
			transient: false,
			optional: false,
			update_period_minutes: 0,
		}
	}

	fn flags(&self) -> u8 {
		let mut flags = 0;
		if self.visible {
			flags |= FLAG_VISIBLE;
		}
		if self.transient {
			flags |= FLAG_TRANSIENT;
		}
		if self.optional {
			flags |= FLAG_OPTIONAL;
		}
		flags
	}
}

pub(crate) fn save_layer_infos(writer: &mut BitWriter, infos: &[LayerInfo]) -> Result<()> {
	writer.write_ba_u32(infos.len() as u32);
	for info in infos {
		ensure!(info.id <= u32::from(u8::MAX), "layer id {} does not fit", info.id);
		writer.write_ba_u8(info.id as u8);
		writer.write_string(&info.name);
		writer.write_ba_u8(info.flags());
		writer.write_ba_u32(info.update_period_minutes);
	}
	Ok(())
}

pub(crate) fn load_layer_infos(reader: &mut BitReader) -> Result<Vec<LayerInfo>> {
	let count = reader.read_ba_u32().context("reading layer info count")?;
	ensure!(count <= 16, "{count} layer infos, at most 16 layers exist");
	(0..count)
		.map(|_| {
			let id = u32::from(reader.read_ba_u8()?);
			let name = reader.read_string()?;
			let flags = reader.read_ba_u8()?;
			let update_period_minutes = reader.read_ba_u32()?;
			Ok(LayerInfo {
				id,
				name,
				visible: flags & FLAG_VISIBLE != 0,
				transient: flags & FLAG_TRANSIENT != 0,
				optional: flags & FLAG_OPTIONAL != 0,
				update_period_minutes,
			})
		})
		.collect()
}
