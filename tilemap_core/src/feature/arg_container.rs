use super::FeatureArg;
use crate::io::{BitReader, BitWriter};
use anyhow::{Context, Result, ensure};

/// An indexed list of complete arguments, deduplicated on insertion.
///
/// Used for the default arguments of primitives in the format description and as the
/// header of data tiles. On the wire: align, BA u16 count, then every argument in its
/// full form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArgContainer {
	args: Vec<FeatureArg>,
}

impl ArgContainer {
	#[must_use]
	pub fn new() -> ArgContainer {
		ArgContainer::default()
	}

	/// Adds `arg` and returns its index. An equal argument already present is reused.
	pub fn add_arg(&mut self, arg: FeatureArg) -> usize {
		if let Some(index) = self.args.iter().position(|a| *a == arg) {
			return index;
		}
		self.args.push(arg);
		self.args.len() - 1
	}

	pub fn get(&self, index: usize) -> Option<&FeatureArg> {
		self.args.get(index)
	}

	pub fn index_of(&self, arg: &FeatureArg) -> Option<usize> {
		self.args.iter().position(|a| a == arg)
	}

	pub fn iter(&self) -> impl Iterator<Item = &FeatureArg> {
		self.args.iter()
	}

	pub fn len(&self) -> usize {
		self.args.len()
	}

	pub fn is_empty(&self) -> bool {
		self.args.is_empty()
	}

	pub fn save(&self, writer: &mut BitWriter) -> Result<()> {
		ensure!(self.args.len() <= usize::from(u16::MAX), "too many arguments: {}", self.args.len());
		writer.write_ba_u16(self.args.len() as u16);
		for arg in &self.args {
			arg.save_full(writer)?;
		}
		Ok(())
	}

	pub fn load(reader: &mut BitReader) -> Result<ArgContainer> {
		let count = reader.read_ba_u16().context("reading argument count")?;
		let args = (0..count)
			.map(|i| FeatureArg::load_full(reader).with_context(|| format!("reading argument {i} of {count}")))
			.collect::<Result<Vec<_>>>()?;
		Ok(ArgContainer { args })
	}
}

#[cfg(test)]
mod tests {
	use super::super::arg_name::{COLOR, IMAGE_NAME, WIDTH};
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn deduplicates() {
		let mut container = ArgContainer::new();
		assert_eq!(container.add_arg(FeatureArg::simple(COLOR, 24, 1)), 0);
		assert_eq!(container.add_arg(FeatureArg::simple(WIDTH, 4, 3)), 1);
		assert_eq!(container.add_arg(FeatureArg::simple(COLOR, 24, 1)), 0);
		assert_eq!(container.add_arg(FeatureArg::simple(COLOR, 24, 2)), 2);
		assert_eq!(container.len(), 3);
	}

	#[test]
	fn save_and_load() -> Result<()> {
		let mut container = ArgContainer::new();
		container.add_arg(FeatureArg::simple(COLOR, 24, 0x0012_3456));
		container.add_arg(FeatureArg::text(IMAGE_NAME, "hotel"));

		let mut writer = BitWriter::new();
		writer.write_bits(1, 3);
		container.save(&mut writer)?;
		assert_eq!(&writer.as_slice()[1..3], &[0, 2]);

		let data = writer.into_vec();
		let mut reader = BitReader::new(&data);
		reader.read_bits(3)?;
		assert_eq!(ArgContainer::load(&mut reader)?, container);
		Ok(())
	}

	#[test]
	fn empty_container_is_two_bytes() -> Result<()> {
		let mut writer = BitWriter::new();
		ArgContainer::new().save(&mut writer)?;
		assert_eq!(writer.as_slice(), &[0, 0]);
		Ok(())
	}
}
