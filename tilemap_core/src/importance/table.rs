//! This module defines the [`ImportanceTable`] of one layer.
//!
//! # Overview
//!
//! Notices are kept sorted by descending `max_scale`. The importances available at a scale
//! and detail level are the notices that apply to the detail level, counted from the top
//! until the first notice whose `max_scale` is below the scale. Importance `i` at detail
//! level `d` is the `i`-th notice applying to `d` in that order.
//!
//! Index lookups go through a dense matrix `detail level -> [notice]` built by
//! [`ImportanceTable::rebuild`]. [`ImportanceTable::load`] rebuilds it. After
//! [`ImportanceTable::insert`] the matrix is stale and lookups fall back to a linear scan
//! until the next rebuild.

use super::ImportanceNotice;
use crate::io::{BitReader, BitWriter};
use anyhow::{Context, Result, ensure};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportanceTable {
	notices: Vec<ImportanceNotice>,
	matrix: Vec<Vec<usize>>,
	stale: bool,
}

impl ImportanceTable {
	#[must_use]
	pub fn new() -> ImportanceTable {
		ImportanceTable::default()
	}

	/// Builds a table from notices in any order and rebuilds the matrix.
	pub fn from_notices(notices: impl IntoIterator<Item = ImportanceNotice>) -> ImportanceTable {
		let mut table = ImportanceTable::new();
		for notice in notices {
			table.insert(notice);
		}
		table.rebuild();
		table
	}

	/// Adds a notice after all notices with the same or a larger `max_scale`.
	///
	/// Marks the lookup matrix as stale.
	pub fn insert(&mut self, notice: ImportanceNotice) {
		let position = self.notices.partition_point(|n| n.max_scale >= notice.max_scale);
		self.notices.insert(position, notice);
		self.stale = true;
	}

	/// Recomputes the `detail level -> importance` matrix from the notices.
	pub fn rebuild(&mut self) {
		let detail_levels = self.notices.iter().map(|n| n.detail_level + 1).max().unwrap_or(0);
		self.matrix = (0..detail_levels)
			.map(|detail| {
				self
					.notices
					.iter()
					.enumerate()
					.filter(|(_, notice)| notice.applies_to(detail))
					.map(|(index, _)| index)
					.collect()
			})
			.collect();
		self.stale = false;
		log::trace!("rebuilt importance matrix for {} detail levels", self.matrix.len());
	}

	pub fn is_stale(&self) -> bool {
		self.stale
	}

	/// Number of importances to fetch at `scale` and `detail_level`.
	pub fn nbr_importances(&self, scale: u16, detail_level: u32) -> usize {
		self
			.notices
			.iter()
			.take_while(|notice| notice.max_scale >= scale)
			.filter(|notice| notice.applies_to(detail_level))
			.count()
	}

	/// The notice of importance `index` at `detail_level`.
	pub fn importance(&self, index: usize, detail_level: u32) -> Option<&ImportanceNotice> {
		if self.stale {
			return self.importance_by_scan(index, detail_level);
		}
		let row = self.matrix.get(detail_level as usize)?;
		row.get(index).and_then(|i| self.notices.get(*i))
	}

	/// Linear scan equivalent of [`ImportanceTable::importance`].
	pub fn importance_by_scan(&self, index: usize, detail_level: u32) -> Option<&ImportanceNotice> {
		self.notices.iter().filter(|notice| notice.applies_to(detail_level)).nth(index)
	}

	pub fn is_valid_importance(&self, index: usize, detail_level: u32) -> bool {
		if self.stale {
			return self.importance_by_scan(index, detail_level).is_some()
				&& self.notices.iter().any(|n| n.detail_level >= detail_level);
		}
		self.matrix.get(detail_level as usize).is_some_and(|row| index < row.len())
	}

	/// First notice for `feature_type` in table order.
	pub fn first_of_type(&self, feature_type: u16) -> Option<&ImportanceNotice> {
		self.notices.iter().find(|notice| notice.feature_type == feature_type)
	}

	pub fn iter(&self) -> impl Iterator<Item = &ImportanceNotice> {
		self.notices.iter()
	}

	pub fn len(&self) -> usize {
		self.notices.len()
	}

	pub fn is_empty(&self) -> bool {
		self.notices.is_empty()
	}

	pub fn save(&self, writer: &mut BitWriter) -> Result<()> {
		ensure!(self.notices.len() <= usize::from(u16::MAX), "too many importance notices");
		writer.write_ba_u16(self.notices.len() as u16);
		for notice in &self.notices {
			ensure!(notice.detail_level <= u32::from(u8::MAX), "detail level {} does not fit", notice.detail_level);
			writer.write_ba_u16(notice.max_scale);
			writer.write_ba_u16(notice.feature_type);
			writer.write_ba_u32(notice.threshold.unwrap_or(u32::MAX));
			writer.write_ba_u8(notice.detail_level as u8);
		}
		Ok(())
	}

	pub fn load(reader: &mut BitReader) -> Result<ImportanceTable> {
		let count = reader.read_ba_u16().context("reading importance count")?;
		let mut table = ImportanceTable::new();
		for _ in 0..count {
			let max_scale = reader.read_ba_u16()?;
			let feature_type = reader.read_ba_u16()?;
			let threshold = reader.read_ba_u32()?;
			let detail_level = u32::from(reader.read_ba_u8()?);
			table.insert(ImportanceNotice::new(
				detail_level,
				max_scale,
				feature_type,
				(threshold != u32::MAX).then_some(threshold),
			));
		}
		table.rebuild();
		Ok(table)
	}
}
