use std::fmt::Debug;

/// One row of an importance table.
///
/// A notice makes features of `feature_type` visible up to `max_scale`. With a threshold it
/// only applies to its own `detail_level` and keeps features covering at least `threshold`
/// square pixels; without one it applies to every detail level.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImportanceNotice {
	pub detail_level: u32,
	pub max_scale: u16,
	pub feature_type: u16,
	pub threshold: Option<u32>,
}

impl ImportanceNotice {
	pub fn new(detail_level: u32, max_scale: u16, feature_type: u16, threshold: Option<u32>) -> ImportanceNotice {
		ImportanceNotice {
			detail_level,
			max_scale,
			feature_type,
			threshold,
		}
	}

	/// Returns `true` if this notice counts as an importance at `detail_level`.
	pub fn applies_to(&self, detail_level: u32) -> bool {
		self.threshold.is_none() || self.detail_level == detail_level
	}

	/// Key used to tell importance ranges apart in the tile cache: the type in the low
	/// 16 bits, the threshold (if it fits) above.
	pub fn signature(&self) -> u32 {
		match self.threshold {
			Some(threshold) if threshold < u32::from(u16::MAX) => u32::from(self.feature_type) | (threshold << 16),
			_ => u32::from(self.feature_type),
		}
	}
}

impl Debug for ImportanceNotice {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"ImportanceNotice(detail {}, max_scale {}, type {}, threshold {:?})",
			self.detail_level, self.max_scale, self.feature_type, self.threshold
		)
	}
}
