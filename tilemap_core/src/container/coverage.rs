use std::fmt::Display;

/// Coverage of a fully populated tile rectangle.
pub const FULL_COVERAGE: u16 = 32_767;

/// The storage tiers of the tile cache, in priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
	/// Tiles of the current view.
	Requested,
	/// Tiles the previous view requested. Only exists during an update.
	JustSuperseded,
	/// Tiles of older views kept as a fallback.
	Stale,
	/// Coarse tiles around the center.
	Reserve,
}

impl Tier {
	pub const ALL: [Tier; 4] = [Tier::Requested, Tier::JustSuperseded, Tier::Stale, Tier::Reserve];
}

impl Display for Tier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Tier::Requested => "requested",
			Tier::JustSuperseded => "just superseded",
			Tier::Stale => "stale",
			Tier::Reserve => "reserve",
		})
	}
}

/// `found` of `total` tiles on the `0..=FULL_COVERAGE` scale.
pub fn coverage_fraction(found: usize, total: usize) -> u16 {
	if total == 0 {
		return 0;
	}
	let fraction = found.min(total) as f64 / total as f64;
	(fraction * f64::from(FULL_COVERAGE)) as u16
}

/// Picks the tier to draw a key from.
///
/// `coverage` is indexed like [`Tier::ALL`]; `None` means the tier has no tiles for the
/// key. The first tier with full coverage wins. Without one the highest coverage wins,
/// ties going to the earlier tier.
pub fn select_best_tier(coverage: [Option<u16>; 4]) -> Tier {
	if let Some(position) = coverage.iter().position(|c| *c == Some(FULL_COVERAGE)) {
		return Tier::ALL[position];
	}
	let mut best = 0;
	for (position, value) in coverage.iter().enumerate().skip(1) {
		if *value > coverage[best] {
			best = position;
		}
	}
	Tier::ALL[best]
}
