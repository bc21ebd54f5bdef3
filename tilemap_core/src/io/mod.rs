//! The bit codec: a `BitWriter` and a `BitReader` sharing one wire convention.
//!
//! Fields are packed MSB-first, byte-aligned values are big-endian and strings are
//! NUL-terminated. Tiles, tile features and the format description are all written
//! and read through these two types.

mod bit_reader;
mod bit_writer;

pub use bit_reader::*;
pub use bit_writer::*;

/// Returns the number of bits needed to store `value` as an unsigned field.
///
/// `nbr_bits(0) == 0`, `nbr_bits(1) == 1`, `nbr_bits(255) == 8`, `nbr_bits(256) == 9`.
pub fn nbr_bits(value: u32) -> u32 {
	32 - value.leading_zeros()
}

/// Returns the number of bits needed for a signed field whose magnitude stays below
/// or at `magnitude` (one extra bit for the sign).
pub fn nbr_bits_signed(magnitude: u32) -> u32 {
	nbr_bits(magnitude) + 1
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(0, 0)]
	#[case(1, 1)]
	#[case(2, 2)]
	#[case(7, 3)]
	#[case(8, 4)]
	#[case(255, 8)]
	#[case(256, 9)]
	#[case(u32::MAX, 32)]
	fn unsigned_widths(#[case] value: u32, #[case] expected: u32) {
		assert_eq!(nbr_bits(value), expected);
	}

	#[test]
	fn signed_width_holds_both_extremes() {
		for magnitude in [0u32, 1, 5, 127, 128, 1000, 16383] {
			let bits = nbr_bits_signed(magnitude);
			let max = (1i64 << (bits - 1)) - 1;
			let min = -(1i64 << (bits - 1));
			assert!(i64::from(magnitude) <= max, "{magnitude} in {bits} bits");
			assert!(-i64::from(magnitude) >= min);
		}
	}
}
