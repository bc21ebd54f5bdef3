//! This module defines the `BitReader`, the reading half of the bit codec.
//!
//! # Overview
//!
//! A `BitReader` walks a borrowed byte slice with a bit cursor. Bit fields of 0 to 32 bits
//! are read MSB-first; the byte-aligned ("BA") helpers first move the cursor to the next
//! byte boundary and then decode big-endian integers or NUL-terminated strings.
//!
//! Reading past the end of the slice is reported as an error instead of producing
//! garbage, so truncated tiles and schema blobs surface with context at the call site.
//!
//! # Examples
//!
//! ```rust
//! use tilemap_core::io::BitReader;
//!
//! fn main() -> anyhow::Result<()> {
//!     let data = [0b1110_0000, 0x00, 0x2A];
//!     let mut reader = BitReader::new(&data);
//!     assert_eq!(reader.read_signed_bits(3)?, -1);
//!     assert_eq!(reader.read_ba_u16()?, 42);
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result, bail, ensure};
use byteorder::{BigEndian, ByteOrder};

/// Reads bit fields and byte-aligned values from a byte slice.
#[derive(Clone, Debug)]
pub struct BitReader<'a> {
	data: &'a [u8],
	bit_pos: usize,
}

impl<'a> BitReader<'a> {
	#[must_use]
	pub fn new(data: &'a [u8]) -> BitReader<'a> {
		BitReader { data, bit_pos: 0 }
	}

	/// Reads an unsigned field of `nbr_bits` bits (0 to 32).
	///
	/// # Errors
	/// Returns an error if fewer than `nbr_bits` bits remain.
	pub fn read_bits(&mut self, nbr_bits: u32) -> Result<u32> {
		ensure!(nbr_bits <= 32, "field width {nbr_bits} is larger than 32");
		if self.bits_left() < nbr_bits as usize {
			bail!(
				"bit buffer exhausted: need {nbr_bits} bits at offset {}, {} left",
				self.bit_pos,
				self.bits_left()
			);
		}
		let mut value: u64 = 0;
		let mut remaining = nbr_bits;
		while remaining > 0 {
			let byte = self.data[self.bit_pos / 8];
			let used = (self.bit_pos % 8) as u32;
			let avail = 8 - used;
			let take = avail.min(remaining);
			let chunk = (u64::from(byte) >> (avail - take)) & ((1u64 << take) - 1);
			value = (value << take) | chunk;
			self.bit_pos += take as usize;
			remaining -= take;
		}
		Ok(value as u32)
	}

	/// Reads a two's complement field of `nbr_bits` bits and sign-extends it.
	///
	/// A width of 0 yields 0.
	pub fn read_signed_bits(&mut self, nbr_bits: u32) -> Result<i32> {
		let value = self.read_bits(nbr_bits)?;
		Ok(sign_extend(value, nbr_bits))
	}

	pub fn read_bool(&mut self) -> Result<bool> {
		Ok(self.read_bits(1)? != 0)
	}

	/// Moves the cursor to the next byte boundary.
	pub fn align_to_byte(&mut self) {
		self.bit_pos = self.bit_pos.div_ceil(8) * 8;
	}

	fn take_aligned(&mut self, length: usize) -> Result<&'a [u8]> {
		self.align_to_byte();
		let start = self.bit_pos / 8;
		let end = start + length;
		let slice = self
			.data
			.get(start..end)
			.with_context(|| format!("need {length} bytes at byte offset {start}, buffer has {}", self.data.len()))?;
		self.bit_pos = end * 8;
		Ok(slice)
	}

	pub fn read_ba_u8(&mut self) -> Result<u8> {
		Ok(self.take_aligned(1)?[0])
	}

	pub fn read_ba_u16(&mut self) -> Result<u16> {
		Ok(BigEndian::read_u16(self.take_aligned(2)?))
	}

	pub fn read_ba_i16(&mut self) -> Result<i16> {
		Ok(BigEndian::read_i16(self.take_aligned(2)?))
	}

	pub fn read_ba_u32(&mut self) -> Result<u32> {
		Ok(BigEndian::read_u32(self.take_aligned(4)?))
	}

	/// Reads a NUL-terminated string starting at the next byte boundary.
	///
	/// Invalid UTF-8 sequences are replaced, the terminating NUL is consumed.
	pub fn read_string(&mut self) -> Result<String> {
		self.align_to_byte();
		let start = self.bit_pos / 8;
		let rest = self.data.get(start..).unwrap_or_default();
		let Some(length) = rest.iter().position(|b| *b == 0) else {
			bail!("unterminated string at byte offset {start}");
		};
		let text = String::from_utf8_lossy(&rest[..length]).into_owned();
		self.bit_pos = (start + length + 1) * 8;
		Ok(text)
	}

	/// Returns `length` raw bytes starting at the next byte boundary.
	pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
		self.take_aligned(length)
	}

	/// Returns the remaining bytes counted from the next byte boundary.
	pub fn bytes_left(&self) -> usize {
		self.data.len().saturating_sub(self.bit_pos.div_ceil(8))
	}

	pub fn bits_left(&self) -> usize {
		(self.data.len() * 8).saturating_sub(self.bit_pos)
	}

	pub fn current_bit_offset(&self) -> usize {
		self.bit_pos
	}

	/// Returns the byte offset of the cursor, rounded up to whole bytes.
	pub fn byte_offset(&self) -> usize {
		self.bit_pos.div_ceil(8)
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}
}

/// Sign-extends the lowest `nbr_bits` bits of `value`.
pub fn sign_extend(value: u32, nbr_bits: u32) -> i32 {
	match nbr_bits {
		0 => 0,
		32.. => value as i32,
		_ => {
			let shift = 32 - nbr_bits;
			((value << shift) as i32) >> shift
		}
	}
}
