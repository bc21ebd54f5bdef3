//! This module provides the `BitWriter`, the writing half of the bit codec.
//!
//! # Overview
//!
//! Values of 0 to 32 bits are packed MSB-first into a growing byte buffer. Byte-aligned
//! helpers (the "BA" family) align the cursor first and then append big-endian integers,
//! NUL-terminated strings or raw bytes. Every writer call has a matching `BitReader` call;
//! tile and schema formats rely on save and load walking the same sequence of widths.
//!
//! # Examples
//!
//! ```rust
//! use tilemap_core::io::{BitReader, BitWriter};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let mut writer = BitWriter::new();
//!     writer.write_bits(5, 3);
//!     writer.write_ba_u16(0x1234);
//!     assert_eq!(writer.as_slice(), &[0b1010_0000, 0x12, 0x34]);
//!
//!     let data = writer.into_vec();
//!     let mut reader = BitReader::new(&data);
//!     assert_eq!(reader.read_bits(3)?, 5);
//!     assert_eq!(reader.read_ba_u16()?, 0x1234);
//!     Ok(())
//! }
//! ```

use crate::Blob;
use byteorder::{BigEndian, ByteOrder};

/// Packs bit fields and byte-aligned values into an in-memory buffer.
#[derive(Clone, Debug, Default)]
pub struct BitWriter {
	bytes: Vec<u8>,
	bit_pos: usize,
}

impl BitWriter {
	#[must_use]
	pub fn new() -> BitWriter {
		BitWriter::default()
	}

	/// Writes the lowest `nbr_bits` bits of `value`, most significant bit first.
	///
	/// Higher bits of `value` are ignored, so negative numbers can be written by casting
	/// them to `u32`. Writing 0 bits does nothing.
	///
	/// # Arguments
	/// * `value` - The value to write.
	/// * `nbr_bits` - Field width, 0 to 32.
	pub fn write_bits(&mut self, value: u32, nbr_bits: u32) {
		debug_assert!(nbr_bits <= 32, "field width {nbr_bits} is larger than 32");
		let value = u64::from(value);
		let mut remaining = nbr_bits.min(32);
		while remaining > 0 {
			let used = (self.bit_pos % 8) as u32;
			if used == 0 {
				self.bytes.push(0);
			}
			let free = 8 - used;
			let take = free.min(remaining);
			let chunk = ((value >> (remaining - take)) & ((1u64 << take) - 1)) as u8;
			if let Some(last) = self.bytes.last_mut() {
				*last |= chunk << (free - take);
			}
			self.bit_pos += take as usize;
			remaining -= take;
		}
	}

	/// Writes a signed value in two's complement using `nbr_bits` bits.
	pub fn write_signed_bits(&mut self, value: i32, nbr_bits: u32) {
		self.write_bits(value as u32, nbr_bits);
	}

	/// Writes a single flag bit.
	pub fn write_bool(&mut self, value: bool) {
		self.write_bits(u32::from(value), 1);
	}

	/// Skips to the next byte boundary. The skipped bits stay zero.
	pub fn align_to_byte(&mut self) {
		self.bit_pos = self.bytes.len() * 8;
	}

	pub fn write_ba_u8(&mut self, value: u8) {
		self.align_to_byte();
		self.push_bytes(&[value]);
	}

	pub fn write_ba_u16(&mut self, value: u16) {
		let mut tmp = [0u8; 2];
		BigEndian::write_u16(&mut tmp, value);
		self.align_to_byte();
		self.push_bytes(&tmp);
	}

	pub fn write_ba_i16(&mut self, value: i16) {
		self.write_ba_u16(value as u16);
	}

	pub fn write_ba_u32(&mut self, value: u32) {
		let mut tmp = [0u8; 4];
		BigEndian::write_u32(&mut tmp, value);
		self.align_to_byte();
		self.push_bytes(&tmp);
	}

	/// Writes a NUL-terminated string starting at the next byte boundary.
	///
	/// Embedded NUL characters would truncate the string on reading and are dropped.
	pub fn write_string(&mut self, text: &str) {
		self.align_to_byte();
		let bytes: Vec<u8> = text.bytes().filter(|b| *b != 0).collect();
		self.push_bytes(&bytes);
		self.push_bytes(&[0]);
	}

	/// Appends raw bytes starting at the next byte boundary.
	pub fn write_bytes(&mut self, bytes: &[u8]) {
		self.align_to_byte();
		self.push_bytes(bytes);
	}

	fn push_bytes(&mut self, bytes: &[u8]) {
		self.bytes.extend_from_slice(bytes);
		self.bit_pos = self.bytes.len() * 8;
	}

	/// Returns the number of bits written so far, including alignment padding.
	pub fn current_bit_offset(&self) -> usize {
		self.bit_pos
	}

	/// Returns the number of bytes touched so far.
	pub fn byte_len(&self) -> usize {
		self.bytes.len()
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.bytes
	}

	pub fn into_vec(self) -> Vec<u8> {
		self.bytes
	}

	pub fn into_blob(self) -> Blob {
		Blob::from(self.bytes)
	}
}
