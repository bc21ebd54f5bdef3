//! This module provides the [`Blob`] struct, the owned byte buffer that travels through the
//! buffer request chain and into the tile decoder.
//!
//! # Examples
//!
//! ```rust
//! use tilemap_core::Blob;
//!
//! let blob = Blob::from(vec![0x1f, 0x8b, 8, 0]);
//! assert_eq!(blob.len(), 4);
//! assert!(blob.is_gzip());
//! assert_eq!(blob.as_hex(), "1f 8b 08 00");
//! ```

use anyhow::{Context, Result};
use std::fmt::Debug;
use std::path::Path;

/// An owned byte buffer as handed out by a `DBufRequester`.
///
/// Ownership is the contract: whoever holds a `Blob` obtained from
/// `request_cached` hands it back with `release` when done.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
	#[must_use]
	pub fn new_empty() -> Blob {
		Blob(Vec::new())
	}

	/// Creates a zero-filled `Blob` of `length` bytes.
	#[must_use]
	pub fn new_sized(length: usize) -> Blob {
		Blob(vec![0u8; length])
	}

	#[must_use]
	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}

	#[must_use]
	pub fn into_vec(self) -> Vec<u8> {
		self.0
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns `true` if the buffer starts with the gzip magic bytes `1F 8B`.
	#[must_use]
	pub fn is_gzip(&self) -> bool {
		self.0.starts_with(&[0x1f, 0x8b])
	}

	/// Space separated lowercase hex dump, used in log lines and the CLI.
	#[must_use]
	pub fn as_hex(&self) -> String {
		self
			.0
			.iter()
			.map(|byte| format!("{byte:02x}"))
			.collect::<Vec<_>>()
			.join(" ")
	}

	pub fn save_to_file(&self, path: &Path) -> Result<()> {
		std::fs::write(path, &self.0).with_context(|| format!("Failed to write {path:?}"))
	}

	pub fn load_from_file(path: &Path) -> Result<Self> {
		let data = std::fs::read(path).with_context(|| format!("Failed to read {path:?}"))?;
		Ok(Blob::from(data))
	}
}

impl From<Vec<u8>> for Blob {
	fn from(item: Vec<u8>) -> Self {
		Blob(item)
	}
}

impl From<&[u8]> for Blob {
	fn from(item: &[u8]) -> Self {
		Blob(item.to_vec())
	}
}

impl<const N: usize> From<&[u8; N]> for Blob {
	fn from(item: &[u8; N]) -> Self {
		Blob(item.to_vec())
	}
}

impl From<&str> for Blob {
	fn from(item: &str) -> Self {
		Blob(item.as_bytes().to_vec())
	}
}

impl Debug for Blob {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.0.len() <= 16 {
			write!(f, "Blob({}): {}", self.0.len(), self.as_hex())
		} else {
			let head = Blob::from(&self.0[..16]);
			write!(f, "Blob({}): {} ...", self.0.len(), head.as_hex())
		}
	}
}
