use crate::Blob;
use anyhow::{Context, Result};
use flate2::Crc;
use flate2::bufread::{GzDecoder, GzEncoder};
use std::io::Read;

/// Compresses data using Gzip at the best compression level.
///
/// # Errors
///
/// * If the Gzip compression process fails.
pub fn compress_gzip(blob: &Blob) -> Result<Blob> {
	let mut encoder = GzEncoder::new(blob.as_slice(), flate2::Compression::best());
	let mut compressed_data = Vec::new();
	encoder
		.read_to_end(&mut compressed_data)
		.context("Failed to compress data using Gzip")?;
	Ok(Blob::from(compressed_data))
}

/// Decompresses data that was compressed using Gzip.
///
/// # Errors
///
/// * If the input is not a valid Gzip stream.
pub fn decompress_gzip(blob: &Blob) -> Result<Blob> {
	let mut decoder = GzDecoder::new(blob.as_slice());
	let mut decompressed_data = Vec::new();
	decoder
		.read_to_end(&mut decompressed_data)
		.context("Failed to decompress data using Gzip")?;
	Ok(Blob::from(decompressed_data))
}

/// Gzips `blob` and keeps the compressed form only if it is strictly smaller.
pub fn compress_if_smaller(blob: Blob) -> Result<Blob> {
	let compressed = compress_gzip(&blob)?;
	if compressed.len() < blob.len() {
		Ok(compressed)
	} else {
		Ok(blob)
	}
}

/// Undoes [`compress_if_smaller`]: buffers starting with the gzip magic are inflated,
/// everything else is returned as is.
pub fn decompress_if_gzip(blob: Blob) -> Result<Blob> {
	if blob.is_gzip() {
		decompress_gzip(&blob)
	} else {
		Ok(blob)
	}
}

/// Standard CRC-32 (IEEE, as used by gzip and zip) of `data`.
pub fn crc32(data: &[u8]) -> u32 {
	let mut crc = Crc::new();
	crc.update(data);
	crc.sum()
}
