//! Runtime settings for the buffer cache, the garbage collector and description defaults.

use std::sync::Arc;

/// Tunables shared by the cache subsystem.
///
/// Create one, adjust the fields and share it with [`Config::arc`].
#[derive(Clone, Debug)]
pub struct Config {
	/// Byte budget of a `MemoryDBufRequester`.
	pub buffer_budget: usize,
	/// Fixed bookkeeping cost charged per cached buffer on top of key and payload.
	pub entry_overhead: usize,
	/// Byte budget of a `FileDBufRequester`, spread over its cache files.
	pub disk_budget: u64,
	/// Number of cache files a `FileDBufRequester` rotates through.
	pub disk_files: usize,
	/// Whether a `FileDBufRequester` starts empty instead of reading back its files.
	pub clear_disk_on_startup: bool,
	/// Below this many free bytes the garbage collector destroys tiles synchronously.
	pub min_free_memory: usize,
	/// Below this largest free block the garbage collector destroys tiles synchronously.
	pub min_largest_block: usize,
	/// Reserve detail level for descriptions that do not carry one.
	pub reserve_detail: u32,
	/// Extra reserve tiles around the center for descriptions that do not carry them.
	pub reserve_extra_tiles: u32,
	/// Copyright line for descriptions that do not carry one.
	pub default_copyright: String,
}

impl Config {
	pub fn arc(self) -> Arc<Self> {
		Arc::new(self)
	}
}

impl Default for Config {
	fn default() -> Self {
		Self {
			buffer_budget: 2 * 1024 * 1024,
			entry_overhead: 64,
			disk_budget: 10 * 1024 * 1024,
			disk_files: 8,
			clear_disk_on_startup: false,
			min_free_memory: 512 * 1024,
			min_largest_block: 128 * 1024,
			reserve_detail: 6,
			reserve_extra_tiles: 3,
			default_copyright: String::from("©2010"),
		}
	}
}
