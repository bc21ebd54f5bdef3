//! A buffer cache on disk that survives restarts.
//!
//! Buffers are appended to a ring of cache files inside one directory. Every file starts
//! with a big-endian `u64` generation, followed by records:
//!
//! | field      | size              |
//! |------------|-------------------|
//! | key length | `u16`, big-endian |
//! | key        | UTF-8 bytes       |
//! | length     | `u32`, big-endian |
//! | buffer     | `length` bytes    |
//!
//! When the current file would grow past its share of the budget, writing moves on to
//! the next file in the ring, which is emptied first. Eviction therefore drops the
//! oldest file as a whole. Reopening a directory reads the files back oldest first, so
//! the newest record for a key wins. A damaged tail is cut off.

use super::{DBufRequester, ExternalSource};
use crate::{Blob, Config};
use anyhow::{Context, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const HEADER_SIZE: u64 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
	file: usize,
	offset: u64,
	len: u32,
}

/// A requester that keeps released buffers in files, up to a byte budget.
///
/// Usually the parent of a [`MemoryDBufRequester`](super::MemoryDBufRequester): buffers
/// evicted from memory land here and come back on the next request.
pub struct FileDBufRequester {
	dir: PathBuf,
	sizes: Vec<u64>,
	generations: Vec<u64>,
	generation: u64,
	current: usize,
	index: HashMap<String, Entry>,
	max_size: u64,
	parent: Option<Box<dyn DBufRequester>>,
	source: Option<Box<dyn ExternalSource>>,
}

impl FileDBufRequester {
	/// Opens the cache in `dir`, creating the directory if needed, and reads back the
	/// buffers a previous session left there.
	pub fn open(dir: &Path, max_size: u64, nbr_files: usize) -> Result<FileDBufRequester> {
		create_dir_all(dir).with_context(|| format!("creating buffer directory {dir:?}"))?;
		let nbr_files = nbr_files.max(1);
		let mut requester = FileDBufRequester {
			dir: dir.to_path_buf(),
			sizes: vec![0; nbr_files],
			generations: vec![0; nbr_files],
			generation: 0,
			current: 0,
			index: HashMap::new(),
			max_size,
			parent: None,
			source: None,
		};
		requester.read_back()?;
		requester.set_max_size(max_size)?;
		log::debug!(
			"opened buffer directory {dir:?} with {} buffers in {} bytes",
			requester.len(),
			requester.total_size()
		);
		Ok(requester)
	}

	pub fn from_config(dir: &Path, config: &Config) -> Result<FileDBufRequester> {
		let mut requester = FileDBufRequester::open(dir, config.disk_budget, config.disk_files)?;
		if config.clear_disk_on_startup {
			requester.clear()?;
		}
		Ok(requester)
	}

	/// Puts `parent` behind this cache. Buffers that cannot be written go there.
	#[must_use]
	pub fn with_parent(mut self, parent: Box<dyn DBufRequester>) -> FileDBufRequester {
		self.parent = Some(parent);
		self
	}

	/// Makes this cache the root of its chain, asking `source` for missing buffers.
	#[must_use]
	pub fn with_source(mut self, source: impl ExternalSource + 'static) -> FileDBufRequester {
		self.source = Some(Box::new(source));
		self
	}

	fn file_path(&self, file: usize) -> PathBuf {
		self.dir.join(format!("buffers.{file}"))
	}

	fn max_size_per_file(&self) -> u64 {
		self.max_size / self.sizes.len() as u64 + 1
	}

	fn read_back(&mut self) -> Result<()> {
		for file in 0..self.sizes.len() {
			let path = self.file_path(file);
			if !path.exists() {
				continue;
			}
			let mut reader = File::open(&path).with_context(|| format!("opening {path:?}"))?;
			let size = reader.metadata()?.len();
			if let Ok(generation) = reader.read_u64::<BigEndian>() {
				self.sizes[file] = size;
				self.generations[file] = generation;
			}
		}

		let mut order: Vec<usize> = (0..self.sizes.len()).filter(|file| self.sizes[*file] > 0).collect();
		order.sort_by_key(|file| self.generations[*file]);
		for file in order {
			self.scan(file)?;
			self.current = file;
		}
		self.generation = self.generations.iter().copied().max().unwrap_or(0);
		Ok(())
	}

	fn scan(&mut self, file: usize) -> Result<()> {
		let path = self.file_path(file);
		let size = self.sizes[file];
		let mut reader = BufReader::new(File::open(&path).with_context(|| format!("opening {path:?}"))?);
		reader.seek(SeekFrom::Start(HEADER_SIZE))?;

		let mut offset = HEADER_SIZE;
		while offset < size {
			let (key, len) = match read_record_header(&mut reader) {
				Ok(header) => header,
				Err(error) => {
					log::warn!("damaged record at {offset} in {path:?}: {error}");
					break;
				}
			};
			let data_offset = offset + 2 + key.len() as u64 + 4;
			let end = data_offset + u64::from(len);
			if end > size {
				log::warn!("buffer {key} in {path:?} is cut short");
				break;
			}
			reader.seek_relative(i64::from(len))?;
			self.index.insert(key, Entry { file, offset: data_offset, len });
			offset = end;
		}

		if offset < size {
			OpenOptions::new()
				.write(true)
				.open(&path)
				.and_then(|f| f.set_len(offset))
				.with_context(|| format!("cutting {path:?} to {offset} bytes"))?;
		}
		self.sizes[file] = offset;
		Ok(())
	}

	fn start_file(&mut self, file: usize) -> Result<()> {
		self.generation += 1;
		let path = self.file_path(file);
		let mut writer = File::create(&path).with_context(|| format!("creating {path:?}"))?;
		writer.write_u64::<BigEndian>(self.generation)?;
		self.sizes[file] = HEADER_SIZE;
		self.generations[file] = self.generation;
		Ok(())
	}

	fn clear_file(&mut self, file: usize) -> Result<()> {
		let path = self.file_path(file);
		if path.exists() {
			File::create(&path).with_context(|| format!("emptying {path:?}"))?;
		}
		let before = self.index.len();
		self.index.retain(|_, entry| entry.file != file);
		log::trace!("emptied {path:?}, dropping {} buffers", before - self.index.len());
		self.sizes[file] = 0;
		self.generations[file] = 0;
		Ok(())
	}

	fn write(&mut self, key: &str, buffer: &Blob) -> Result<()> {
		let key_len = u16::try_from(key.len()).with_context(|| format!("key of {} bytes is too long", key.len()))?;
		let len = u32::try_from(buffer.len()).with_context(|| format!("buffer {key} is too large"))?;
		let record = 2 + u64::from(key_len) + 4 + u64::from(len);

		if self.sizes[self.current] > HEADER_SIZE && self.sizes[self.current] + record > self.max_size_per_file() {
			self.current = (self.current + 1) % self.sizes.len();
			self.clear_file(self.current)?;
		}
		if self.sizes[self.current] == 0 {
			self.start_file(self.current)?;
		}

		let mut bytes = Vec::with_capacity(record as usize);
		bytes.write_u16::<BigEndian>(key_len)?;
		bytes.extend_from_slice(key.as_bytes());
		bytes.write_u32::<BigEndian>(len)?;
		bytes.extend_from_slice(buffer.as_slice());

		let path = self.file_path(self.current);
		let mut file = OpenOptions::new()
			.write(true)
			.open(&path)
			.with_context(|| format!("opening {path:?}"))?;
		file.seek(SeekFrom::Start(self.sizes[self.current]))?;
		file.write_all(&bytes).with_context(|| format!("writing buffer {key} to {path:?}"))?;

		let entry = Entry {
			file: self.current,
			offset: self.sizes[self.current] + 2 + u64::from(key_len) + 4,
			len,
		};
		self.sizes[self.current] += record;
		self.index.insert(key.to_string(), entry);
		Ok(())
	}

	fn read(&self, entry: Entry) -> Result<Blob> {
		let path = self.file_path(entry.file);
		let mut file = File::open(&path).with_context(|| format!("opening {path:?}"))?;
		file.seek(SeekFrom::Start(entry.offset))?;
		let mut data = vec![0u8; entry.len as usize];
		file.read_exact(&mut data)?;
		Ok(Blob::from(data))
	}

	/// Forgets the buffer for `key`. Its bytes stay until its file is emptied.
	pub fn remove(&mut self, key: &str) -> bool {
		self.index.remove(key).is_some()
	}

	pub fn contains(&self, key: &str) -> bool {
		self.index.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.index.len()
	}

	pub fn is_empty(&self) -> bool {
		self.index.is_empty()
	}

	/// Bytes on disk, dead records and file headers included.
	pub fn total_size(&self) -> u64 {
		self.sizes.iter().sum()
	}

	pub fn max_size(&self) -> u64 {
		self.max_size
	}

	/// Changes the budget, emptying the oldest files until the cache fits.
	pub fn set_max_size(&mut self, max_size: u64) -> Result<()> {
		self.max_size = max_size;
		while self.total_size() > self.max_size {
			let oldest = (0..self.sizes.len())
				.filter(|file| self.sizes[*file] > 0)
				.min_by_key(|file| self.generations[*file]);
			match oldest {
				Some(file) => self.clear_file(file)?,
				None => break,
			}
		}
		Ok(())
	}

	/// Empties every file.
	pub fn clear(&mut self) -> Result<()> {
		for file in 0..self.sizes.len() {
			self.clear_file(file)?;
		}
		self.current = 0;
		Ok(())
	}
}

fn read_record_header(reader: &mut impl Read) -> Result<(String, u32)> {
	let key_len = reader.read_u16::<BigEndian>()?;
	let mut key = vec![0u8; usize::from(key_len)];
	reader.read_exact(&mut key)?;
	let len = reader.read_u32::<BigEndian>()?;
	Ok((String::from_utf8(key)?, len))
}

impl DBufRequester for FileDBufRequester {
	/// Reads the buffer back and forgets it here.
	fn request_cached(&mut self, key: &str) -> Option<Blob> {
		let entry = self.index.remove(key)?;
		match self.read(entry) {
			Ok(buffer) => Some(buffer),
			Err(error) => {
				log::warn!("reading buffer {key} from disk: {error:#}");
				None
			}
		}
	}

	fn is_cached(&self, key: &str) -> bool {
		self.contains(key)
	}

	/// Writes the buffer to disk, or passes it on if that fails.
	fn release(&mut self, key: &str, buffer: Blob) {
		if let Err(error) = self.write(key, &buffer) {
			log::warn!("{error:#}");
			if let Some(parent) = self.parent.as_deref_mut() {
				parent.release(key, buffer);
			}
		}
	}

	fn parent(&self) -> Option<&dyn DBufRequester> {
		self.parent.as_deref().map(|parent| parent as &dyn DBufRequester)
	}

	fn parent_mut(&mut self) -> Option<&mut dyn DBufRequester> {
		self.parent.as_deref_mut().map(|parent| parent as &mut dyn DBufRequester)
	}

	fn fetch_external(&mut self, key: &str) {
		match self.source.as_deref_mut() {
			Some(source) => source.fetch(key),
			None => log::debug!("no source for buffer {key}"),
		}
	}
}

impl Debug for FileDBufRequester {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FileDBufRequester")
			.field("dir", &self.dir)
			.field("entries", &self.index.len())
			.field("total_size", &self.total_size())
			.field("max_size", &self.max_size)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::MemoryDBufRequester;
	use assert_fs::TempDir;
	use pretty_assertions::assert_eq;
	use std::cell::RefCell;
	use std::rc::Rc;

	// three files of 91 bytes: a header and two records of 2 + 2 + 4 + 20 bytes each
	const MAX_SIZE: u64 = 270;
	const FILES: usize = 3;

	fn blob(len: usize) -> Blob {
		Blob::from(vec![7u8; len])
	}

	fn fill(cache: &mut FileDBufRequester, keys: std::ops::Range<usize>) {
		for i in keys {
			cache.release(&format!("k{i}"), blob(20));
		}
	}

	#[test]
	fn released_buffers_come_back_once() -> Result<()> {
		let dir = TempDir::new()?;
		let mut cache = FileDBufRequester::open(dir.path(), MAX_SIZE, FILES)?;
		assert!(cache.is_empty());
		cache.release("G!A", blob(3));
		assert!(cache.is_cached("G!A"));
		assert_eq!(cache.request("G!A"), Some(blob(3)));
		assert!(!cache.contains("G!A"));
		assert_eq!(cache.request_cached("G!A"), None);
		Ok(())
	}

	#[test]
	fn full_files_rotate_out() -> Result<()> {
		let dir = TempDir::new()?;
		let mut cache = FileDBufRequester::open(dir.path(), MAX_SIZE, FILES)?;
		fill(&mut cache, 0..8);
		assert_eq!(cache.len(), 6);
		assert!(!cache.contains("k0") && !cache.contains("k1"));
		assert!((2..8).all(|i| cache.contains(&format!("k{i}"))));
		assert_eq!(cache.total_size(), 3 * 64);
		assert!(cache.total_size() <= cache.max_size());
		Ok(())
	}

	#[test]
	fn reopening_reads_the_files_back() -> Result<()> {
		let dir = TempDir::new()?;
		{
			let mut cache = FileDBufRequester::open(dir.path(), MAX_SIZE, FILES)?;
			fill(&mut cache, 0..8);
		}
		let mut cache = FileDBufRequester::open(dir.path(), MAX_SIZE, FILES)?;
		assert_eq!(cache.len(), 6);
		assert_eq!(cache.request_cached("k3"), Some(blob(20)));

		// writing continues in the newest file, so the next rotation drops k2
		cache.release("k8", blob(20));
		assert!(!cache.contains("k2"));
		assert!(cache.contains("k8") && cache.contains("k6"));
		Ok(())
	}

	#[test]
	fn damaged_tail_is_cut_off() -> Result<()> {
		let dir = TempDir::new()?;
		{
			let mut cache = FileDBufRequester::open(dir.path(), MAX_SIZE, FILES)?;
			fill(&mut cache, 0..2);
		}
		let path = dir.path().join("buffers.0");
		OpenOptions::new().append(true).open(&path)?.write_all(&[0, 5, b'k'])?;

		let mut cache = FileDBufRequester::open(dir.path(), MAX_SIZE, FILES)?;
		assert_eq!(std::fs::metadata(&path)?.len(), 64);
		assert_eq!(cache.len(), 2);
		cache.release("k2", blob(20));
		assert_eq!(cache.request_cached("k1"), Some(blob(20)));
		assert_eq!(cache.request_cached("k2"), Some(blob(20)));
		Ok(())
	}

	#[test]
	fn shrinking_the_budget_drops_the_oldest_files() -> Result<()> {
		let dir = TempDir::new()?;
		let mut cache = FileDBufRequester::open(dir.path(), MAX_SIZE, FILES)?;
		fill(&mut cache, 0..6);
		cache.set_max_size(100)?;
		assert_eq!(cache.total_size(), 64);
		assert_eq!(cache.len(), 2);
		assert!(cache.contains("k4") && cache.contains("k5"));

		assert!(cache.remove("k4"));
		assert!(!cache.remove("k4"));
		cache.clear()?;
		assert!(cache.is_empty());
		assert_eq!(cache.total_size(), 0);
		Ok(())
	}

	#[test]
	fn startup_can_start_empty() -> Result<()> {
		let dir = TempDir::new()?;
		let config = Config {
			disk_budget: MAX_SIZE,
			disk_files: FILES,
			..Config::default()
		};
		fill(&mut FileDBufRequester::from_config(dir.path(), &config)?, 0..4);
		assert_eq!(FileDBufRequester::from_config(dir.path(), &config)?.len(), 4);

		let clearing = Config {
			clear_disk_on_startup: true,
			..config
		};
		let cache = FileDBufRequester::from_config(dir.path(), &clearing)?;
		assert!(cache.is_empty());
		assert_eq!(cache.total_size(), 0);
		Ok(())
	}

	#[test]
	fn memory_evicts_to_disk() -> Result<()> {
		let dir = TempDir::new()?;
		let fetched = Rc::new(RefCell::new(Vec::new()));
		let log = fetched.clone();
		let disk = FileDBufRequester::open(dir.path(), 1000, 2)?
			.with_source(move |key: &str| log.borrow_mut().push(key.to_string()));
		// every entry costs 10 + 2 + 8 = 20
		let mut memory = MemoryDBufRequester::new(50, 10).with_parent(Box::new(disk));
		for key in ["k1", "k2", "k3", "k4"] {
			memory.insert(key, blob(8));
		}
		assert!(memory.parent().is_some_and(|disk| disk.is_cached("k1") && disk.is_cached("k2")));

		assert_eq!(memory.request("k1"), Some(blob(8)));
		assert!(!memory.parent().is_some_and(|disk| disk.is_cached("k1")));
		assert_eq!(memory.request("k9"), None);
		assert_eq!(*fetched.borrow(), vec![String::from("k9")]);
		Ok(())
	}
}
