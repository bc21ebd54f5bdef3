use super::{DBufRequester, ExternalSource};
use crate::{Blob, Config};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

/// A requester that keeps released buffers in memory up to a byte budget.
///
/// Entries are kept in insertion order. After every insertion the oldest entries are
/// evicted, and released to the parent, until the estimated memory use fits the budget
/// again. An entry is estimated at a fixed overhead plus the lengths of key and buffer.
pub struct MemoryDBufRequester {
	entries: BTreeMap<u64, (String, Blob)>,
	index: HashMap<String, u64>,
	next_seq: u64,
	used_memory: usize,
	max_memory: usize,
	entry_overhead: usize,
	parent: Option<Box<dyn DBufRequester>>,
	source: Option<Box<dyn ExternalSource>>,
}

impl MemoryDBufRequester {
	pub fn new(max_memory: usize, entry_overhead: usize) -> MemoryDBufRequester {
		MemoryDBufRequester {
			entries: BTreeMap::new(),
			index: HashMap::new(),
			next_seq: 0,
			used_memory: 0,
			max_memory,
			entry_overhead,
			parent: None,
			source: None,
		}
	}

	pub fn from_config(config: &Config) -> MemoryDBufRequester {
		MemoryDBufRequester::new(config.buffer_budget, config.entry_overhead)
	}

	/// Puts `parent` behind this cache. Evicted and released buffers go there.
	#[must_use]
	pub fn with_parent(mut self, parent: Box<dyn DBufRequester>) -> MemoryDBufRequester {
		self.parent = Some(parent);
		self
	}

	/// Makes this cache the root of its chain, asking `source` for missing buffers.
	#[must_use]
	pub fn with_source(mut self, source: impl ExternalSource + 'static) -> MemoryDBufRequester {
		self.source = Some(Box::new(source));
		self
	}

	fn estimate(&self, key: &str, buffer: &Blob) -> usize {
		self.entry_overhead + key.len() + buffer.len()
	}

	fn take(&mut self, key: &str) -> Option<Blob> {
		let seq = self.index.remove(key)?;
		let (key, buffer) = self.entries.remove(&seq)?;
		self.used_memory -= self.estimate(&key, &buffer);
		Some(buffer)
	}

	fn pass_up(&mut self, key: &str, buffer: Blob) {
		if let Some(parent) = self.parent.as_deref_mut() {
			parent.release(key, buffer);
		}
	}

	/// Stores `buffer` as the newest entry. An older buffer under the same key is released
	/// to the parent first.
	pub fn insert(&mut self, key: &str, buffer: Blob) {
		if let Some(old) = self.take(key) {
			self.pass_up(key, old);
		}
		self.used_memory += self.estimate(key, &buffer);
		self.entries.insert(self.next_seq, (key.to_string(), buffer));
		self.index.insert(key.to_string(), self.next_seq);
		self.next_seq += 1;
		self.evict();
	}

	fn evict(&mut self) {
		while self.used_memory > self.max_memory {
			let Some((_, (key, buffer))) = self.entries.pop_first() else {
				break;
			};
			self.index.remove(&key);
			self.used_memory -= self.estimate(&key, &buffer);
			log::trace!("evicting buffer {key} ({} bytes)", buffer.len());
			self.pass_up(&key, buffer);
		}
	}

	/// Drops the buffer for `key` without passing it on. Returns whether it was present.
	pub fn remove(&mut self, key: &str) -> bool {
		self.take(key).is_some()
	}

	pub fn contains(&self, key: &str) -> bool {
		self.index.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn used_memory(&self) -> usize {
		self.used_memory
	}

	pub fn max_memory(&self) -> usize {
		self.max_memory
	}

	/// Changes the budget, evicting right away if the cache no longer fits.
	pub fn set_max_memory(&mut self, max_memory: usize) {
		log::debug!("buffer budget {} -> {max_memory} bytes", self.max_memory);
		self.max_memory = max_memory;
		self.evict();
	}

	/// Drops every buffer.
	pub fn clear(&mut self) {
		self.entries.clear();
		self.index.clear();
		self.used_memory = 0;
	}
}

impl DBufRequester for MemoryDBufRequester {
	fn request_cached(&mut self, key: &str) -> Option<Blob> {
		self.take(key)
	}

	fn is_cached(&self, key: &str) -> bool {
		self.contains(key)
	}

	/// Keeps the buffer here.
	fn release(&mut self, key: &str, buffer: Blob) {
		self.insert(key, buffer);
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

impl Debug for MemoryDBufRequester {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MemoryDBufRequester")
			.field("entries", &self.entries.len())
			.field("used_memory", &self.used_memory)
			.field("max_memory", &self.max_memory)
			.field("has_parent", &self.parent.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use std::cell::RefCell;
	use std::rc::Rc;

	type Log = Rc<RefCell<Vec<String>>>;

	/// A root that records what it is asked for and what comes back to it.
	struct Recorder {
		fetched: Log,
		released: Log,
	}

	impl DBufRequester for Recorder {
		fn request_cached(&mut self, _key: &str) -> Option<Blob> {
			None
		}

		fn is_cached(&self, _key: &str) -> bool {
			false
		}

		fn release(&mut self, key: &str, _buffer: Blob) {
			self.released.borrow_mut().push(key.to_string());
		}

		fn parent(&self) -> Option<&dyn DBufRequester> {
			None
		}

		fn parent_mut(&mut self) -> Option<&mut dyn DBufRequester> {
			None
		}

		fn fetch_external(&mut self, key: &str) {
			self.fetched.borrow_mut().push(key.to_string());
		}
	}

	fn recorder() -> (Recorder, Log, Log) {
		let fetched = Log::default();
		let released = Log::default();
		let recorder = Recorder {
			fetched: fetched.clone(),
			released: released.clone(),
		};
		(recorder, fetched, released)
	}

	fn blob(len: usize) -> Blob {
		Blob::from(vec![7u8; len])
	}

	#[test]
	fn evicts_oldest_first_within_budget() {
		let (root, _, released) = recorder();
		// every entry costs 10 + 2 + 8 = 20
		let mut cache = MemoryDBufRequester::new(50, 10).with_parent(Box::new(root));
		for key in ["k1", "k2", "k3", "k4"] {
			cache.insert(key, blob(8));
			assert!(cache.used_memory() <= cache.max_memory());
		}
		assert_eq!(*released.borrow(), vec!["k1", "k2"]);
		assert!(!cache.contains("k2"));
		assert!(cache.contains("k3") && cache.contains("k4"));
		assert_eq!(cache.used_memory(), 40);
	}

	#[test]
	fn reinsert_releases_the_old_value_once_and_refreshes() {
		let (root, _, released) = recorder();
		let mut cache = MemoryDBufRequester::new(60, 10).with_parent(Box::new(root));
		cache.insert("k1", blob(8));
		cache.insert("k2", blob(8));
		cache.insert("k1", blob(8));
		assert_eq!(*released.borrow(), vec!["k1"]);
		assert_eq!(cache.len(), 2);

		// k1 is now the newest, so k2 goes first
		cache.insert("k3", blob(8));
		cache.insert("k4", blob(8));
		assert_eq!(*released.borrow(), vec!["k1", "k2"]);
	}

	#[test]
	fn request_walks_up_the_chain() {
		let (root, fetched, _) = recorder();
		let parent = MemoryDBufRequester::new(1000, 0).with_parent(Box::new(root));
		let mut cache = MemoryDBufRequester::new(1000, 0).with_parent(Box::new(parent));

		cache.insert("local", blob(3));
		cache.parent_mut().unwrap().release("upstream", blob(4));

		assert_eq!(cache.request("local"), Some(blob(3)));
		assert!(!cache.contains("local"));
		assert_eq!(cache.request("upstream"), Some(blob(4)));
		assert!(!cache.parent().unwrap().is_cached("upstream"));
		assert_eq!(cache.request("missing"), None);
		assert_eq!(*fetched.borrow(), vec!["missing"]);
	}

	#[test]
	fn root_asks_its_source() {
		let fetched = Log::default();
		let log = fetched.clone();
		let mut cache = MemoryDBufRequester::new(100, 0).with_source(move |key: &str| log.borrow_mut().push(key.to_string()));
		assert_eq!(cache.request("G!A"), None);
		cache.release("G!A", blob(2));
		assert_eq!(cache.request("G!A"), Some(blob(2)));
		assert_eq!(*fetched.borrow(), vec!["G!A"]);
	}

	#[test]
	fn budget_changes_and_removal() {
		let (root, _, released) = recorder();
		let mut cache = MemoryDBufRequester::from_config(&Config {
			buffer_budget: 1000,
			entry_overhead: 0,
			..Config::default()
		})
		.with_parent(Box::new(root));
		for i in 0..10 {
			cache.insert(&format!("key{i}"), blob(96));
		}
		assert_eq!(cache.used_memory(), 1000);

		cache.set_max_memory(500);
		assert_eq!(cache.len(), 5);
		assert_eq!(released.borrow().len(), 5);

		assert!(cache.remove("key9"));
		assert!(!cache.remove("key9"));
		assert_eq!(released.borrow().len(), 5);
		assert_eq!(cache.used_memory(), 400);

		cache.clear();
		assert!(cache.is_empty());
		assert_eq!(cache.used_memory(), 0);
	}
}
