use super::{IdleId, IdleScheduler, MemoryProbe};
use crate::Config;
use std::collections::VecDeque;
use std::fmt::Debug;

/// What the collector is doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectorState {
	/// Nothing queued, no idle callback pending.
	Idle,
	/// Waiting for the idle callback with this id.
	Scheduled(IdleId),
	/// Destroying synchronously.
	Draining,
}

/// Deferred destruction of evicted tiles.
///
/// Tiles are queued and destroyed one per idle tick, so that dropping a large tile set
/// does not stall the frame that evicted it. When the host runs low on memory the queue
/// is worked off synchronously until the pressure is gone. Dropping the collector
/// destroys everything still queued.
pub struct TileMapGarbage<T> {
	queue: VecDeque<T>,
	state: CollectorState,
	scheduler: Box<dyn IdleScheduler>,
	probe: Option<Box<dyn MemoryProbe>>,
	min_free_memory: usize,
	min_largest_block: usize,
	destroyed: usize,
}

impl<T> TileMapGarbage<T> {
	pub fn new(scheduler: Box<dyn IdleScheduler>) -> TileMapGarbage<T> {
		TileMapGarbage::from_config(scheduler, &Config::default())
	}

	pub fn from_config(scheduler: Box<dyn IdleScheduler>, config: &Config) -> TileMapGarbage<T> {
		TileMapGarbage {
			queue: VecDeque::new(),
			state: CollectorState::Idle,
			scheduler,
			probe: None,
			min_free_memory: config.min_free_memory,
			min_largest_block: config.min_largest_block,
			destroyed: 0,
		}
	}

	/// Watches `probe` for memory pressure. Without a probe destruction is always deferred.
	#[must_use]
	pub fn with_probe(mut self, probe: Box<dyn MemoryProbe>) -> TileMapGarbage<T> {
		self.probe = Some(probe);
		self
	}

	pub fn state(&self) -> CollectorState {
		self.state
	}

	pub fn pending(&self) -> usize {
		self.queue.len()
	}

	/// Number of items destroyed so far.
	pub fn destroyed(&self) -> usize {
		self.destroyed
	}

	fn under_pressure(&self) -> bool {
		self.probe.as_deref().is_some_and(|probe| {
			probe.free_memory() < self.min_free_memory || probe.largest_free_block() < self.min_largest_block
		})
	}

	fn destroy_one(&mut self) -> bool {
		match self.queue.pop_front() {
			Some(item) => {
				drop(item);
				self.destroyed += 1;
				true
			}
			None => false,
		}
	}

	/// Queues `item` for destruction.
	pub fn add(&mut self, item: T) {
		self.queue.push_back(item);
		if self.under_pressure() {
			self.collect_under_pressure();
		} else if self.state == CollectorState::Idle {
			self.state = CollectorState::Scheduled(self.scheduler.request_idle());
		}
	}

	/// Queues every item of `items`.
	pub fn add_all(&mut self, items: impl IntoIterator<Item = T>) {
		for item in items {
			self.add(item);
		}
	}

	/// Idle tick: destroys one item and asks for another tick while items remain.
	pub fn on_idle(&mut self) {
		if !matches!(self.state, CollectorState::Scheduled(_)) {
			log::trace!("ignoring idle tick in state {:?}", self.state);
			return;
		}
		self.destroy_one();
		self.state = if self.queue.is_empty() {
			CollectorState::Idle
		} else {
			CollectorState::Scheduled(self.scheduler.request_idle())
		};
	}

	fn collect_under_pressure(&mut self) {
		let previous = self.state;
		self.state = CollectorState::Draining;
		let mut count = 0;
		while self.under_pressure() && self.destroy_one() {
			count += 1;
		}
		log::debug!("low memory: destroyed {count} tiles synchronously, {} left", self.queue.len());
		self.state = self.settle(previous);
	}

	/// The state after synchronous work, keeping or cancelling a pending idle callback.
	fn settle(&mut self, previous: CollectorState) -> CollectorState {
		match (previous, self.queue.is_empty()) {
			(CollectorState::Scheduled(id), true) => {
				self.scheduler.cancel_idle(id);
				CollectorState::Idle
			}
			(CollectorState::Scheduled(id), false) => CollectorState::Scheduled(id),
			(_, true) => CollectorState::Idle,
			(_, false) => CollectorState::Scheduled(self.scheduler.request_idle()),
		}
	}

	/// Destroys everything queued right away.
	pub fn drain(&mut self) {
		let previous = self.state;
		self.state = CollectorState::Draining;
		while self.destroy_one() {}
		self.state = self.settle(previous);
	}
}

impl<T> Drop for TileMapGarbage<T> {
	fn drop(&mut self) {
		if !self.queue.is_empty() {
			log::debug!("destroying {} queued tiles on shutdown", self.queue.len());
		}
		self.drain();
	}
}

impl<T> Debug for TileMapGarbage<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TileMapGarbage")
			.field("state", &self.state)
			.field("pending", &self.queue.len())
			.field("destroyed", &self.destroyed)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use std::cell::{Cell, RefCell};
	use std::rc::Rc;

	#[derive(Default)]
	struct Calls {
		requested: Vec<IdleId>,
		cancelled: Vec<IdleId>,
	}

	struct Scheduler(Rc<RefCell<Calls>>);

	impl IdleScheduler for Scheduler {
		fn request_idle(&mut self) -> IdleId {
			let mut calls = self.0.borrow_mut();
			let id = calls.requested.len() as IdleId + 1;
			calls.requested.push(id);
			id
		}

		fn cancel_idle(&mut self, id: IdleId) {
			self.0.borrow_mut().cancelled.push(id);
		}
	}

	struct Probe {
		free: Rc<Cell<usize>>,
	}

	impl MemoryProbe for Probe {
		fn free_memory(&self) -> usize {
			self.free.get()
		}

		fn largest_free_block(&self) -> usize {
			usize::MAX
		}
	}

	/// Records its destruction and optionally gives `size` bytes back to `free`.
	struct Tracked {
		name: &'static str,
		dropped: Rc<RefCell<Vec<&'static str>>>,
		free: Option<(Rc<Cell<usize>>, usize)>,
	}

	impl Drop for Tracked {
		fn drop(&mut self) {
			self.dropped.borrow_mut().push(self.name);
			if let Some((free, size)) = &self.free {
				free.set(free.get() + size);
			}
		}
	}

	fn collector() -> (TileMapGarbage<Tracked>, Rc<RefCell<Calls>>) {
		let calls = Rc::new(RefCell::new(Calls::default()));
		(TileMapGarbage::new(Box::new(Scheduler(calls.clone()))), calls)
	}

	fn tracked(name: &'static str, dropped: &Rc<RefCell<Vec<&'static str>>>) -> Tracked {
		Tracked {
			name,
			dropped: dropped.clone(),
			free: None,
		}
	}

	#[test]
	fn destroys_one_item_per_idle_tick() {
		let dropped = Rc::new(RefCell::new(Vec::new()));
		let (mut garbage, calls) = collector();
		assert_eq!(garbage.state(), CollectorState::Idle);

		garbage.add(tracked("a", &dropped));
		garbage.add(tracked("b", &dropped));
		assert_eq!(garbage.state(), CollectorState::Scheduled(1));
		assert_eq!(calls.borrow().requested, vec![1]);
		assert!(dropped.borrow().is_empty());

		garbage.on_idle();
		assert_eq!(*dropped.borrow(), vec!["a"]);
		assert_eq!(garbage.state(), CollectorState::Scheduled(2));

		garbage.on_idle();
		assert_eq!(*dropped.borrow(), vec!["a", "b"]);
		assert_eq!(garbage.state(), CollectorState::Idle);
		assert_eq!(garbage.destroyed(), 2);

		// stray tick
		garbage.on_idle();
		assert_eq!(calls.borrow().requested, vec![1, 2]);
	}

	#[test]
	fn memory_pressure_forces_synchronous_destruction() {
		let dropped = Rc::new(RefCell::new(Vec::new()));
		let free = Rc::new(Cell::new(1_000_000));
		let (garbage, calls) = collector();
		let mut garbage = garbage.with_probe(Box::new(Probe { free: free.clone() }));

		let item = |name| Tracked {
			name,
			dropped: dropped.clone(),
			free: Some((free.clone(), 200_000)),
		};
		garbage.add(item("a"));
		garbage.add(item("b"));
		garbage.add(item("c"));
		assert_eq!(garbage.pending(), 3);
		assert!(dropped.borrow().is_empty());

		// below the 512 KiB floor: destroy until two tiles freed enough
		free.set(200_000);
		garbage.add(item("d"));
		assert_eq!(*dropped.borrow(), vec!["a", "b"]);
		assert_eq!(garbage.pending(), 2);
		assert_eq!(garbage.state(), CollectorState::Scheduled(1));

		free.set(0);
		garbage.add(item("e"));
		assert_eq!(*dropped.borrow(), vec!["a", "b", "c", "d", "e"]);
		assert_eq!(garbage.state(), CollectorState::Idle);
		assert_eq!(calls.borrow().cancelled, vec![1]);
	}

	#[test]
	fn drop_drains_the_queue() {
		let dropped = Rc::new(RefCell::new(Vec::new()));
		let (mut garbage, calls) = collector();
		garbage.add_all([tracked("a", &dropped), tracked("b", &dropped)]);
		drop(garbage);
		assert_eq!(*dropped.borrow(), vec!["a", "b"]);
		assert_eq!(calls.borrow().cancelled, vec![1]);
	}
}
