/// Identifies an idle registration so that it can be cancelled.
pub type IdleId = u32;

/// Idle callbacks of the host event loop.
///
/// The host calls [`TileMapGarbage::on_idle`](super::TileMapGarbage::on_idle) once for every
/// registration that fires and was not cancelled before.
pub trait IdleScheduler {
	fn request_idle(&mut self) -> IdleId;

	fn cancel_idle(&mut self, id: IdleId);
}

/// Tells the collector how much memory the host has left.
pub trait MemoryProbe {
	fn free_memory(&self) -> usize;

	fn largest_free_block(&self) -> usize;
}
