use crate::Blob;

/// The outside world at the root of a requester chain, usually a network or file fetcher.
///
/// It only learns which buffer is wanted. The buffer arrives later through whoever owns
/// the chain.
pub trait ExternalSource {
	fn fetch(&mut self, key: &str);
}

impl<F: FnMut(&str)> ExternalSource for F {
	fn fetch(&mut self, key: &str) {
		self(key);
	}
}

/// A link in a chain of buffer providers keyed by tile address strings.
///
/// Buffers are owned by exactly one party at a time. A buffer handed out by
/// [`request`](DBufRequester::request) or [`request_cached`](DBufRequester::request_cached)
/// belongs to the caller until it is given back with [`release`](DBufRequester::release).
pub trait DBufRequester {
	/// Removes and returns the buffer for `key` if this link holds it.
	fn request_cached(&mut self, key: &str) -> Option<Blob>;

	/// Whether this link holds `key`, without handing it out.
	fn is_cached(&self, key: &str) -> bool;

	/// Gives a buffer back. A link without a parent drops it.
	fn release(&mut self, key: &str, buffer: Blob) {
		if let Some(parent) = self.parent_mut() {
			parent.release(key, buffer);
		}
	}

	fn parent(&self) -> Option<&dyn DBufRequester>;

	fn parent_mut(&mut self) -> Option<&mut dyn DBufRequester>;

	/// Called at the root for requests nobody in the chain could serve.
	fn fetch_external(&mut self, key: &str);

	/// Asks for `key`: this link's memory first, then the parent's, then the whole request
	/// goes to the parent and finally out of the root.
	///
	/// Returns the buffer if it was in memory somewhere along the chain, `None` if it has
	/// to be fetched.
	fn request(&mut self, key: &str) -> Option<Blob> {
		if let Some(buffer) = self.request_cached(key) {
			return Some(buffer);
		}
		match self.parent_mut() {
			Some(parent) => {
				if parent.is_cached(key) {
					return parent.request_cached(key);
				}
				parent.request(key)
			}
			None => {
				self.fetch_external(key);
				None
			}
		}
	}
}
