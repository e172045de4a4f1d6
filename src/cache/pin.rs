//! RAII handle releasing a pinned buffer on drop.

// self
use crate::{
	_prelude::*,
	cache::pool::{BufferId, BufferPool},
};

/// Holds one reference on a pooled buffer for as long as it's alive.
/// Dropping a `BufferPin` is the release; there's no separate call to make.
pub struct BufferPin {
	pool: Arc<BufferPool>,
	id: BufferId,
}
impl BufferPin {
	/// Wrap an already-pinned buffer. The caller must have already
	/// incremented the buffer's refcount (via `acquire` or `pin`); this does
	/// not pin on construction so that the single increment performed by the
	/// cache's load protocol is the only one that happens.
	pub(crate) fn new(pool: Arc<BufferPool>, id: BufferId) -> Self {
		Self { pool, id }
	}

	/// The buffer this pin protects.
	pub fn id(&self) -> BufferId {
		self.id
	}
}
impl Drop for BufferPin {
	fn drop(&mut self) {
		self.pool.release(self.id);
	}
}
impl std::fmt::Debug for BufferPin {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BufferPin").field("id", &self.id).finish()
	}
}
