//! Bounded table of cache entries, scanned linearly on every lookup.
//!
//! A hash index would turn the O(n) scan into O(1), but `cache_size` is
//! small (hundreds, not millions) and the scan only ever runs while holding
//! the table's own lock for a handful of instructions, never across I/O.

// self
use crate::{
	cache::entry::{CacheEntry, ClaimOutcome},
	cache::state::ReadyPayload,
};

/// Fixed-capacity table of [`CacheEntry`] slots, all pre-allocated `Empty`
/// rather than grown lazily up to a high-water mark: both behave
/// identically from the outside since a slot starts `Empty` either way.
pub struct CacheTable {
	entries: tokio::sync::Mutex<Vec<CacheEntry>>,
}
impl CacheTable {
	/// Build a table with `cache_size` slots.
	pub fn new(cache_size: usize) -> Self {
		Self { entries: tokio::sync::Mutex::new((0..cache_size).map(|_| CacheEntry::empty()).collect()) }
	}

	/// Find the slot for `filename`, or claim a free slot for it. Returns
	/// `None` when the table is full and no matching entry exists, which the
	/// caller treats as a fall-through to direct streaming.
	pub async fn find_or_allocate(&self, filename: &str) -> Option<usize> {
		let mut entries = self.entries.lock().await;

		if let Some(index) = entries.iter().position(|entry| entry.is_occupied() && entry.filename() == filename) {
			return Some(index);
		}

		let index = entries.iter().position(|entry| !entry.is_occupied())?;
		entries[index].occupy(filename);

		Some(index)
	}

	/// Claim the loader role (or observe) for the entry at `index`.
	pub async fn claim(&self, index: usize, epoch: u64) -> ClaimOutcome {
		self.entries.lock().await[index].claim_loader_or_observe(epoch)
	}

	/// Join the wait list for the in-flight load at `index`.
	pub async fn register_waiter(&self, index: usize) -> tokio::sync::oneshot::Receiver<()> {
		self.entries.lock().await[index].register_waiter()
	}

	/// Commit a successful load and return the waiters to wake.
	pub async fn commit_ready(&self, index: usize, payload: ReadyPayload) -> Vec<tokio::sync::oneshot::Sender<()>> {
		self.entries.lock().await[index].load_success(payload)
	}

	/// Commit a failed (or declined-to-cache) load and return the waiters to wake.
	pub async fn commit_failure(&self, index: usize) -> Vec<tokio::sync::oneshot::Sender<()>> {
		self.entries.lock().await[index].load_failure()
	}

	/// Inspect whatever buffer a woken waiter finds after the loader finishes.
	pub async fn peek_ready(&self, index: usize) -> Option<ReadyPayload> {
		self.entries.lock().await[index].ready_payload()
	}

	#[cfg(test)]
	pub async fn occupied_count(&self) -> usize {
		self.entries.lock().await.iter().filter(|entry| entry.is_occupied()).count()
	}
}
