//! Cache entry state machine: Empty, Loading, Ready (lazily observed as
//! Stale once the global epoch moves past it), and the transient load
//! protocol that coalesces concurrent readers onto a single loader.

// self
use crate::cache::state::ReadyPayload;

/// Stored entry state. `Stale` is not stored directly: a `Ready` payload
/// whose `epoch` lags the current global epoch is observed as stale by
/// [`CacheEntry::claim_loader_or_observe`] on comparison, rather than
/// flipped to a fifth discriminant the moment the epoch advances.
#[derive(Debug, Default)]
enum EntryState {
	#[default]
	Empty,
	Loading,
	Ready(ReadyPayload),
}

/// Externally observable lifecycle position of an entry, including the
/// lazily-derived `Stale` state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObservedState {
	/// No filename occupies this slot.
	Empty,
	/// A loader is fetching content; no buffer is available yet.
	Loading,
	/// A buffer is available and valid for the current epoch.
	Ready,
	/// A buffer is available but was loaded against an older epoch.
	Stale,
}

/// Result of attempting to claim the loader role for an entry.
pub enum ClaimOutcome {
	/// The caller is now the sole loader. `previous` carries the entry's last
	/// payload when this is a revalidation rather than a first load, so the
	/// loader can attempt the stat-equal fast path and in-place reuse.
	Loader {
		/// The entry's last payload, when this is a revalidation rather than a
		/// first load.
		previous: Option<ReadyPayload>,
	},
	/// Another caller is already loading; register as a waiter instead.
	Loading,
	/// The entry already holds a buffer valid for the requested epoch.
	Fresh(ReadyPayload),
}

/// One slot in the cache table.
#[derive(Default)]
pub struct CacheEntry {
	filename: String,
	state: EntryState,
	waiters: Vec<tokio::sync::oneshot::Sender<()>>,
}
impl CacheEntry {
	/// An unoccupied slot.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Whether this slot currently holds a filename: an occupied slot is one
	/// the table must keep scanning past when looking for a free slot.
	pub fn is_occupied(&self) -> bool {
		!self.filename.is_empty()
	}

	/// The filename this slot is keyed on.
	pub fn filename(&self) -> &str {
		&self.filename
	}

	/// Claim a free slot for `filename`, resetting it to `Empty`.
	pub fn occupy(&mut self, filename: &str) {
		self.filename = filename.to_string();
		self.state = EntryState::Empty;
		self.waiters.clear();
	}

	/// Release this slot back to the free list.
	pub fn reset(&mut self) {
		self.filename.clear();
		self.state = EntryState::Empty;
		self.waiters.clear();
	}

	/// Observe this entry's lifecycle position without mutating it.
	pub fn observe(&self, epoch: u64) -> ObservedState {
		match &self.state {
			EntryState::Empty => ObservedState::Empty,
			EntryState::Loading => ObservedState::Loading,
			EntryState::Ready(payload) =>
				if payload.epoch == epoch {
					ObservedState::Ready
				} else {
					ObservedState::Stale
				},
		}
	}

	/// Atomically decide the caller's role: become the loader, join the
	/// waiter list, or take the already-fresh buffer. Checking the epoch and
	/// flipping the state to `Loading` has to happen as one critical section;
	/// splitting them would let two concurrent callers both see a stale
	/// `Ready` payload and both start loading.
	pub fn claim_loader_or_observe(&mut self, epoch: u64) -> ClaimOutcome {
		match &self.state {
			EntryState::Empty => {
				self.state = EntryState::Loading;

				ClaimOutcome::Loader { previous: None }
			},
			EntryState::Loading => ClaimOutcome::Loading,
			EntryState::Ready(payload) =>
				if payload.epoch == epoch {
					ClaimOutcome::Fresh(*payload)
				} else {
					let previous = *payload;
					self.state = EntryState::Loading;

					ClaimOutcome::Loader { previous: Some(previous) }
				},
		}
	}

	/// Join the FIFO wait list for an in-flight load.
	pub fn register_waiter(&mut self) -> tokio::sync::oneshot::Receiver<()> {
		let (tx, rx) = tokio::sync::oneshot::channel();

		self.waiters.push(tx);

		rx
	}

	/// Record a successful load, returning the waiters to wake in FIFO order.
	pub fn load_success(&mut self, payload: ReadyPayload) -> Vec<tokio::sync::oneshot::Sender<()>> {
		self.state = EntryState::Ready(payload);

		std::mem::take(&mut self.waiters)
	}

	/// Record a failed load (or a load that declined to cache, e.g. the file
	/// was too large). The slot is reclaimed to `Empty` immediately, before
	/// waiters are woken; they will observe an absent buffer and fall through
	/// to a direct open rather than retry the cache.
	pub fn load_failure(&mut self) -> Vec<tokio::sync::oneshot::Sender<()>> {
		self.filename.clear();
		self.state = EntryState::Empty;

		std::mem::take(&mut self.waiters)
	}

	/// The payload currently backing this entry, if any, regardless of epoch.
	/// Used by a woken waiter to decide between a hit and a direct open.
	pub fn ready_payload(&self) -> Option<ReadyPayload> {
		match &self.state {
			EntryState::Ready(payload) => Some(*payload),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::cache::{pool::BufferPool, state::FileStat};

	fn stat() -> FileStat {
		FileStat { dev: 1, ino: 1, size: 10, mtime: 100, ctime: 100 }
	}

	#[test]
	fn first_claim_on_empty_entry_becomes_loader_with_no_previous() {
		let mut entry = CacheEntry::empty();
		entry.occupy("a.txt");

		match entry.claim_loader_or_observe(1) {
			ClaimOutcome::Loader { previous } => assert!(previous.is_none()),
			_ => panic!("expected Loader"),
		}
	}

	#[test]
	fn second_claim_while_loading_joins_wait_list() {
		let mut entry = CacheEntry::empty();
		entry.occupy("a.txt");
		entry.claim_loader_or_observe(1);

		assert!(matches!(entry.claim_loader_or_observe(1), ClaimOutcome::Loading));
	}

	#[test]
	fn fresh_ready_entry_is_served_without_reload() {
		let pool = BufferPool::new(1);
		let buffer = pool.acquire().unwrap();
		let mut entry = CacheEntry::empty();
		entry.occupy("a.txt");
		entry.claim_loader_or_observe(1);
		entry.load_success(ReadyPayload { stat: stat(), buffer, epoch: 1 });

		match entry.claim_loader_or_observe(1) {
			ClaimOutcome::Fresh(payload) => assert_eq!(payload.epoch, 1),
			_ => panic!("expected Fresh"),
		}
	}

	#[test]
	fn epoch_mismatch_on_ready_entry_promotes_caller_to_loader_with_previous() {
		let pool = BufferPool::new(1);
		let buffer = pool.acquire().unwrap();
		let mut entry = CacheEntry::empty();
		entry.occupy("a.txt");
		entry.claim_loader_or_observe(1);
		entry.load_success(ReadyPayload { stat: stat(), buffer, epoch: 1 });

		match entry.claim_loader_or_observe(2) {
			ClaimOutcome::Loader { previous } => {
				let previous = previous.expect("stale reload carries previous payload");
				assert_eq!(previous.buffer, buffer);
			},
			_ => panic!("expected Loader"),
		}
	}

	#[test]
	fn load_failure_reclaims_slot_and_drains_waiters() {
		let mut entry = CacheEntry::empty();
		entry.occupy("a.txt");
		entry.claim_loader_or_observe(1);
		let rx = entry.register_waiter();

		let waiters = entry.load_failure();
		assert_eq!(waiters.len(), 1);
		for tx in waiters {
			let _ = tx.send(());
		}

		assert!(rx.blocking_recv().is_ok());
		assert!(!entry.is_occupied());
		assert_eq!(entry.observe(1), ObservedState::Empty);
	}
}
