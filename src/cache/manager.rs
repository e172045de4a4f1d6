//! The cache's public surface: `FileCache::get` and the load protocol that
//! backs it.

// self
use crate::{
	_prelude::*,
	cache::{
		entry::ClaimOutcome,
		pin::BufferPin,
		pool::BufferPool,
		state::ReadyPayload,
		table::CacheTable,
	},
	config::{self, CacheConfig},
	io::{IoPool, OpenError},
	refresh::{Controller, GlobalEpoch, RefreshHandle},
};

/// What a `get` call resolves to: either a cached buffer or a fall-through
/// to direct streaming. A failed lookup is a `Result::Err` instead.
pub enum CacheOutcome {
	/// Served from the buffer pool.
	Hit {
		/// File content, copied out of the pooled buffer.
		bytes: Vec<u8>,
		/// File size at load time.
		size: u64,
		/// File modification time at load time.
		mtime: SystemTime,
		/// RAII guard releasing the pool's reference on drop.
		pin: BufferPin,
	},
	/// Not cached: the caller streams directly from `file`.
	Stream {
		/// The already-open file, ready to be read from offset 0.
		file: tokio::fs::File,
		/// File size.
		size: u64,
		/// File modification time.
		mtime: SystemTime,
	},
}
impl std::fmt::Debug for CacheOutcome {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			CacheOutcome::Hit { size, .. } => f.debug_struct("Hit").field("size", size).finish(),
			CacheOutcome::Stream { size, .. } => f.debug_struct("Stream").field("size", size).finish(),
		}
	}
}

enum LoadResult {
	Cached(ReadyPayload),
	TooLarge { file: std::fs::File, size: u64, mtime: SystemTime },
}

struct Inner {
	root: std::path::PathBuf,
	table: CacheTable,
	pool: Arc<BufferPool>,
	io: IoPool,
	epoch: GlobalEpoch,
	#[cfg(feature = "metrics")]
	metrics: Arc<crate::metrics::CacheMetrics>,
}

/// A file-serving cache: a bounded pool of buffers backing filename-keyed
/// entries, coalescing concurrent loads of the same file onto a single
/// loader and falling through to direct streaming when a file can't be
/// cached (too large, or the table is full).
#[derive(Clone)]
pub struct FileCache {
	inner: Arc<Inner>,
}
impl FileCache {
	/// Build a cache from `config` without starting its refresh controller.
	/// Prefer [`FileCache::spawn`] unless you're driving the refresh epoch
	/// yourself (as the tests do).
	pub fn new(config: CacheConfig) -> Result<Self> {
		config.validate()?;

		Ok(Self {
			inner: Arc::new(Inner {
				root: config.root.clone(),
				table: CacheTable::new(config.cache_size),
				pool: Arc::new(BufferPool::new(config.num_buffers())),
				io: IoPool::new(config.io_workers),
				epoch: GlobalEpoch::new(),
				#[cfg(feature = "metrics")]
				metrics: Arc::new(crate::metrics::CacheMetrics::default()),
			}),
		})
	}

	/// Build a cache and launch its background [`Controller`], returning a
	/// handle to trigger out-of-band refreshes.
	pub fn spawn(config: CacheConfig) -> Result<(Self, RefreshHandle)> {
		let cache = Self::new(config.clone())?;
		let (controller, handle) = Controller::new(cache.inner.epoch.clone(), config.refresh_interval);

		tokio::spawn(controller.run());

		Ok((cache, handle))
	}

	/// The global epoch this cache is currently validating entries against.
	/// Exposed for tests that need to assert on refresh cadence.
	pub fn epoch(&self) -> &GlobalEpoch {
		&self.inner.epoch
	}

	#[cfg(feature = "metrics")]
	/// A snapshot of hit/miss/load counters.
	pub fn metrics(&self) -> crate::metrics::CacheMetricsSnapshot {
		self.inner.metrics.snapshot()
	}

	/// Resolve `filename` to either a cached buffer or a streaming
	/// fall-through, coalescing concurrent callers for the same filename onto
	/// a single loader.
	pub async fn get(&self, filename: &str) -> Result<CacheOutcome> {
		config::validate_filename(filename)?;

		let epoch = self.inner.epoch.current();
		let Some(index) = self.inner.table.find_or_allocate(filename).await else {
			tracing::debug!(filename, "cache table full, falling through to direct open");
			return self.open_direct(filename).await;
		};

		match self.inner.table.claim(index, epoch).await {
			ClaimOutcome::Fresh(payload) => Ok(self.hit(payload)),
			ClaimOutcome::Loader { previous } => self.run_as_loader(index, filename, epoch, previous).await,
			ClaimOutcome::Loading => self.wait_then_resolve(index, filename).await,
		}
	}

	fn hit(&self, payload: ReadyPayload) -> CacheOutcome {
		self.inner.pool.pin(payload.buffer);
		let bytes = self.inner.pool.read_to_vec(payload.buffer, payload.stat.size as usize);

		#[cfg(feature = "metrics")]
		self.inner.metrics.record_hit();

		CacheOutcome::Hit {
			bytes,
			size: payload.stat.size,
			mtime: payload.stat.mtime_system_time(),
			pin: BufferPin::new(self.inner.pool.clone(), payload.buffer),
		}
	}

	async fn wait_then_resolve(&self, index: usize, filename: &str) -> Result<CacheOutcome> {
		let rx = self.inner.table.register_waiter(index).await;
		let _ = rx.await;

		match self.inner.table.peek_ready(index).await {
			Some(payload) => Ok(self.hit(payload)),
			None => {
				tracing::debug!(filename, "load this waiter coalesced on failed, falling through");
				self.open_direct(filename).await
			},
		}
	}

	async fn run_as_loader(&self, index: usize, filename: &str, epoch: u64, previous: Option<ReadyPayload>) -> Result<CacheOutcome> {
		let path = self.inner.root.join(filename);

		match self.load(filename, &path, previous).await {
			Ok(LoadResult::Cached(mut payload)) => {
				payload.epoch = epoch;

				let waiters = self.inner.table.commit_ready(index, payload).await;
				wake(waiters);

				tracing::debug!(filename, buffer = ?payload.buffer, "loaded file into cache");
				#[cfg(feature = "metrics")]
				self.inner.metrics.record_load();

				Ok(self.hit(payload))
			},
			Ok(LoadResult::TooLarge { file, size, mtime }) => {
				let waiters = self.inner.table.commit_failure(index).await;
				wake(waiters);

				tracing::debug!(filename, size, "file exceeds buffer size, streaming directly");
				#[cfg(feature = "metrics")]
				self.inner.metrics.record_too_large();

				Ok(CacheOutcome::Stream { file: tokio::fs::File::from_std(file), size, mtime })
			},
			Err(err) => {
				let waiters = self.inner.table.commit_failure(index).await;
				wake(waiters);

				tracing::warn!(filename, error = %err, "load failed");
				#[cfg(feature = "metrics")]
				self.inner.metrics.record_load_failure();

				Err(err)
			},
		}
	}

	/// The load protocol from the cache's design: open, stat, size-check,
	/// stat-equal fast path, in-place reuse when safe, then read.
	async fn load(&self, filename: &str, path: &std::path::Path, previous: Option<ReadyPayload>) -> Result<LoadResult> {
		let old_buffer = previous.as_ref().map(|payload| payload.buffer);

		let (file, stat) = match self.inner.io.open_and_stat(path.to_path_buf()).await {
			Ok(pair) => pair,
			Err(OpenError::NotFound) => {
				release_if_some(&self.inner.pool, old_buffer);
				return Err(Error::NotFound(filename.to_string()));
			},
			Err(OpenError::Meta(source)) | Err(OpenError::Open(source)) => {
				release_if_some(&self.inner.pool, old_buffer);
				return Err(Error::MetaFailure { path: path.display().to_string(), source });
			},
		};

		if stat.size > config::BUFFER_SIZE as u64 {
			release_if_some(&self.inner.pool, old_buffer);
			return Ok(LoadResult::TooLarge { file, size: stat.size, mtime: stat.mtime_system_time() });
		}

		if let (Some(previous), Some(old_id)) = (previous.as_ref(), old_buffer) {
			if previous.stat == stat {
				tracing::debug!(filename, "stat unchanged across refresh, reusing buffer in place");
				return Ok(LoadResult::Cached(ReadyPayload { stat, buffer: old_id, epoch: 0 }));
			}
		}

		let buffer = match old_buffer {
			Some(id) if self.inner.pool.refcount(id) == 1 => {
				debug_assert_eq!(self.inner.pool.refcount(id), 1, "in-place reuse requires the sole reference to be the loader's own");

				id
			},
			Some(id) => {
				self.inner.pool.release(id);
				self.acquire_buffer()?
			},
			None => self.acquire_buffer()?,
		};

		let file = Arc::new(file);
		let read = self.inner.io.pread_into(file, self.inner.pool.clone(), buffer, stat.size).await;

		match read {
			Ok(n) if n == stat.size => Ok(LoadResult::Cached(ReadyPayload { stat, buffer, epoch: 0 })),
			Ok(n) => {
				self.inner.pool.release(buffer);
				Err(Error::IoFailure { path: path.display().to_string(), expected: stat.size, got: n })
			},
			Err(source) => {
				self.inner.pool.release(buffer);
				Err(Error::Io(source))
			},
		}
	}

	fn acquire_buffer(&self) -> Result<crate::cache::pool::BufferId> {
		self.inner.pool.acquire().ok_or(Error::PoolExhausted)
	}

	async fn open_direct(&self, filename: &str) -> Result<CacheOutcome> {
		let path = self.inner.root.join(filename);

		match self.inner.io.open_and_stat(path.clone()).await {
			Ok((file, stat)) => {
				#[cfg(feature = "metrics")]
				self.inner.metrics.record_fallthrough();

				Ok(CacheOutcome::Stream { file: tokio::fs::File::from_std(file), size: stat.size, mtime: stat.mtime_system_time() })
			},
			Err(OpenError::NotFound) => Err(Error::NotFound(filename.to_string())),
			Err(OpenError::Meta(source)) | Err(OpenError::Open(source)) => {
				Err(Error::MetaFailure { path: path.display().to_string(), source })
			},
		}
	}
}

fn wake(waiters: Vec<tokio::sync::oneshot::Sender<()>>) {
	for tx in waiters {
		let _ = tx.send(());
	}
}

fn release_if_some(pool: &BufferPool, id: Option<crate::cache::pool::BufferId>) {
	if let Some(id) = id {
		pool.release(id);
	}
}
