//! Blocking file I/O offloaded onto a bounded pool of worker threads.
//!
//! `tokio::task::spawn_blocking` already runs on Tokio's own blocking thread
//! pool; the semaphore here caps how many of *our* opens/reads run
//! concurrently, independent of whatever else shares that pool.

// self
use crate::{
	_prelude::*,
	cache::{
		pool::{BufferId, BufferPool},
		state::FileStat,
	},
};

/// Failure modes from opening and stat'ing a file, kept distinct from
/// [`crate::Error`] so callers can decide how to report "not found" versus
/// "metadata failed" without matching on a general-purpose error enum.
pub enum OpenError {
	/// No such file.
	NotFound,
	/// The file exists but its metadata could not be read.
	Meta(std::io::Error),
	/// Failed to open the file for a reason other than "not found".
	Open(std::io::Error),
}

/// Bounded pool offloading blocking file I/O to worker threads.
pub struct IoPool {
	semaphore: Arc<tokio::sync::Semaphore>,
}
impl IoPool {
	/// Build a pool admitting up to `workers` concurrent blocking operations.
	pub fn new(workers: usize) -> Self {
		Self { semaphore: Arc::new(tokio::sync::Semaphore::new(workers)) }
	}

	/// Open `path` and stat it, matching step (a) of the cache's load
	/// protocol.
	pub async fn open_and_stat(&self, path: std::path::PathBuf) -> std::result::Result<(std::fs::File, FileStat), OpenError> {
		let permit = self.semaphore.clone().acquire_owned().await.expect("semaphore is never closed");

		tokio::task::spawn_blocking(move || {
			let _permit = permit;
			let file = std::fs::File::open(&path).map_err(|err| {
				if err.kind() == std::io::ErrorKind::NotFound {
					OpenError::NotFound
				} else {
					OpenError::Open(err)
				}
			})?;
			let meta = file.metadata().map_err(OpenError::Meta)?;

			Ok((file, FileStat::from_metadata(&meta)))
		})
		.await
		.expect("blocking open task panicked")
	}

	/// Read up to `len` bytes from `file` directly into `buffer`'s backing
	/// storage.
	pub async fn pread_into(&self, file: Arc<std::fs::File>, pool: Arc<BufferPool>, buffer: BufferId, len: u64) -> std::io::Result<u64> {
		let permit = self.semaphore.clone().acquire_owned().await.expect("semaphore is never closed");

		tokio::task::spawn_blocking(move || {
			let _permit = permit;

			pool.write_with(buffer, |slice| read_exact_at(&file, &mut slice[..len as usize]))
		})
		.await
		.expect("blocking read task panicked")
	}
}

#[cfg(unix)]
fn read_exact_at(file: &std::fs::File, buf: &mut [u8]) -> std::io::Result<u64> {
	use std::os::unix::fs::FileExt;

	let mut total = 0usize;

	while total < buf.len() {
		match file.read_at(&mut buf[total..], total as u64) {
			Ok(0) => break,
			Ok(n) => total += n,
			Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
			Err(err) => return Err(err),
		}
	}

	Ok(total as u64)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn open_and_stat_reports_size_and_not_found() {
		let pool = IoPool::new(2);
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("present.txt");
		std::fs::write(&path, b"hello world").unwrap();

		let (_file, stat) = pool.open_and_stat(path).await.ok().expect("file should open");
		assert_eq!(stat.size, 11);

		let missing = dir.path().join("missing.txt");
		assert!(matches!(pool.open_and_stat(missing).await, Err(OpenError::NotFound)));
	}

	#[tokio::test]
	async fn pread_into_fills_the_buffer() {
		let io = IoPool::new(1);
		let buffer_pool = Arc::new(BufferPool::new(1));
		let id = buffer_pool.acquire().unwrap();
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("content.txt");
		std::fs::write(&path, b"contents").unwrap();
		let (file, stat) = io.open_and_stat(path).await.ok().expect("file should open");

		let n = io.pread_into(Arc::new(file), buffer_pool.clone(), id, stat.size).await.unwrap();

		assert_eq!(n, 8);
		assert_eq!(&buffer_pool.read_to_vec(id, 8), b"contents");
	}
}
