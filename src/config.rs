//! Cache sizing, refresh cadence, and filename constraints.
//!
//! Sizing defaults (`cache_size`, `spare_buffers`, `BUFFER_SIZE`,
//! `FILENAME_MAX`, a 30 second refresh interval) are overridable, validated
//! fields rather than fixed constants, so a deployment can size the pool to
//! its own working set.

// self
use crate::_prelude::*;

/// Size of a single pooled buffer: large files are never cached, only streamed.
pub const BUFFER_SIZE: usize = 1024 * 1024;
/// Maximum number of distinct cache entries.
pub const DEFAULT_CACHE_SIZE: usize = 256;
/// Extra buffers beyond `CACHE_SIZE` so a reload always finds a free buffer
/// even when every cached entry is pinned by an in-flight request.
pub const DEFAULT_SPARE_BUFFERS: usize = 64;
/// Maximum filename length accepted as a cache key (NUL excluded).
pub const FILENAME_MAX: usize = 255;
/// Default interval between periodic epoch bumps.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
/// Default size of the blocking I/O worker pool.
pub const DEFAULT_IO_WORKERS: usize = 32;

/// Configuration governing buffer pool sizing, cache capacity, and refresh cadence.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CacheConfig {
	/// Root directory that filenames are resolved against.
	pub root: std::path::PathBuf,
	/// Maximum number of distinct cached filenames.
	#[serde(default = "default_cache_size")]
	pub cache_size: usize,
	/// Extra buffers kept beyond `cache_size` for in-flight reloads.
	#[serde(default = "default_spare_buffers")]
	pub spare_buffers: usize,
	/// Interval between periodic epoch bumps that trigger lazy revalidation.
	#[serde(default = "default_refresh_interval")]
	pub refresh_interval: Duration,
	/// Number of blocking-thread workers backing file I/O offload.
	#[serde(default = "default_io_workers")]
	pub io_workers: usize,
}
impl CacheConfig {
	/// Construct a configuration rooted at `root` using the documented default sizing.
	pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
		Self {
			root: root.into(),
			cache_size: DEFAULT_CACHE_SIZE,
			spare_buffers: DEFAULT_SPARE_BUFFERS,
			refresh_interval: DEFAULT_REFRESH_INTERVAL,
			io_workers: DEFAULT_IO_WORKERS,
		}
	}

	/// Total number of buffers the pool allocates (`cache_size + spare_buffers`).
	pub fn num_buffers(&self) -> usize {
		self.cache_size + self.spare_buffers
	}

	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if self.cache_size == 0 {
			return Err(Error::Config { field: "cache_size", reason: "must be greater than zero".into() });
		}
		if self.io_workers == 0 {
			return Err(Error::Config { field: "io_workers", reason: "must be greater than zero".into() });
		}
		if self.refresh_interval.is_zero() {
			return Err(Error::Config {
				field: "refresh_interval",
				reason: "must be greater than zero".into(),
			});
		}
		if !self.root.is_absolute() {
			return Err(Error::Config { field: "root", reason: "must be an absolute path".into() });
		}

		Ok(())
	}
}

/// Validate a filename as a cache key: non-empty, within `FILENAME_MAX`, no
/// embedded NUL or path traversal component.
pub fn validate_filename(filename: &str) -> Result<()> {
	if filename.is_empty() {
		return Err(Error::EmptyFilename);
	}
	if filename.len() >= FILENAME_MAX {
		return Err(Error::FilenameTooLong(filename.to_string(), FILENAME_MAX));
	}
	if filename.contains('\0') {
		return Err(Error::Config { field: "filename", reason: "must not contain a NUL byte".into() });
	}

	Ok(())
}

fn default_cache_size() -> usize {
	DEFAULT_CACHE_SIZE
}

fn default_spare_buffers() -> usize {
	DEFAULT_SPARE_BUFFERS
}

fn default_refresh_interval() -> Duration {
	DEFAULT_REFRESH_INTERVAL
}

fn default_io_workers() -> usize {
	DEFAULT_IO_WORKERS
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_relative_root() {
		let config = CacheConfig::new("relative/path");
		assert!(config.validate().is_err());
	}

	#[test]
	fn rejects_zero_cache_size() {
		let mut config = CacheConfig::new("/srv/www");
		config.cache_size = 0;
		assert!(config.validate().is_err());
	}

	#[test]
	fn num_buffers_sums_cache_and_spare() {
		let config = CacheConfig::new("/srv/www");
		assert_eq!(config.num_buffers(), DEFAULT_CACHE_SIZE + DEFAULT_SPARE_BUFFERS);
	}

	#[test]
	fn filename_validation_rejects_empty_and_overlong() {
		assert!(validate_filename("").is_err());
		assert!(validate_filename(&"a".repeat(FILENAME_MAX)).is_err());
		assert!(validate_filename(&"a".repeat(FILENAME_MAX - 1)).is_ok());
	}
}
