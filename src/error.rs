//! Crate-wide error types and `Result` alias.

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the file cache crate.
///
/// The four cache-facing kinds (`NotFound`, `MetaFailure`, `IoFailure`, and the
/// fall-through-as-`TooLarge` outcome, which is not an error at all) are the ones
/// surfaced across the cache's public boundary; the rest cover configuration and
/// the HTTP glue.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("no such file: {0}")]
	NotFound(String),
	#[error("failed to read metadata for {path}")]
	MetaFailure { path: String, #[source] source: std::io::Error },
	#[error("short read on {path}: expected {expected} bytes, got {got}")]
	IoFailure { path: String, expected: u64, got: u64 },
	#[error("filename '{0}' exceeds FILENAME_MAX ({1} bytes)")]
	FilenameTooLong(String, usize),
	#[error("filename must not be empty")]
	EmptyFilename,
	#[error("cache worker pool has shut down")]
	WorkerPoolClosed,
	#[error("buffer pool exhausted: every buffer is pinned")]
	PoolExhausted,
	#[error("invalid configuration for {field}: {reason}")]
	Config { field: &'static str, reason: String },
	#[error("metrics error: {0}")]
	Metrics(String),
}
#[cfg(feature = "metrics")]
impl<T> From<metrics::SetRecorderError<T>> for Error
where
	T: std::fmt::Display,
{
	fn from(value: metrics::SetRecorderError<T>) -> Self {
		Self::Metrics(value.to_string())
	}
}
