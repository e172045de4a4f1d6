//! File metadata snapshot and the payload a ready entry carries.

// self
use crate::{_prelude::*, cache::pool::BufferId};

/// The subset of `stat(2)` fields compared on every revalidation to decide
/// whether a file's content could possibly have changed since it was last
/// loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStat {
	/// Device number of the filesystem the file lives on.
	pub dev: u64,
	/// Inode number.
	pub ino: u64,
	/// File size in bytes.
	pub size: u64,
	/// Last modification time, in seconds since the epoch.
	pub mtime: i64,
	/// Last inode-change time, in seconds since the epoch.
	pub ctime: i64,
}
impl FileStat {
	/// Build a [`FileStat`] from a `std::fs::Metadata`.
	#[cfg(unix)]
	pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
		use std::os::unix::fs::MetadataExt;

		Self { dev: meta.dev(), ino: meta.ino(), size: meta.size(), mtime: meta.mtime(), ctime: meta.ctime() }
	}

	/// Last modification time as a `SystemTime`, for the HTTP `Last-Modified` header.
	pub fn mtime_system_time(&self) -> SystemTime {
		if self.mtime >= 0 {
			SystemTime::UNIX_EPOCH + Duration::from_secs(self.mtime as u64)
		} else {
			SystemTime::UNIX_EPOCH - Duration::from_secs(self.mtime.unsigned_abs())
		}
	}
}

/// What a `Ready` entry holds: the stat snapshot taken at load time, the
/// buffer backing its content, and the epoch it was loaded against.
#[derive(Clone, Copy, Debug)]
pub struct ReadyPayload {
	/// Stat snapshot taken when this buffer was filled.
	pub stat: FileStat,
	/// Buffer holding the file's content.
	pub buffer: BufferId,
	/// Global epoch this payload was validated against.
	pub epoch: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn stat(size: u64, mtime: i64) -> FileStat {
		FileStat { dev: 1, ino: 2, size, mtime, ctime: mtime }
	}

	#[test]
	fn equal_stats_compare_equal() {
		assert_eq!(stat(10, 100), stat(10, 100));
	}

	#[test]
	fn differing_mtime_compares_unequal() {
		assert_ne!(stat(10, 100), stat(10, 101));
	}
}
