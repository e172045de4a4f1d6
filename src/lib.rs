//! Async file-serving content cache with coordinated refresh, single-flight
//! loads, and graceful fall-through to direct streaming.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod config;
pub mod io;
#[cfg(feature = "metrics")] pub mod metrics;
pub mod refresh;
pub mod server;

mod error;
mod _prelude {
	pub use std::{
		sync::Arc,
		time::{Duration, SystemTime},
	};

	pub use crate::{Error, Result};
}

#[cfg(feature = "prometheus")] pub use crate::metrics::install_default_exporter;
pub use crate::{
	cache::{BufferPin, CacheOutcome, FileCache},
	config::CacheConfig,
	error::{Error, Result},
	refresh::RefreshHandle,
};

// Only `src/bin/filecached.rs` uses this directly.
use tracing_subscriber as _;

// `metrics-util` only backs `src/metrics.rs`'s tests, which don't compile
// into the default (no-`metrics`-feature) test target.
#[cfg(test)]
mod _test {
	use metrics_util as _;
}
