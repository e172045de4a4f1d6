//! Metrics helpers and process-wide cache telemetry.

// std
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "prometheus")] use std::sync::OnceLock;

// crates.io
#[cfg(feature = "prometheus")] use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
// self
use crate::_prelude::*;

const METRIC_REQUESTS_TOTAL: &str = "filecache_requests_total";
const METRIC_HITS_TOTAL: &str = "filecache_hits_total";
const METRIC_LOADS_TOTAL: &str = "filecache_loads_total";
const METRIC_LOAD_FAILURES_TOTAL: &str = "filecache_load_failures_total";
const METRIC_TOO_LARGE_TOTAL: &str = "filecache_too_large_total";
const METRIC_FALLTHROUGH_TOTAL: &str = "filecache_fallthrough_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Thread-safe accumulator for process-wide cache counters. Unlabeled: a
/// single `FileCache` has no partitioning key worth breaking these down by.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	requests: AtomicU64,
	hits: AtomicU64,
	loads: AtomicU64,
	load_failures: AtomicU64,
	too_large: AtomicU64,
	fallthrough: AtomicU64,
}
impl CacheMetrics {
	/// Record a `get` that was served from an already-warm buffer.
	pub fn record_hit(&self) {
		self.requests.fetch_add(1, Ordering::Relaxed);
		self.hits.fetch_add(1, Ordering::Relaxed);

		metrics::counter!(METRIC_REQUESTS_TOTAL).increment(1);
		metrics::counter!(METRIC_HITS_TOTAL).increment(1);
	}

	/// Record a `get` that triggered a load (initial or stale-epoch reload).
	pub fn record_load(&self) {
		self.loads.fetch_add(1, Ordering::Relaxed);

		metrics::counter!(METRIC_LOADS_TOTAL).increment(1);
	}

	/// Record a load that failed (I/O error, short read, missing file).
	pub fn record_load_failure(&self) {
		self.load_failures.fetch_add(1, Ordering::Relaxed);

		metrics::counter!(METRIC_LOAD_FAILURES_TOTAL).increment(1);
	}

	/// Record a load that succeeded but exceeded the buffer size.
	pub fn record_too_large(&self) {
		self.too_large.fetch_add(1, Ordering::Relaxed);

		metrics::counter!(METRIC_TOO_LARGE_TOTAL).increment(1);
	}

	/// Record a `get` that fell through to direct streaming without
	/// attempting a load (table full, or a waiter whose loader failed).
	pub fn record_fallthrough(&self) {
		self.requests.fetch_add(1, Ordering::Relaxed);
		self.fallthrough.fetch_add(1, Ordering::Relaxed);

		metrics::counter!(METRIC_REQUESTS_TOTAL).increment(1);
		metrics::counter!(METRIC_FALLTHROUGH_TOTAL).increment(1);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> CacheMetricsSnapshot {
		CacheMetricsSnapshot {
			requests: self.requests.load(Ordering::Relaxed),
			hits: self.hits.load(Ordering::Relaxed),
			loads: self.loads.load(Ordering::Relaxed),
			load_failures: self.load_failures.load(Ordering::Relaxed),
			too_large: self.too_large.load(Ordering::Relaxed),
			fallthrough: self.fallthrough.load(Ordering::Relaxed),
		}
	}
}

/// Read-only snapshot of cache-wide telemetry counters.
#[derive(Clone, Copy, Debug)]
pub struct CacheMetricsSnapshot {
	/// Total lookups resolved, either as a hit or a fall-through.
	pub requests: u64,
	/// Lookups served from a pooled buffer.
	pub hits: u64,
	/// Loads attempted (initial fetch or stale-epoch reload).
	pub loads: u64,
	/// Loads that failed outright.
	pub load_failures: u64,
	/// Loads that succeeded but declined to cache (file too large).
	pub too_large: u64,
	/// Lookups that fell through to direct streaming.
	pub fallthrough: u64,
}
impl CacheMetricsSnapshot {
	/// Fraction of requests served from the buffer pool.
	pub fn hit_rate(&self) -> f64 {
		if self.requests == 0 {
			0.0
		} else {
			self.hits as f64 / self.requests as f64
		}
	}
}

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new().install_recorder().map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

#[cfg(test)]
mod tests {
	// std
	use std::borrow::Borrow;
	// crates.io
	use metrics_util::{
		CompositeKey, MetricKind,
		debugging::{DebugValue, DebuggingRecorder},
	};
	// self
	use super::*;

	fn capture_metrics<F>(f: F) -> Vec<(CompositeKey, DebugValue)>
	where
		F: FnOnce(),
	{
		let recorder = DebuggingRecorder::new();
		let snapshotter = recorder.snapshotter();

		metrics::with_local_recorder(&recorder, f);

		snapshotter.snapshot().into_vec().into_iter().map(|(key, _, _, value)| (key, value)).collect()
	}

	fn counter_value(snapshot: &[(CompositeKey, DebugValue)], name: &str) -> u64 {
		snapshot
			.iter()
			.find_map(|(key, value)| {
				(key.kind() == MetricKind::Counter && Borrow::<str>::borrow(key.key().name()) == name).then(
					|| match value {
						DebugValue::Counter(value) => *value,
						_ => 0,
					},
				)
			})
			.unwrap_or(0)
	}

	#[test]
	fn records_hits_and_loads() {
		let metrics = CacheMetrics::default();

		let snapshot = capture_metrics(|| {
			metrics.record_load();
			metrics.record_hit();
			metrics.record_hit();
		});

		assert_eq!(counter_value(&snapshot, "filecache_hits_total"), 2);
		assert_eq!(counter_value(&snapshot, "filecache_loads_total"), 1);

		let local = metrics.snapshot();
		assert_eq!(local.hits, 2);
		assert_eq!(local.loads, 1);
		assert_eq!(local.hit_rate(), 1.0);
	}

	#[test]
	fn records_fallthrough_and_failures() {
		let metrics = CacheMetrics::default();

		let snapshot = capture_metrics(|| {
			metrics.record_fallthrough();
			metrics.record_load_failure();
			metrics.record_too_large();
		});

		assert_eq!(counter_value(&snapshot, "filecache_fallthrough_total"), 1);
		assert_eq!(counter_value(&snapshot, "filecache_load_failures_total"), 1);
		assert_eq!(counter_value(&snapshot, "filecache_too_large_total"), 1);

		let local = metrics.snapshot();
		assert_eq!(local.requests, 1);
		assert_eq!(local.hit_rate(), 0.0);
	}
}
