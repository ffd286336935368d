//! Metrics helpers and per-supplier telemetry bookkeeping.

// std
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
// crates.io
#[cfg(feature = "metrics")] use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
#[cfg(feature = "metrics")] use smallvec::SmallVec;
// self
use crate::_prelude::*;

#[cfg(feature = "metrics")]
type LabelSet = SmallVec<[Label; 2]>;

#[cfg(feature = "metrics")]
const METRIC_GETS_TOTAL: &str = "cached_supplier_gets_total";
#[cfg(feature = "metrics")]
const METRIC_PREFETCH_TOTAL: &str = "cached_supplier_prefetch_total";
#[cfg(feature = "metrics")]
const METRIC_REFRESH_TOTAL: &str = "cached_supplier_refresh_total";
#[cfg(feature = "metrics")]
const METRIC_REFRESH_DURATION: &str = "cached_supplier_refresh_duration_seconds";
#[cfg(feature = "metrics")]
const METRIC_REFRESH_ERRORS: &str = "cached_supplier_refresh_errors_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Thread-safe metrics accumulator for a single cached supplier.
#[derive(Debug, Default)]
pub struct SupplierMetrics {
	gets: AtomicU64,
	blocking_refreshes: AtomicU64,
	prefetches: AtomicU64,
	refresh_successes: AtomicU64,
	refresh_errors: AtomicU64,
	last_refresh_micros: AtomicU64,
}
impl SupplierMetrics {
	/// Create a new metrics accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record a call to `get`.
	pub fn record_get(&self) {
		self.gets.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a caller entering the blocking refresh path.
	pub fn record_blocking_refresh(&self) {
		self.blocking_refreshes.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a prefetch handed to the strategy.
	pub fn record_prefetch(&self) {
		self.prefetches.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a successful producer call and its latency.
	pub fn record_refresh_success(&self, duration: Duration) {
		self.refresh_successes.fetch_add(1, Ordering::Relaxed);
		self.last_refresh_micros.store(duration.as_micros() as u64, Ordering::Relaxed);
	}

	/// Record a failed producer call.
	pub fn record_refresh_error(&self) {
		self.refresh_errors.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> SupplierMetricsSnapshot {
		SupplierMetricsSnapshot {
			gets: self.gets.load(Ordering::Relaxed),
			blocking_refreshes: self.blocking_refreshes.load(Ordering::Relaxed),
			prefetches: self.prefetches.load(Ordering::Relaxed),
			refresh_successes: self.refresh_successes.load(Ordering::Relaxed),
			refresh_errors: self.refresh_errors.load(Ordering::Relaxed),
			last_refresh_micros: match self.last_refresh_micros.load(Ordering::Relaxed) {
				0 => None,
				value => Some(value),
			},
		}
	}
}

/// Read-only snapshot of per-supplier telemetry counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupplierMetricsSnapshot {
	/// Number of `get` calls observed.
	pub gets: u64,
	/// Number of times a caller entered the blocking refresh path.
	pub blocking_refreshes: u64,
	/// Number of prefetches handed to the strategy.
	pub prefetches: u64,
	/// Count of successful producer calls.
	pub refresh_successes: u64,
	/// Count of producer calls that failed.
	pub refresh_errors: u64,
	/// Microsecond latency of the most recent successful refresh.
	pub last_refresh_micros: Option<u64>,
}
impl SupplierMetricsSnapshot {
	/// Total producer invocations, successful or not.
	pub fn refreshes(&self) -> u64 {
		self.refresh_successes + self.refresh_errors
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

	let handle = PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Exported label sets for one supplier, built once so recording never allocates a label.
#[derive(Clone, Debug, Default)]
pub struct SupplierLabels {
	#[cfg(feature = "metrics")]
	base: LabelSet,
	#[cfg(feature = "metrics")]
	success: LabelSet,
	#[cfg(feature = "metrics")]
	error: LabelSet,
}
impl SupplierLabels {
	/// Build the label sets for the supplier called `name`.
	pub fn new(name: Arc<str>) -> Self {
		#[cfg(feature = "metrics")]
		{
			let mut base = LabelSet::new();

			base.push(Label::new("supplier", name));

			Self {
				success: status_labels(&base, "success"),
				error: status_labels(&base, "error"),
				base,
			}
		}
		#[cfg(not(feature = "metrics"))]
		{
			let _ = name;

			Self {}
		}
	}
}

/// Record a `get` call.
pub fn record_get(labels: &SupplierLabels) {
	#[cfg(feature = "metrics")]
	metrics::counter!(METRIC_GETS_TOTAL, labels.base.iter()).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = labels;
}

/// Record a prefetch handed to the strategy.
pub fn record_prefetch(labels: &SupplierLabels) {
	#[cfg(feature = "metrics")]
	metrics::counter!(METRIC_PREFETCH_TOTAL, labels.base.iter()).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = labels;
}

/// Record a successful refresh along with its latency.
pub fn record_refresh_success(labels: &SupplierLabels, duration: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(METRIC_REFRESH_TOTAL, labels.success.iter()).increment(1);
		metrics::histogram!(METRIC_REFRESH_DURATION, labels.base.iter())
			.record(duration.as_secs_f64());
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (labels, duration);
}

/// Record a failed refresh.
pub fn record_refresh_error(labels: &SupplierLabels) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(METRIC_REFRESH_TOTAL, labels.error.iter()).increment(1);
		metrics::counter!(METRIC_REFRESH_ERRORS, labels.base.iter()).increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = labels;
}

#[cfg(feature = "metrics")]
fn status_labels(base: &LabelSet, status: &'static str) -> LabelSet {
	let mut labels = base.clone();

	labels.push(Label::new("status", status));

	labels
}
