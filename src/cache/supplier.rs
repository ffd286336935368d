//! Cached supplier coordinating reads, prefetches, and blocking refreshes.

// std
use std::{
	sync::{
		Weak,
		atomic::{AtomicBool, Ordering},
	},
	time::Instant,
};
// crates.io
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
// self
use crate::{
	_prelude::*,
	cache::{jitter, result::RefreshResult},
	config::{DEFAULT_BLOCKING_REFRESH_MAX_WAIT, SupplierConfig},
	metrics::{self, SupplierLabels, SupplierMetrics, SupplierMetricsSnapshot},
	prefetch::{PrefetchStrategy, RefreshTask, one_caller_blocks::OneCallerBlocks},
};

const UNNAMED: &str = "unnamed";

type Producer<T> = Arc<dyn Fn() -> Result<RefreshResult<T>> + Send + Sync>;

/// Serves an expensive value from cache and refreshes it before it goes stale.
///
/// Reads of a fresh value take no lock: they load the current snapshot with one atomic read.
/// Once the value enters its prefetch window the configured [`PrefetchStrategy`] decides how the
/// refresh runs; once it is stale the calling thread refreshes it, with at most one producer call
/// in flight while the refresh lock is held.
///
/// Clones share the same cache. The supplier is closed when [`close`](Self::close) is called or
/// when the last clone is dropped.
pub struct CachedSupplier<T> {
	inner: Arc<Inner<T>>,
}
impl<T> CachedSupplier<T>
where
	T: Clone + Send + Sync + 'static,
{
	/// Start building a supplier around `producer`.
	pub fn builder<F>(producer: F) -> CachedSupplierBuilder<T>
	where
		F: Fn() -> Result<RefreshResult<T>> + Send + Sync + 'static,
	{
		CachedSupplierBuilder {
			producer: Arc::new(producer),
			strategy: None,
			jitter_enabled: true,
			name: None,
			blocking_refresh_max_wait: DEFAULT_BLOCKING_REFRESH_MAX_WAIT,
		}
	}

	/// Return the current value, refreshing or prefetching as its timing requires.
	///
	/// Fails only when a refresh performed by this call fails; the previously cached value is
	/// left in place for other callers.
	pub fn get(&self) -> Result<T> {
		let inner = &self.inner;
		let now = Utc::now();

		inner.observe_get();

		match inner.current() {
			None => {
				tracing::debug!(name = inner.label(), "cache uninitialized; performing initial refresh");

				inner.metrics.record_blocking_refresh();
				inner.refresh_cache()?;
			},
			Some(current) if current.is_stale(now) => {
				tracing::debug!(name = inner.label(), "cached value is stale; refreshing");

				inner.metrics.record_blocking_refresh();
				inner.refresh_cache()?;
			},
			Some(current) if current.should_prefetch(now) => inner.prefetch_cache()?,
			Some(current) => return Ok(current.value().clone()),
		}

		inner
			.current()
			.map(|current| current.value().clone())
			.ok_or_else(|| Error::Cache("No value available after refresh.".into()))
	}

	/// Release the strategy's resources. Safe to call more than once.
	///
	/// [`get`](Self::get) keeps working afterwards; it serves the cached value and refreshes it
	/// inline once stale, without restarting background activity.
	pub fn close(&self) {
		self.inner.close();
	}

	/// Inspect the cached snapshot without triggering any refresh.
	pub fn peek(&self) -> Option<Arc<RefreshResult<T>>> {
		self.inner.current()
	}

	/// Name given to the cached value, if any.
	pub fn name(&self) -> Option<&str> {
		self.inner.name.as_deref()
	}

	/// Point-in-time telemetry counters for this supplier.
	pub fn metrics(&self) -> SupplierMetricsSnapshot {
		self.inner.metrics.snapshot()
	}

	/// Weak handle that does not keep the supplier alive.
	pub fn downgrade(&self) -> WeakCachedSupplier<T> {
		WeakCachedSupplier { inner: Arc::downgrade(&self.inner) }
	}
}
impl<T> Clone for CachedSupplier<T> {
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}
impl<T> std::fmt::Debug for CachedSupplier<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CachedSupplier")
			.field("name", &self.inner.name)
			.field("strategy", &self.inner.strategy)
			.field("jitter_enabled", &self.inner.jitter_enabled)
			.field("blocking_refresh_max_wait", &self.inner.blocking_refresh_max_wait)
			.field("closed", &self.inner.closed.load(Ordering::Acquire))
			.finish_non_exhaustive()
	}
}

/// Non-owning handle to a [`CachedSupplier`], handed to strategies for background wiring.
pub struct WeakCachedSupplier<T> {
	inner: Weak<Inner<T>>,
}
impl<T> WeakCachedSupplier<T> {
	/// Recover the supplier if it is still alive.
	pub fn upgrade(&self) -> Option<CachedSupplier<T>> {
		self.inner.upgrade().map(|inner| CachedSupplier { inner })
	}
}
impl<T> Clone for WeakCachedSupplier<T> {
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}
impl<T> std::fmt::Debug for WeakCachedSupplier<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WeakCachedSupplier").field("alive", &(self.inner.strong_count() > 0)).finish()
	}
}

/// Builder for [`CachedSupplier`].
pub struct CachedSupplierBuilder<T> {
	producer: Producer<T>,
	strategy: Option<Box<dyn PrefetchStrategy<T>>>,
	jitter_enabled: bool,
	name: Option<String>,
	blocking_refresh_max_wait: Duration,
}
impl<T> CachedSupplierBuilder<T>
where
	T: Clone + Send + Sync + 'static,
{
	/// Use `strategy` for prefetches instead of [`OneCallerBlocks`].
	pub fn prefetch_strategy<S>(self, strategy: S) -> Self
	where
		S: PrefetchStrategy<T> + 'static,
	{
		self.boxed_prefetch_strategy(Box::new(strategy))
	}

	/// Use an already boxed strategy for prefetches.
	pub fn boxed_prefetch_strategy(mut self, strategy: Box<dyn PrefetchStrategy<T>>) -> Self {
		self.strategy = Some(strategy);

		self
	}

	/// Enable or disable prefetch-time jitter (enabled by default).
	pub fn jitter_enabled(mut self, jitter_enabled: bool) -> Self {
		self.jitter_enabled = jitter_enabled;

		self
	}

	/// Name the cached value for log fields and metric labels.
	pub fn cached_value_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());

		self
	}

	/// Bound how long a caller waits for the blocking refresh lock.
	pub fn blocking_refresh_max_wait(mut self, max_wait: Duration) -> Self {
		self.blocking_refresh_max_wait = max_wait;

		self
	}

	/// Apply a declarative configuration, constructing its strategy.
	pub fn config(mut self, config: &SupplierConfig) -> Result<Self> {
		config.validate()?;

		self.strategy = Some(config.prefetch.build_strategy()?);
		self.jitter_enabled = config.jitter_enabled;
		self.name = config.name.clone();
		self.blocking_refresh_max_wait = config.blocking_refresh_max_wait;

		Ok(self)
	}

	/// Validate the configuration and construct the supplier.
	pub fn build(self) -> Result<CachedSupplier<T>> {
		if let Some(name) = &self.name
			&& name.trim().is_empty()
		{
			return Err(Error::Validation {
				field: "name",
				reason: "Must not be blank when provided.".into(),
			});
		}
		if self.blocking_refresh_max_wait.is_zero() {
			return Err(Error::Validation {
				field: "blocking_refresh_max_wait",
				reason: "Must be greater than zero.".into(),
			});
		}

		let strategy: Box<dyn PrefetchStrategy<T>> = match self.strategy {
			Some(strategy) => strategy,
			None => Box::new(OneCallerBlocks::new()),
		};

		let name: Option<Arc<str>> = self.name.map(Arc::from);
		let labels = SupplierLabels::new(name.clone().unwrap_or_else(|| Arc::from(UNNAMED)));

		Ok(CachedSupplier {
			inner: Arc::new(Inner {
				name,
				labels,
				producer: self.producer,
				jitter_enabled: self.jitter_enabled,
				blocking_refresh_max_wait: self.blocking_refresh_max_wait,
				cached_value: ArcSwapOption::empty(),
				refresh_lock: Mutex::new(()),
				strategy,
				strategy_initialized: AtomicBool::new(false),
				closed: AtomicBool::new(false),
				metrics: SupplierMetrics::new(),
			}),
		})
	}
}
impl<T> std::fmt::Debug for CachedSupplierBuilder<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CachedSupplierBuilder")
			.field("strategy", &self.strategy)
			.field("jitter_enabled", &self.jitter_enabled)
			.field("name", &self.name)
			.field("blocking_refresh_max_wait", &self.blocking_refresh_max_wait)
			.finish_non_exhaustive()
	}
}

struct Inner<T> {
	name: Option<Arc<str>>,
	labels: SupplierLabels,
	producer: Producer<T>,
	jitter_enabled: bool,
	blocking_refresh_max_wait: Duration,
	/// `None` until the first successful refresh; treated as stale.
	cached_value: ArcSwapOption<RefreshResult<T>>,
	refresh_lock: Mutex<()>,
	strategy: Box<dyn PrefetchStrategy<T>>,
	strategy_initialized: AtomicBool,
	closed: AtomicBool,
	metrics: Arc<SupplierMetrics>,
}
impl<T> Inner<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn current(&self) -> Option<Arc<RefreshResult<T>>> {
		self.cached_value.load_full()
	}

	fn label(&self) -> &str {
		self.name.as_deref().unwrap_or(UNNAMED)
	}

	fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
		self.current().is_none_or(|current| current.is_stale(now) || current.should_prefetch(now))
	}

	#[tracing::instrument(skip(self), fields(name = self.label()))]
	fn refresh_cache(self: &Arc<Self>) -> Result<()> {
		let guard = self.refresh_lock.try_lock_for(self.blocking_refresh_max_wait);

		if guard.is_none() {
			tracing::warn!(
				max_wait = ?self.blocking_refresh_max_wait,
				"timed out waiting for the refresh lock; re-checking cache"
			);
		}
		if !self.needs_refresh(Utc::now()) {
			tracing::debug!("value refreshed by another caller");

			return Ok(());
		}
		if !self.closed.load(Ordering::Acquire)
			&& !self.strategy_initialized.swap(true, Ordering::AcqRel)
		{
			self.strategy.initialize_cached_supplier(WeakCachedSupplier { inner: Arc::downgrade(self) });
		}

		let started = Instant::now();
		let producer = || self.produce();

		match self.strategy.fetch(&producer) {
			Ok(result) => {
				let elapsed = started.elapsed();

				tracing::debug!(
					stale_time = ?result.stale_time(),
					prefetch_time = ?result.prefetch_time(),
					?elapsed,
					"publishing refreshed value"
				);

				self.cached_value.store(Some(Arc::new(result)));

				self.observe_refresh_success(elapsed);

				Ok(())
			},
			Err(err) => {
				tracing::debug!(error = %err, "refresh failed; keeping previous value");

				self.observe_refresh_error();

				Err(err)
			},
		}
	}

	fn prefetch_cache(self: &Arc<Self>) -> Result<()> {
		tracing::debug!(name = self.label(), "cached value entered prefetch window");

		self.observe_prefetch();

		let supplier = Arc::downgrade(self);
		let refresh: RefreshTask = Box::new(move || match supplier.upgrade() {
			Some(inner) => inner.refresh_cache(),
			None => Ok(()),
		});

		self.strategy.prefetch(refresh)
	}

	fn produce(&self) -> Result<RefreshResult<T>> {
		(self.producer)().map(|result| jitter::apply(result, self.jitter_enabled))
	}

	fn observe_get(&self) {
		metrics::record_get(&self.labels);

		self.metrics.record_get();
	}

	fn observe_prefetch(&self) {
		metrics::record_prefetch(&self.labels);

		self.metrics.record_prefetch();
	}

	fn observe_refresh_success(&self, duration: Duration) {
		metrics::record_refresh_success(&self.labels, duration);

		self.metrics.record_refresh_success(duration);
	}

	fn observe_refresh_error(&self) {
		metrics::record_refresh_error(&self.labels);

		self.metrics.record_refresh_error();
	}
}
impl<T> Inner<T> {
	fn close(&self) {
		if self.closed.swap(true, Ordering::AcqRel) {
			return;
		}

		tracing::debug!(name = self.name.as_deref().unwrap_or(UNNAMED), "closing cached supplier");

		self.strategy.close();
	}
}
impl<T> Drop for Inner<T> {
	fn drop(&mut self) {
		self.close();
	}
}
