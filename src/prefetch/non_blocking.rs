//! Background prefetch on a dedicated single-threaded scheduler.

// std
use std::{
	sync::atomic::{AtomicBool, Ordering},
	thread,
};
// crates.io
use parking_lot::Mutex;
use tokio::{
	runtime::{self, Handle},
	sync::oneshot,
	task, time,
};
// self
use crate::{
	_prelude::*,
	cache::supplier::WeakCachedSupplier,
	config::DEFAULT_REFRESH_INTERVAL,
	prefetch::{PrefetchStrategy, RefreshGate, RefreshTask},
};

/// Refreshes in the background so that no caller ever blocks on a prefetch.
///
/// A single named thread drives two kinds of work:
/// - prefetches submitted by whichever caller wins the single-flight gate, and
/// - a recurring timer that calls [`CachedSupplier::get`](crate::CachedSupplier::get) every
///   `refresh_interval`, rescheduling itself only after the previous tick has finished.
///
/// The producer itself always runs on a blocking worker thread carrying the same name, outside
/// the scheduler's async context, so producers are free to block on their own runtime.
///
/// Failures and panics on the background threads are logged and never reach a caller.
#[derive(Debug)]
pub struct NonBlocking {
	thread_name: String,
	refresh_interval: Duration,
	handle: Handle,
	shutdown: Mutex<Option<oneshot::Sender<()>>>,
	closed: AtomicBool,
	gate: Arc<RefreshGate>,
}
impl NonBlocking {
	/// Start a background scheduler thread using the default refresh interval.
	pub fn new(thread_name: impl Into<String>) -> Result<Self> {
		Self::with_refresh_interval(thread_name, DEFAULT_REFRESH_INTERVAL)
	}

	/// Start a background scheduler thread that polls the supplier every `refresh_interval`.
	pub fn with_refresh_interval(
		thread_name: impl Into<String>,
		refresh_interval: Duration,
	) -> Result<Self> {
		let thread_name = thread_name.into();

		if thread_name.trim().is_empty() {
			return Err(Error::Validation {
				field: "thread_name",
				reason: "Must not be empty.".into(),
			});
		}
		if refresh_interval.is_zero() {
			return Err(Error::Validation {
				field: "refresh_interval",
				reason: "Must be greater than zero.".into(),
			});
		}

		let runtime = runtime::Builder::new_current_thread()
			.enable_time()
			.thread_name(thread_name.clone())
			.build()?;
		let handle = runtime.handle().clone();
		let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

		thread::Builder::new().name(thread_name.clone()).spawn(move || {
			// Resolves on an explicit close or once the strategy is dropped.
			let _ = runtime.block_on(shutdown_rx);

			// In-flight producer calls are abandoned rather than awaited.
			runtime.shutdown_background();

			tracing::debug!("background refresh scheduler stopped");
		})?;

		tracing::debug!(thread = %thread_name, ?refresh_interval, "background refresh scheduler started");

		Ok(Self {
			thread_name,
			refresh_interval,
			handle,
			shutdown: Mutex::new(Some(shutdown_tx)),
			closed: AtomicBool::new(false),
			gate: Arc::new(RefreshGate::default()),
		})
	}

	/// Name of the background scheduler thread.
	pub fn thread_name(&self) -> &str {
		&self.thread_name
	}

	/// Interval between timer-driven refresh checks.
	pub fn refresh_interval(&self) -> Duration {
		self.refresh_interval
	}

	/// Whether [`close`](PrefetchStrategy::close) has been called.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	fn shutdown(&self) {
		if self.closed.swap(true, Ordering::AcqRel) {
			return;
		}
		if let Some(shutdown) = self.shutdown.lock().take() {
			let _ = shutdown.send(());
		}

		tracing::debug!(thread = %self.thread_name, "background refresh scheduler closing");
	}
}
impl<T> PrefetchStrategy<T> for NonBlocking
where
	T: Clone + Send + Sync + 'static,
{
	fn prefetch(&self, refresh: RefreshTask) -> Result<()> {
		if self.is_closed() {
			tracing::trace!(thread = %self.thread_name, "scheduler closed; skipping prefetch");

			return Ok(());
		}

		let Some(guard) = self.gate.try_enter() else {
			tracing::trace!(thread = %self.thread_name, "prefetch already in flight; skipping");

			return Ok(());
		};

		self.handle.spawn(async move {
			let _guard = guard;

			match task::spawn_blocking(refresh).await {
				Ok(Ok(())) => {},
				Ok(Err(err)) => tracing::warn!(error = %err, "background prefetch failed"),
				Err(err) => tracing::warn!(error = %err, "background prefetch panicked"),
			}
		});

		Ok(())
	}

	fn initialize_cached_supplier(&self, supplier: WeakCachedSupplier<T>) {
		if self.is_closed() {
			return;
		}

		let refresh_interval = self.refresh_interval;

		self.handle.spawn(async move {
			loop {
				time::sleep(refresh_interval).await;

				let tick = supplier.clone();
				// The strong handle lives and drops on the worker, never on the scheduler.
				let outcome = task::spawn_blocking(move || {
					let supplier = tick.upgrade()?;

					if let Err(err) = supplier.get() {
						tracing::warn!(
							name = supplier.name().unwrap_or_default(),
							error = %err,
							"scheduled refresh failed"
						);
					}

					Some(())
				})
				.await;

				match outcome {
					Ok(Some(())) => {},
					Ok(None) => {
						tracing::debug!("cached supplier dropped; stopping refresh timer");

						break;
					},
					Err(err) => tracing::warn!(error = %err, "scheduled refresh panicked"),
				}
			}
		});
	}

	fn close(&self) {
		self.shutdown();
	}
}
impl Drop for NonBlocking {
	fn drop(&mut self) {
		self.shutdown();
	}
}
