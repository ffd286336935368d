//! Strategies deciding how a refresh is carried out once a value enters its prefetch window.

pub mod non_blocking;
pub mod one_caller_blocks;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	cache::{result::RefreshResult, supplier::WeakCachedSupplier},
};

/// Deferred refresh handed to [`PrefetchStrategy::prefetch`].
pub type RefreshTask = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Pluggable refresh behaviour for a [`CachedSupplier`](crate::CachedSupplier).
///
/// Every method except [`prefetch`](Self::prefetch) has a provided default, so a strategy only
/// overrides what it needs.
pub trait PrefetchStrategy<T>: Send + Sync + std::fmt::Debug {
	/// Invoke or schedule `refresh`.
	fn prefetch(&self, refresh: RefreshTask) -> Result<()>;

	/// Obtain a new result from `producer`.
	///
	/// Implementations may wrap the call but must ultimately call through.
	fn fetch(
		&self,
		producer: &dyn Fn() -> Result<RefreshResult<T>>,
	) -> Result<RefreshResult<T>> {
		producer()
	}

	/// One-time hook invoked the first time the supplier refreshes.
	fn initialize_cached_supplier(&self, _supplier: WeakCachedSupplier<T>) {}

	/// Release any resources held by the strategy.
	fn close(&self) {}
}

/// Single-flight gate; exactly one caller wins until the gate is released.
#[derive(Debug, Default)]
pub(crate) struct RefreshGate {
	refreshing: AtomicBool,
}
impl RefreshGate {
	/// Attempt to enter the gate, returning a guard that releases it on drop.
	pub(crate) fn try_enter(self: &Arc<Self>) -> Option<GateGuard> {
		self.refreshing
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| GateGuard { gate: self.clone() })
	}

	#[cfg(test)]
	pub(crate) fn is_open(&self) -> bool {
		!self.refreshing.load(Ordering::Acquire)
	}
}

/// Releases the owning [`RefreshGate`] when dropped, including during unwinding.
#[derive(Debug)]
pub(crate) struct GateGuard {
	gate: Arc<RefreshGate>,
}
impl Drop for GateGuard {
	fn drop(&mut self) {
		self.gate.refreshing.store(false, Ordering::Release);
	}
}
