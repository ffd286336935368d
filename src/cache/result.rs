//! Producer output describing a value and when it must be refreshed.

// self
use crate::_prelude::*;

/// Immutable value plus the timing metadata that drives refresh decisions.
///
/// An absent `stale_time` means the value never goes stale; an absent `prefetch_time` means no
/// opportunistic refresh is ever attempted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshResult<T> {
	value: T,
	stale_time: Option<DateTime<Utc>>,
	prefetch_time: Option<DateTime<Utc>>,
}
impl<T> RefreshResult<T> {
	/// Start building a result around `value`.
	pub fn builder(value: T) -> RefreshResultBuilder<T> {
		RefreshResultBuilder { value, stale_time: None, prefetch_time: None }
	}

	/// Result that never goes stale and never prefetches.
	pub fn new(value: T) -> Self {
		Self::builder(value).build()
	}

	/// Cached payload.
	pub fn value(&self) -> &T {
		&self.value
	}

	/// Consume the result, returning the payload.
	pub fn into_value(self) -> T {
		self.value
	}

	/// Time at or after which the value must not be served without refreshing first.
	pub fn stale_time(&self) -> Option<DateTime<Utc>> {
		self.stale_time
	}

	/// Time at or after which an opportunistic refresh should be attempted.
	pub fn prefetch_time(&self) -> Option<DateTime<Utc>> {
		self.prefetch_time
	}

	/// Whether the value has passed its stale time.
	pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
		self.stale_time.is_some_and(|stale_time| now >= stale_time)
	}

	/// Whether the value has entered its prefetch window.
	pub fn should_prefetch(&self, now: DateTime<Utc>) -> bool {
		self.prefetch_time.is_some_and(|prefetch_time| now >= prefetch_time)
	}

	/// Copy of this result with a different prefetch time.
	pub(crate) fn with_prefetch_time(self, prefetch_time: DateTime<Utc>) -> Self {
		Self { prefetch_time: Some(prefetch_time), ..self }
	}
}

/// Builder for [`RefreshResult`].
#[derive(Debug)]
pub struct RefreshResultBuilder<T> {
	value: T,
	stale_time: Option<DateTime<Utc>>,
	prefetch_time: Option<DateTime<Utc>>,
}
impl<T> RefreshResultBuilder<T> {
	/// Set the time at which the value goes stale.
	pub fn stale_time(mut self, stale_time: DateTime<Utc>) -> Self {
		self.stale_time = Some(stale_time);

		self
	}

	/// Set the time at which a prefetch should begin.
	pub fn prefetch_time(mut self, prefetch_time: DateTime<Utc>) -> Self {
		self.prefetch_time = Some(prefetch_time);

		self
	}

	/// Finalise the result.
	pub fn build(self) -> RefreshResult<T> {
		RefreshResult {
			value: self.value,
			stale_time: self.stale_time,
			prefetch_time: self.prefetch_time,
		}
	}
}
