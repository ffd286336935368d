//! Prefetch-time jitter that spreads refreshes of suppliers created at the same moment.

// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, cache::result::RefreshResult};

/// Safety margin kept between the latest jittered prefetch time and the stale time.
pub const STALE_MARGIN: TimeDelta = TimeDelta::minutes(1);
/// Windows longer than this are treated as "effectively never expires".
pub const MAX_JITTER_WINDOW: TimeDelta = TimeDelta::days(365);
/// Jitter range used once the window exceeds [`MAX_JITTER_WINDOW`].
pub const CAPPED_JITTER_RANGE: TimeDelta = TimeDelta::minutes(5);

/// Compute the range a prefetch time may be pushed forward by.
///
/// Returns `None` when the prefetch time is already within [`STALE_MARGIN`] of the stale time.
pub fn max_jitter(
	prefetch_time: DateTime<Utc>,
	stale_time: Option<DateTime<Utc>>,
) -> Option<TimeDelta> {
	let stale_time = stale_time.unwrap_or(DateTime::<Utc>::MAX_UTC);
	let one_minute_before_stale = stale_time.checked_sub_signed(STALE_MARGIN)?;

	if prefetch_time >= one_minute_before_stale {
		return None;
	}

	let window = one_minute_before_stale.signed_duration_since(prefetch_time);

	if window > MAX_JITTER_WINDOW { Some(CAPPED_JITTER_RANGE) } else { Some(window) }
}

/// Push the prefetch time of `result` forward by a uniform offset drawn from `rng`.
pub fn jitter_with<T, R>(result: RefreshResult<T>, rng: &mut R) -> RefreshResult<T>
where
	R: Rng + ?Sized,
{
	let Some(prefetch_time) = result.prefetch_time() else {
		return result;
	};
	let Some(window) = max_jitter(prefetch_time, result.stale_time()) else {
		return result;
	};
	let window_millis = window.num_milliseconds();

	if window_millis <= 0 {
		return result;
	}

	let offset = TimeDelta::milliseconds(rng.random_range(0..window_millis));

	match prefetch_time.checked_add_signed(offset) {
		Some(jittered) => result.with_prefetch_time(jittered),
		None => result,
	}
}

/// Apply jitter with the thread-local RNG when `enabled`.
pub fn apply<T>(result: RefreshResult<T>, enabled: bool) -> RefreshResult<T> {
	if !enabled {
		return result;
	}

	jitter_with(result, &mut rand::rng())
}
