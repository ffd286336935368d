//! Integration tests for cached supplier refresh behaviour.

mod supplier_refresh;

// std
use std::{
	thread,
	time::{Duration, Instant},
};

/// Poll `condition` until it holds or `timeout` elapses.
fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
	F: FnMut() -> bool,
{
	let deadline = Instant::now() + timeout;

	while Instant::now() < deadline {
		if condition() {
			return true;
		}

		thread::sleep(Duration::from_millis(5));
	}

	condition()
}
