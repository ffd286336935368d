//! Blocking refresh, single-flight, and failure handling of the default strategy.

// std
use std::{
	sync::{
		Arc, Barrier,
		atomic::{AtomicUsize, Ordering},
		mpsc,
	},
	thread,
	time::Duration,
};
// crates.io
use cached_supplier::{CachedSupplier, Error, RefreshResult, Result};
use chrono::{TimeDelta, Utc};

fn expires_in(value: usize, stale_in: TimeDelta, prefetch_in: TimeDelta) -> RefreshResult<usize> {
	let now = Utc::now();

	RefreshResult::builder(value).stale_time(now + stale_in).prefetch_time(now + prefetch_in).build()
}

#[test]
fn repeated_reads_before_prefetch_time_do_not_refresh() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let calls = Arc::new(AtomicUsize::new(0));
	let counter = calls.clone();
	let supplier = CachedSupplier::builder(move || {
		let call = counter.fetch_add(1, Ordering::SeqCst) + 1;

		Ok(expires_in(call, TimeDelta::seconds(4), TimeDelta::seconds(2)))
	})
	.jitter_enabled(false)
	.build()?;

	for _ in 0..200 {
		assert_eq!(supplier.get()?, 1);
	}

	assert_eq!(calls.load(Ordering::SeqCst), 1);

	Ok(())
}

#[test]
fn stale_value_is_refreshed_before_returning() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let calls = Arc::new(AtomicUsize::new(0));
	let counter = calls.clone();
	let supplier = CachedSupplier::builder(move || {
		let call = counter.fetch_add(1, Ordering::SeqCst) + 1;

		if call == 1 {
			Ok(RefreshResult::builder(call)
				.stale_time(Utc::now() + TimeDelta::milliseconds(10))
				.build())
		} else {
			Ok(RefreshResult::new(call))
		}
	})
	.jitter_enabled(false)
	.build()?;

	assert_eq!(supplier.get()?, 1);

	thread::sleep(Duration::from_millis(20));

	assert_eq!(supplier.get()?, 2);
	assert_eq!(calls.load(Ordering::SeqCst), 2);

	Ok(())
}

#[test]
fn concurrent_stale_reads_share_a_single_refresh() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	const THREADS: usize = 50;

	let calls = Arc::new(AtomicUsize::new(0));
	let counter = calls.clone();
	let supplier = CachedSupplier::builder(move || {
		let call = counter.fetch_add(1, Ordering::SeqCst) + 1;

		if call == 1 {
			return Ok(RefreshResult::builder(call)
				.stale_time(Utc::now() + TimeDelta::milliseconds(10))
				.build());
		}

		// Keep the refresh in flight long enough for every thread to pile up behind it.
		thread::sleep(Duration::from_millis(100));

		Ok(expires_in(call, TimeDelta::hours(1), TimeDelta::minutes(30)))
	})
	.jitter_enabled(false)
	.build()?;

	assert_eq!(supplier.get()?, 1);

	thread::sleep(Duration::from_millis(20));

	let barrier = Arc::new(Barrier::new(THREADS));
	let readers = (0..THREADS)
		.map(|_| {
			let supplier = supplier.clone();
			let barrier = barrier.clone();

			thread::spawn(move || {
				barrier.wait();
				supplier.get()
			})
		})
		.collect::<Vec<_>>();
	let values = readers
		.into_iter()
		.map(|reader| reader.join().expect("reader thread"))
		.collect::<Result<Vec<_>>>()?;

	assert_eq!(calls.load(Ordering::SeqCst), 2);
	assert!(values.iter().all(|value| *value == 2), "observed values: {values:?}");

	Ok(())
}

#[test]
fn failed_blocking_refresh_surfaces_error_and_keeps_old_value() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let calls = Arc::new(AtomicUsize::new(0));
	let counter = calls.clone();
	let supplier = CachedSupplier::builder(move || {
		let call = counter.fetch_add(1, Ordering::SeqCst) + 1;

		match call {
			1 => Ok(RefreshResult::builder(call)
				.stale_time(Utc::now() + TimeDelta::milliseconds(10))
				.build()),
			2 => Err(Error::producer("session token endpoint returned 503")),
			_ => Ok(RefreshResult::new(call)),
		}
	})
	.jitter_enabled(false)
	.build()?;

	assert_eq!(supplier.get()?, 1);

	thread::sleep(Duration::from_millis(20));

	let err = supplier.get().expect_err("refresh failure reaches the caller");

	assert_eq!(err.to_string(), "Producer failed: session token endpoint returned 503");
	assert_eq!(supplier.peek().map(|current| *current.value()), Some(1));
	assert_eq!(supplier.get()?, 3);

	let metrics = supplier.metrics();

	assert_eq!(metrics.refresh_errors, 1);
	assert_eq!(metrics.refresh_successes, 2);

	Ok(())
}

#[test]
fn lock_wait_timeout_rechecks_and_refreshes_without_the_lock() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let calls = Arc::new(AtomicUsize::new(0));
	let counter = calls.clone();
	let (started_tx, started_rx) = mpsc::channel();
	let started_tx = std::sync::Mutex::new(started_tx);
	let supplier = CachedSupplier::builder(move || {
		let call = counter.fetch_add(1, Ordering::SeqCst) + 1;

		match call {
			1 => Ok(RefreshResult::builder(call)
				.stale_time(Utc::now() + TimeDelta::milliseconds(10))
				.build()),
			2 => {
				let _ = started_tx.lock().expect("sender").send(());

				thread::sleep(Duration::from_millis(400));

				Ok(RefreshResult::new(call))
			},
			_ => Ok(RefreshResult::new(call)),
		}
	})
	.jitter_enabled(false)
	.blocking_refresh_max_wait(Duration::from_millis(50))
	.build()?;

	assert_eq!(supplier.get()?, 1);

	thread::sleep(Duration::from_millis(20));

	let slow = {
		let supplier = supplier.clone();

		thread::spawn(move || supplier.get())
	};

	started_rx.recv_timeout(Duration::from_secs(5)).expect("slow refresh started");

	// The lock is held by the slow refresh; this caller gives up waiting and refreshes itself.
	assert_eq!(supplier.get()?, 3);
	assert_eq!(slow.join().expect("slow thread")?, 2);
	assert_eq!(calls.load(Ordering::SeqCst), 3);

	Ok(())
}
