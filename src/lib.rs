//! Cached-value refresh engine: serve an expensive, expiring value to many callers, refresh it
//! before it goes stale, and choose whether that refresh blocks one caller or runs in the
//! background.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod config;
pub mod metrics;
pub mod prefetch;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, TimeDelta, Utc};

	pub use crate::{Error, Result};
}

pub use crate::{
	cache::{
		result::{RefreshResult, RefreshResultBuilder},
		supplier::{CachedSupplier, CachedSupplierBuilder, WeakCachedSupplier},
	},
	config::{PrefetchConfig, SupplierConfig},
	error::{BoxError, Error, Result},
	metrics::{SupplierMetrics, SupplierMetricsSnapshot},
	prefetch::{
		PrefetchStrategy, RefreshTask, non_blocking::NonBlocking,
		one_caller_blocks::OneCallerBlocks,
	},
};
#[cfg(feature = "prometheus")] pub use crate::metrics::install_default_exporter;
