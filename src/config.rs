//! Supplier configuration, defaults, and validation.

// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::{
	_prelude::*,
	prefetch::{PrefetchStrategy, non_blocking::NonBlocking, one_caller_blocks::OneCallerBlocks},
};

/// Default bound on how long a caller waits for the blocking refresh lock.
pub const DEFAULT_BLOCKING_REFRESH_MAX_WAIT: Duration = Duration::from_secs(5);
/// Default interval between timer-driven refresh checks of [`NonBlocking`].
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Declarative configuration for a [`CachedSupplier`](crate::CachedSupplier).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierConfig {
	/// Name of the cached value used in log fields and metric labels.
	#[serde(default)]
	pub name: Option<String>,
	/// Whether produced prefetch times are randomly jittered.
	#[serde(default = "default_true")]
	pub jitter_enabled: bool,
	/// Upper bound on waiting for the blocking refresh lock before re-checking staleness.
	#[serde(default = "default_blocking_refresh_max_wait")]
	pub blocking_refresh_max_wait: Duration,
	/// Strategy used once a value enters its prefetch window.
	#[serde(default)]
	pub prefetch: PrefetchConfig,
}
impl SupplierConfig {
	/// Validate invariants for supplier configuration.
	pub fn validate(&self) -> Result<()> {
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

		self.prefetch.validate()
	}
}
impl Default for SupplierConfig {
	fn default() -> Self {
		Self {
			name: None,
			jitter_enabled: true,
			blocking_refresh_max_wait: DEFAULT_BLOCKING_REFRESH_MAX_WAIT,
			prefetch: PrefetchConfig::default(),
		}
	}
}

/// Declarative choice of [`PrefetchStrategy`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum PrefetchConfig {
	/// Refresh inline on the first caller to observe the prefetch window.
	#[default]
	OneCallerBlocks,
	/// Refresh on a dedicated background thread.
	NonBlocking {
		/// Name given to the background scheduler thread.
		thread_name: String,
		/// Interval between timer-driven refresh checks.
		#[serde(default = "default_refresh_interval")]
		refresh_interval: Duration,
	},
}
impl PrefetchConfig {
	/// Validate invariants for the selected strategy.
	pub fn validate(&self) -> Result<()> {
		match self {
			PrefetchConfig::OneCallerBlocks => Ok(()),
			PrefetchConfig::NonBlocking { thread_name, refresh_interval } => {
				if thread_name.trim().is_empty() {
					return Err(Error::Validation {
						field: "prefetch.thread_name",
						reason: "Must not be empty.".into(),
					});
				}
				if refresh_interval.is_zero() {
					return Err(Error::Validation {
						field: "prefetch.refresh_interval",
						reason: "Must be greater than zero.".into(),
					});
				}

				Ok(())
			},
		}
	}

	/// Instantiate the configured strategy.
	///
	/// Building [`NonBlocking`] starts its background thread.
	pub fn build_strategy<T>(&self) -> Result<Box<dyn PrefetchStrategy<T>>>
	where
		T: Clone + Send + Sync + 'static,
	{
		self.validate()?;

		let strategy: Box<dyn PrefetchStrategy<T>> = match self {
			PrefetchConfig::OneCallerBlocks => Box::new(OneCallerBlocks::new()),
			PrefetchConfig::NonBlocking { thread_name, refresh_interval } =>
				Box::new(NonBlocking::with_refresh_interval(thread_name.clone(), *refresh_interval)?),
		};

		Ok(strategy)
	}
}

fn default_true() -> bool {
	true
}

fn default_blocking_refresh_max_wait() -> Duration {
	DEFAULT_BLOCKING_REFRESH_MAX_WAIT
}

fn default_refresh_interval() -> Duration {
	DEFAULT_REFRESH_INTERVAL
}
