//! Inline prefetch: the first caller to see the prefetch window performs the refresh itself.

// self
use crate::{
	_prelude::*,
	prefetch::{PrefetchStrategy, RefreshGate, RefreshTask},
};

/// Runs the refresh on the calling thread of whichever caller wins the gate.
///
/// Other callers return immediately with the current value while the winner refreshes. Errors
/// from the refresh propagate to the winner only.
#[derive(Clone, Debug, Default)]
pub struct OneCallerBlocks {
	gate: Arc<RefreshGate>,
}
impl OneCallerBlocks {
	/// Create a new strategy with an open gate.
	pub fn new() -> Self {
		Self::default()
	}
}
impl<T> PrefetchStrategy<T> for OneCallerBlocks {
	fn prefetch(&self, refresh: RefreshTask) -> Result<()> {
		let Some(_guard) = self.gate.try_enter() else {
			tracing::trace!("prefetch already in flight; skipping");

			return Ok(());
		};

		tracing::debug!("running inline prefetch");

		refresh()
	}
}
