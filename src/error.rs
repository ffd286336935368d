//! Crate-wide error types and `Result` alias.

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error type accepted from value producers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the cached supplier crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("Cache error: {0}")]
	Cache(String),
	#[error("Metrics error: {0}")]
	Metrics(String),
	#[error("Producer failed: {0}")]
	Producer(#[source] BoxError),
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// Wrap an arbitrary producer failure.
	pub fn producer<E>(err: E) -> Self
	where
		E: Into<BoxError>,
	{
		Self::Producer(err.into())
	}
}
#[cfg(feature = "prometheus")]
impl<T> From<metrics::SetRecorderError<T>> for Error
where
	T: std::fmt::Display,
{
	fn from(value: metrics::SetRecorderError<T>) -> Self {
		Self::Metrics(value.to_string())
	}
}
