//! Caller-supplied deadlines for network-bound operations.

// crates.io
use tokio::time;
// self
use crate::_prelude::*;

/// Point in time after which a network-bound operation gives up with [`Error::Timeout`].
///
/// Dropping the operation's future is equivalent to cancelling it. Cache writes only happen after
/// the guarded future has fully completed, so neither path commits partial state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);
impl Deadline {
	/// No deadline; the operation is bounded only by transport timeouts.
	pub const fn none() -> Self {
		Self(None)
	}

	/// Deadline at an absolute instant.
	pub const fn at(instant: Instant) -> Self {
		Self(Some(instant))
	}

	/// Deadline `timeout` from now.
	pub fn after(timeout: Duration) -> Self {
		Self(Some(Instant::now() + timeout))
	}

	/// The configured instant, if any.
	pub fn instant(&self) -> Option<Instant> {
		self.0
	}

	/// Whether the deadline has already passed.
	pub fn is_expired(&self) -> bool {
		self.0.is_some_and(|at| Instant::now() >= at)
	}

	/// Drive `fut` to completion unless the deadline fires first.
	///
	/// An already expired deadline fails without polling `fut`.
	pub async fn run<F, T>(self, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		match self.0 {
			Some(at) if Instant::now() >= at => Err(Error::Timeout),
			Some(at) => time::timeout_at(at, fut).await.map_err(|_| Error::Timeout)?,
			None => fut.await,
		}
	}
}
impl From<Duration> for Deadline {
	fn from(value: Duration) -> Self {
		Self::after(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn expired_deadline_reports_timeout() {
		let deadline = Deadline::after(Duration::from_secs(1));
		let result = deadline
			.run(async {
				time::sleep(Duration::from_secs(5)).await;

				Ok(())
			})
			.await;

		assert!(matches!(result, Err(Error::Timeout)));
		assert!(deadline.is_expired());
	}

	#[tokio::test]
	async fn absent_deadline_passes_through() {
		let value = Deadline::none().run(async { Ok(7) }).await.expect("value");

		assert_eq!(value, 7);
		assert!(!Deadline::none().is_expired());
	}
}
