//! Immutable cached token struct, freshness helpers, and builder.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Errors produced by [`CachedTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CachedTokenBuilderError {
	/// Issued when no token value was provided.
	#[error("Token value is required.")]
	MissingValue,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the expiry does not fall after the issued-at instant.
	#[error("Expiry must be later than the issued-at instant.")]
	NonPositiveLifetime,
	/// Issued when the relative expiry lands outside the representable date range.
	#[error("Expiry is out of range.")]
	ExpiryOutOfRange,
}

/// Bearer token held by the cache. Replaced wholesale on every refresh, never mutated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
	/// Bearer token secret; callers must avoid logging it.
	pub value: TokenSecret,
	/// Instant the token was fetched.
	pub issued_at: OffsetDateTime,
	/// Instant after which the provider rejects the token.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Returns a builder that enforces `expires_at > issued_at`.
	pub fn builder() -> CachedTokenBuilder {
		CachedTokenBuilder::default()
	}

	/// Returns `true` if the token may still be handed out at `now`, keeping `skew` in reserve.
	pub fn is_usable_at(&self, now: OffsetDateTime, skew: Duration) -> bool {
		now < self.expires_at - skew
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("value", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`CachedToken`].
#[derive(Clone, Debug, Default)]
pub struct CachedTokenBuilder {
	value: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl CachedTokenBuilder {
	/// Provides the bearer token value.
	pub fn value(mut self, value: impl Into<String>) -> Self {
		self.value = Some(TokenSecret::new(value));

		self
	}

	/// Provides an already wrapped bearer token value.
	pub fn secret(mut self, secret: TokenSecret) -> Self {
		self.value = Some(secret);

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`CachedToken`].
	pub fn build(self) -> Result<CachedToken, CachedTokenBuilderError> {
		let value = self.value.ok_or(CachedTokenBuilderError::MissingValue)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) =>
				issued_at.checked_add(delta).ok_or(CachedTokenBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(CachedTokenBuilderError::MissingExpiry),
		};

		if expires_at <= issued_at {
			return Err(CachedTokenBuilderError::NonPositiveLifetime);
		}

		Ok(CachedToken { value, issued_at, expires_at })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn token(issued: OffsetDateTime, expires: OffsetDateTime) -> CachedToken {
		CachedToken::builder()
			.value("access")
			.issued_at(issued)
			.expires_at(expires)
			.build()
			.expect("Cached token fixture should build.")
	}

	#[test]
	fn usable_window_honors_refresh_skew() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let skew = Duration::minutes(5);
		let stale = token(now - Duration::minutes(55), now + Duration::minutes(4));
		let fresh = token(now - Duration::minutes(50), now + Duration::minutes(10));

		assert!(!stale.is_usable_at(now, skew));
		assert!(fresh.is_usable_at(now, skew));
	}

	#[test]
	fn usable_window_is_exclusive_at_the_boundary() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let boundary = token(now - Duration::hours(1), now + Duration::minutes(5));

		assert!(!boundary.is_usable_at(now, Duration::minutes(5)));
		assert!(boundary.is_usable_at(now - Duration::seconds(1), Duration::minutes(5)));
	}

	#[test]
	fn builder_handles_relative_expiry() {
		let record = CachedToken::builder()
			.value("secret")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::hours(1))
			.build()
			.expect("Cached token builder should support relative expiry calculations.");

		assert_eq!(record.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
	}

	#[test]
	fn builder_rejects_invalid_lifetimes() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let err = CachedToken::builder()
			.value("secret")
			.issued_at(issued)
			.expires_in(Duration::ZERO)
			.build()
			.expect_err("Zero lifetime should be rejected.");

		assert_eq!(err, CachedTokenBuilderError::NonPositiveLifetime);

		let err = CachedToken::builder()
			.issued_at(issued)
			.expires_in(Duration::hours(1))
			.build()
			.expect_err("Missing value should be rejected.");

		assert_eq!(err, CachedTokenBuilderError::MissingValue);

		let err = CachedToken::builder()
			.value("secret")
			.build()
			.expect_err("Missing expiry should be rejected.");

		assert_eq!(err, CachedTokenBuilderError::MissingExpiry);
	}

	#[test]
	fn builder_rejects_overflowing_relative_expiry() {
		let err = CachedToken::builder()
			.value("secret")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::seconds(i64::MAX / 2))
			.build()
			.expect_err("Expiry beyond the representable range should be rejected.");

		assert_eq!(err, CachedTokenBuilderError::ExpiryOutOfRange);
	}

	#[test]
	fn debug_output_redacts_value() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let rendered = format!("{:?}", token(now, now + Duration::hours(1)));

		assert!(rendered.contains("<redacted>"));
		assert!(!rendered.contains("access"));
	}
}
