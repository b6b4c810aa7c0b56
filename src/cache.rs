//! Token cache with single-flight refresh.
//!
//! [`TokenCache::get_token`] serves a cached bearer token while it is outside the refresh skew
//! window and otherwise performs the client-credentials exchange. The check-miss-then-register
//! sequence runs under one lock, so concurrent callers arriving during a miss join the same
//! in-flight refresh instead of stampeding the identity provider, and all of them observe the same
//! token or the same error. The in-flight slot is removed once the refresh settles, successful or
//! not, so the next miss after a failure starts a fresh exchange.

pub mod clock;
pub mod stats;

pub use clock::*;
pub use stats::*;

// std
use std::borrow::Cow;
// self
use crate::{
	_prelude::*,
	auth::{CachedToken, TokenSecret},
	config::Credentials,
	error::{ConfigError, TokenAcquisitionError},
	obs::{self, CacheEvent, FlowKind, FlowOutcome, FlowSpan},
	provider::IdentityProvider,
	retry::{RetryExhausted, RetryPolicy, Sleep, TokioSleep},
};

type RefreshSlot = Arc<AsyncOnceCell<Result<CachedToken>>>;

/// Identifies one credential set inside the cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(Cow<'static, str>);
impl CacheKey {
	/// Key used when a process holds a single credential set.
	pub const DEFAULT: Self = Self(Cow::Borrowed("graph-mail"));

	/// Creates a custom key.
	pub fn new(value: impl Into<String>) -> Self {
		Self(Cow::Owned(value.into()))
	}

	/// Returns the key as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Default for CacheKey {
	fn default() -> Self {
		Self::DEFAULT
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

#[derive(Default)]
struct CacheState {
	tokens: HashMap<CacheKey, CachedToken>,
	in_flight: HashMap<CacheKey, RefreshSlot>,
}

/// Long-lived token cache owned by the hosting process and shared with request handlers.
pub struct TokenCache {
	provider: Arc<dyn IdentityProvider>,
	credentials: Credentials,
	key: CacheKey,
	clock: Arc<dyn Clock>,
	sleeper: Arc<dyn Sleep>,
	retry: RetryPolicy,
	refresh_skew: Duration,
	state: Mutex<CacheState>,
	stats: CacheStats,
}
impl TokenCache {
	/// Tokens are treated as stale this long before they expire.
	pub const DEFAULT_REFRESH_SKEW: Duration = Duration::minutes(5);

	/// Creates a cache with the default clock, sleeper, retry policy, and skew.
	pub fn new(credentials: Credentials, provider: Arc<dyn IdentityProvider>) -> Self {
		Self::builder(credentials, provider).build()
	}

	/// Returns a builder for overriding the cache's collaborators.
	pub fn builder(
		credentials: Credentials,
		provider: Arc<dyn IdentityProvider>,
	) -> TokenCacheBuilder {
		TokenCacheBuilder {
			provider,
			credentials,
			key: CacheKey::DEFAULT,
			clock: Arc::new(SystemClock),
			sleeper: Arc::new(TokioSleep),
			retry: RetryPolicy::default(),
			refresh_skew: Self::DEFAULT_REFRESH_SKEW,
		}
	}

	/// Returns a usable bearer token, refreshing it when missing or inside the skew window.
	pub async fn get_token(&self) -> Result<TokenSecret> {
		self.get_cached_token().await.map(|token| token.value)
	}

	/// Same as [`TokenCache::get_token`] but returns the whole [`CachedToken`].
	pub async fn get_cached_token(&self) -> Result<CachedToken> {
		let now = self.clock.now();
		let slot = {
			let mut state = self.state.lock();

			if let Some(token) = state
				.tokens
				.get(&self.key)
				.filter(|token| token.is_usable_at(now, self.refresh_skew))
			{
				self.stats.record_hit();
				obs::cache_event(CacheEvent::Hit, self.key.as_str());

				return Ok(token.clone());
			}

			self.stats.record_miss();

			match state.in_flight.get(&self.key) {
				Some(slot) => {
					obs::cache_event(CacheEvent::Joined, self.key.as_str());

					slot.clone()
				},
				None => {
					let slot = RefreshSlot::default();

					state.in_flight.insert(self.key.clone(), slot.clone());
					obs::cache_event(CacheEvent::Miss, self.key.as_str());

					slot
				},
			}
		};

		// If the initializing caller is cancelled, another caller joined to the slot takes over.
		slot.get_or_init(|| self.refresh(&slot)).await.clone()
	}

	/// Pre-populates the cache; returns `false` (after logging) instead of failing.
	pub async fn warmup(&self) -> bool {
		match self.get_token().await {
			Ok(_) => true,
			Err(err) => {
				obs::warmup_failed(&err);

				false
			},
		}
	}

	/// Snapshot of the statistics plus the cached token's expiry.
	pub fn stats(&self) -> CacheStatsSnapshot {
		let mut snapshot = self.stats.snapshot();
		let state = self.state.lock();

		if let Some(token) = state.tokens.get(&self.key) {
			snapshot.has_cached_token = true;
			snapshot.token_expires_at = Some(token.expires_at);
		}

		snapshot
	}

	/// Drops cached tokens and in-flight markers and zeroes the statistics.
	///
	/// Callers already joined to an in-flight refresh still receive its outcome.
	pub fn clear_cache(&self) {
		{
			let mut state = self.state.lock();

			state.tokens.clear();
			state.in_flight.clear();
		}

		self.stats.reset();
	}

	async fn refresh(&self, slot: &RefreshSlot) -> Result<CachedToken> {
		const KIND: FlowKind = FlowKind::TokenRefresh;

		let span = FlowSpan::new(KIND, "get_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.fetch_new_token()).await;

		{
			let mut state = self.state.lock();

			if let Ok(token) = &result {
				state.tokens.insert(self.key.clone(), token.clone());
			}
			if state.in_flight.get(&self.key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
				state.in_flight.remove(&self.key);
			}
		}

		match &result {
			Ok(_) => {
				self.stats.record_refresh();
				obs::cache_event(CacheEvent::Refreshed, self.key.as_str());
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(err) => {
				self.stats.record_error();
				obs::cache_event(CacheEvent::RefreshFailed, self.key.as_str());
				obs::flow_failed(KIND, err);
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	async fn fetch_new_token(&self) -> Result<CachedToken> {
		// Missing configuration is never retried.
		let credentials = &self.credentials.resolve()?;
		let provider = self.provider.as_ref();
		let grant = self
			.retry
			.run(FlowKind::TokenRefresh, self.sleeper.as_ref(), move |_| {
				provider.exchange(credentials)
			})
			.await
			.map_err(|RetryExhausted { attempts, last_error }| TokenAcquisitionError {
				attempts,
				last_error: Box::new(last_error),
			})?;
		let token = CachedToken::builder()
			.secret(grant.access_token)
			.issued_at(self.clock.now())
			.expires_in(grant.expires_in)
			.build()
			.map_err(ConfigError::from)?;

		Ok(token)
	}
}
#[cfg(feature = "reqwest")]
impl TokenCache {
	/// Creates a cache backed by [`AzureAdProvider`](crate::provider::AzureAdProvider) over a
	/// fresh reqwest transport.
	pub fn azure_ad(credentials: Credentials) -> Result<Self> {
		let provider = crate::provider::AzureAdProvider::new()?;

		Ok(Self::new(credentials, Arc::new(provider)))
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("key", &self.key)
			.field("credentials", &self.credentials)
			.field("retry", &self.retry)
			.field("refresh_skew", &self.refresh_skew)
			.field("stats", &self.stats)
			.finish()
	}
}

/// Builder for [`TokenCache`].
pub struct TokenCacheBuilder {
	provider: Arc<dyn IdentityProvider>,
	credentials: Credentials,
	key: CacheKey,
	clock: Arc<dyn Clock>,
	sleeper: Arc<dyn Sleep>,
	retry: RetryPolicy,
	refresh_skew: Duration,
}
impl TokenCacheBuilder {
	/// Overrides the cache key.
	pub fn key(mut self, key: CacheKey) -> Self {
		self.key = key;

		self
	}

	/// Overrides the clock used for freshness checks and issued-at stamps.
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the sleeper used between exchange attempts.
	pub fn sleeper(mut self, sleeper: Arc<dyn Sleep>) -> Self {
		self.sleeper = sleeper;

		self
	}

	/// Overrides the exchange retry policy.
	pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides the refresh skew; negative values become zero.
	pub fn refresh_skew(mut self, skew: Duration) -> Self {
		self.refresh_skew = if skew.is_negative() { Duration::ZERO } else { skew };

		self
	}

	/// Consumes the builder and produces an empty [`TokenCache`].
	pub fn build(self) -> TokenCache {
		TokenCache {
			provider: self.provider,
			credentials: self.credentials,
			key: self.key,
			clock: self.clock,
			sleeper: self.sleeper,
			retry: self.retry,
			refresh_skew: self.refresh_skew,
			state: Mutex::default(),
			stats: CacheStats::default(),
		}
	}
}
impl Debug for TokenCacheBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCacheBuilder")
			.field("key", &self.key)
			.field("retry", &self.retry)
			.field("refresh_skew", &self.refresh_skew)
			.finish()
	}
}
