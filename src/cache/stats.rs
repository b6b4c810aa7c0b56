//! Hit/miss counters and the serializable statistics snapshot.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Thread-safe counters describing token cache behavior.
#[derive(Debug, Default)]
pub struct CacheStats {
	hits: AtomicU64,
	misses: AtomicU64,
	refreshes: AtomicU64,
	errors: AtomicU64,
}
impl CacheStats {
	/// Returns the number of lookups served from the cache.
	pub fn hits(&self) -> u64 {
		self.hits.load(Ordering::Relaxed)
	}

	/// Returns the number of lookups that found no usable token.
	pub fn misses(&self) -> u64 {
		self.misses.load(Ordering::Relaxed)
	}

	/// Returns the number of successful refreshes.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of failed refreshes.
	pub fn errors(&self) -> u64 {
		self.errors.load(Ordering::Relaxed)
	}

	/// Captures the counters plus derived totals.
	pub fn snapshot(&self) -> CacheStatsSnapshot {
		let hits = self.hits();
		let misses = self.misses();
		let total_requests = hits + misses;
		let rate = if total_requests == 0 {
			0.
		} else {
			hits as f64 / total_requests as f64 * 100.
		};

		CacheStatsSnapshot {
			hits,
			misses,
			refreshes: self.refreshes(),
			errors: self.errors(),
			total_requests,
			cache_hit_rate: format!("{rate:.1}%"),
			has_cached_token: false,
			token_expires_at: None,
		}
	}

	pub(crate) fn record_hit(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_miss(&self) {
		self.misses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_error(&self) {
		self.errors.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn reset(&self) {
		for counter in [&self.hits, &self.misses, &self.refreshes, &self.errors] {
			counter.store(0, Ordering::Relaxed);
		}
	}
}

/// Point-in-time view of [`CacheStats`] for health endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsSnapshot {
	/// Lookups served from the cache.
	pub hits: u64,
	/// Lookups that found no usable token.
	pub misses: u64,
	/// Successful refreshes.
	pub refreshes: u64,
	/// Failed refreshes.
	pub errors: u64,
	/// `hits + misses`.
	pub total_requests: u64,
	/// Hit rate formatted as a percentage with one decimal, e.g. `60.0%`.
	pub cache_hit_rate: String,
	/// Whether a token is currently cached (usable or not).
	pub has_cached_token: bool,
	/// Expiry of the cached token, if any.
	#[serde(with = "time::serde::rfc3339::option")]
	pub token_expires_at: Option<OffsetDateTime>,
}
