//! Optional observability helpers for token refresh and mail dispatch flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `graph_mailer.flow` with the `flow` and
//!   `stage` fields, plus events for cache hits/misses, retries, warmups, and dispatches.
//! - Enable `metrics` to increment the `graph_mailer_flow_total` counter (labeled by `flow` +
//!   `outcome`) and the `graph_mailer_token_cache_total` counter (labeled by `event`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Identity-provider exchange performed on a cache miss.
	TokenRefresh,
	/// Outbound mail POST.
	MailSend,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::TokenRefresh => "token_refresh",
			FlowKind::MailSend => "mail_send",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Failure logged but hidden from the caller by a best-effort policy.
	Suppressed,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Suppressed => "suppressed",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Token cache events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheEvent {
	/// A usable token was served from the cache.
	Hit,
	/// No usable token was cached.
	Miss,
	/// A miss joined a refresh that was already in flight.
	Joined,
	/// A refresh stored a new token.
	Refreshed,
	/// A refresh failed.
	RefreshFailed,
}
impl CacheEvent {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheEvent::Hit => "hit",
			CacheEvent::Miss => "miss",
			CacheEvent::Joined => "joined",
			CacheEvent::Refreshed => "refreshed",
			CacheEvent::RefreshFailed => "refresh_failed",
		}
	}
}
impl Display for CacheEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
