// self
use crate::{
	_prelude::*,
	mail::SendState,
	obs::{CacheEvent, FlowKind},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by token refresh and mail send flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("graph_mailer.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

pub(crate) fn cache_event(event: CacheEvent, key: &str) {
	super::record_cache_event(event);

	#[cfg(feature = "tracing")]
	{
		match event {
			CacheEvent::Refreshed =>
				tracing::info!(key, event = event.as_str(), "token cache updated"),
			CacheEvent::RefreshFailed =>
				tracing::warn!(key, event = event.as_str(), "token refresh failed"),
			_ => tracing::debug!(key, event = event.as_str(), "token cache lookup"),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = key;
	}
}

pub(crate) fn retry_scheduled(
	kind: FlowKind,
	attempt: u32,
	max_attempts: u32,
	delay: Duration,
	err: &Error,
) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			flow = kind.as_str(),
			attempt,
			max_attempts,
			delay_ms = u64::try_from(delay.whole_milliseconds()).unwrap_or(u64::MAX),
			error = %err,
			"attempt failed, retrying"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, attempt, max_attempts, delay, err);
	}
}

pub(crate) fn flow_failed(kind: FlowKind, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::error!(flow = kind.as_str(), error = %err, "flow failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, err);
	}
}

pub(crate) fn warmup_failed(err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(error = %err, "token warmup failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = err;
	}
}

pub(crate) fn mail_dispatched(recipients: &[String], subject: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(recipients = ?recipients, subject, "sending mail");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (recipients, subject);
	}
}

pub(crate) fn send_state(state: SendState, attempt: u32) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(state = state.as_str(), attempt, "mail send state changed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (state, attempt);
	}
}

pub(crate) fn delivery_suppressed(err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::error!(error = %err, "mail delivery failed; caller masks the failure");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = err;
	}
}
