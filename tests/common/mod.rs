//! Deterministic fakes shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use parking_lot::Mutex;
use time::Duration;
// self
use graph_mailer::{
	cache::TokenCache,
	config::{Credentials, ResolvedCredentials},
	error::TransientError,
	http::{HttpTransport, ResponseMetadata, ResponseMetadataSlot},
	oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode},
	provider::{ExchangeFuture, IdentityProvider, TokenGrant},
	retry::{Sleep, SleepFuture},
};

pub fn credentials() -> Credentials {
	Credentials::new("tenant-it", "client-it", "secret-it")
}

/// Identity provider handing out `token-1`, `token-2`, ... and failing the first `fail_first`
/// calls.
pub struct ScriptedProvider {
	calls: AtomicUsize,
	fail_first: usize,
	delay: Option<std::time::Duration>,
	expires_in: Duration,
}
impl ScriptedProvider {
	pub fn new(expires_in: Duration) -> Self {
		Self { calls: AtomicUsize::new(0), fail_first: 0, delay: None, expires_in }
	}

	pub fn failing_first(mut self, fail_first: usize) -> Self {
		self.fail_first = fail_first;

		self
	}

	pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
		self.delay = Some(delay);

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl IdentityProvider for ScriptedProvider {
	fn exchange<'a>(&'a self, credentials: &'a ResolvedCredentials) -> ExchangeFuture<'a> {
		Box::pin(async move {
			assert_eq!(credentials.tenant_id, "tenant-it");

			let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}
			if call <= self.fail_first {
				return Err(TransientError::TokenEndpoint {
					message: format!("scripted failure {call}"),
					status: Some(503),
				}
				.into());
			}

			Ok(TokenGrant::new(format!("token-{call}"), self.expires_in))
		})
	}
}

/// Builds a cache over `provider` whose retries never actually wait.
pub fn cache_with(provider: Arc<ScriptedProvider>, sleeper: Arc<RecordingSleep>) -> TokenCache {
	TokenCache::builder(credentials(), provider).sleeper(sleeper).build()
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleep {
	delays: Mutex<Vec<Duration>>,
}
impl RecordingSleep {
	pub fn delays(&self) -> Vec<Duration> {
		self.delays.lock().clone()
	}
}
impl Sleep for RecordingSleep {
	fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
		self.delays.lock().push(duration);

		Box::pin(async {})
	}
}

#[derive(Debug)]
pub struct ScriptedNetworkError;
impl Display for ScriptedNetworkError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Scripted connection reset.")
	}
}
impl StdError for ScriptedNetworkError {}

/// One scripted response from [`ScriptedTransport`].
#[derive(Clone, Copy, Debug)]
pub enum Step {
	Status(u16),
	NetworkFailure,
}

/// Request as seen by [`ScriptedTransport`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
	pub method: String,
	pub uri: String,
	pub authorization: Option<String>,
	pub content_type: Option<String>,
	pub body: serde_json::Value,
}

#[derive(Default)]
struct Script {
	steps: VecDeque<Step>,
	fallback: Option<Step>,
	requests: Vec<RecordedRequest>,
}

/// Mail transport answering from a script; the last step repeats once the script runs out.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
	script: Arc<Mutex<Script>>,
}
impl ScriptedTransport {
	pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
		let steps = steps.into_iter().collect::<VecDeque<_>>();
		let fallback = steps.back().copied();

		Self { script: Arc::new(Mutex::new(Script { steps, fallback, requests: Vec::new() })) }
	}

	pub fn always(status: u16) -> Self {
		Self::new([Step::Status(status)])
	}

	pub fn attempts(&self) -> usize {
		self.script.lock().requests.len()
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.script.lock().requests.clone()
	}
}
impl HttpTransport for ScriptedTransport {
	type Handle = ScriptedHandle;
	type TransportError = ScriptedNetworkError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ScriptedHandle { script: self.script.clone(), slot }
	}
}

pub struct ScriptedHandle {
	script: Arc<Mutex<Script>>,
	slot: ResponseMetadataSlot,
}
impl<'a> AsyncHttpClient<'a> for ScriptedHandle {
	type Error = HttpClientError<ScriptedNetworkError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		let script = self.script.clone();
		let slot = self.slot.clone();

		Box::pin(async move {
			slot.take();

			let step = {
				let mut script = script.lock();
				let header = |name: &str| {
					request
						.headers()
						.get(name)
						.and_then(|value| value.to_str().ok())
						.map(str::to_owned)
				};
				let recorded = RecordedRequest {
					method: request.method().to_string(),
					uri: request.uri().to_string(),
					authorization: header("authorization"),
					content_type: header("content-type"),
					body: serde_json::from_slice(request.body()).unwrap_or_default(),
				};

				script.requests.push(recorded);
				script.steps.pop_front().or(script.fallback).unwrap_or(Step::Status(202))
			};

			match step {
				Step::Status(status) => {
					let mut response = HttpResponse::new(format!("status {status}").into_bytes());

					*response.status_mut() =
						StatusCode::from_u16(status).expect("Scripted status should be valid.");

					slot.store(ResponseMetadata { status: Some(status) });

					Ok(response)
				},
				Step::NetworkFailure =>
					Err(HttpClientError::Reqwest(Box::new(ScriptedNetworkError))),
			}
		})
	}
}
