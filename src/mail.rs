//! Outbound mail dispatch through the Microsoft Graph `sendMail` endpoint.
//!
//! [`MailDispatcher::send_email`] validates an [`EmailRequest`], obtains a bearer token from the
//! shared [`TokenCache`], and POSTs the Graph payload through [`send_with_retry`]. Server errors
//! and transport failures are retried with the dispatcher's [`RetryPolicy`]; any other non-2xx
//! status is returned after a single attempt. [`MailDispatcher::deliver`] layers a
//! [`DeliveryPolicy`] on top so form handlers can mask failures without losing them.

pub mod forms;

mod payload;

pub use forms::*;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpRequest, HttpResponse,
	http::{
		Method,
		header::{AUTHORIZATION, CONTENT_TYPE},
	},
};
// self
use crate::{
	_prelude::*,
	cache::TokenCache,
	config::MailSettings,
	error::{ConfigError, MailDeliveryError},
	http::{self, HttpTransport, ResponseMetadataSlot},
	mail::payload::SendMailPayload,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	retry::{RetryPolicy, Sleep, TokioSleep},
};
#[cfg(feature = "reqwest")]
use crate::{config::MailerConfig, http::ReqwestHttpClient, provider::AzureAdProvider};

/// Fixed recipient lists per website form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormRecipients {
	/// Recipients of contact-form submissions.
	pub contact: Vec<String>,
	/// Recipients of consultation requests.
	pub consultation: Vec<String>,
}

/// Reply-to address attached to a message, usually the form submitter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTo {
	/// Email address.
	pub email: String,
	/// Display name.
	pub name: String,
}
impl ReplyTo {
	/// Creates a reply-to address.
	pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
		Self { email: email.into(), name: name.into() }
	}
}

/// Fully-formed outbound message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
	/// Subject line.
	pub subject: String,
	/// HTML body; callers escape any user input beforehand.
	pub html_body: String,
	/// Ordered recipient addresses.
	pub recipients: Vec<String>,
	/// Optional reply-to address.
	#[serde(default)]
	pub reply_to: Option<ReplyTo>,
}
impl EmailRequest {
	/// Creates a request without a reply-to address.
	pub fn new<I, S>(
		subject: impl Into<String>,
		html_body: impl Into<String>,
		recipients: I,
	) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			subject: subject.into(),
			html_body: html_body.into(),
			recipients: recipients.into_iter().map(Into::into).collect(),
			reply_to: None,
		}
	}

	/// Sets the reply-to address.
	pub fn with_reply_to(mut self, reply_to: ReplyTo) -> Self {
		self.reply_to = Some(reply_to);

		self
	}

	/// Checks the preconditions enforced before any network call.
	pub fn validate(&self) -> Result<(), EmailRequestError> {
		if self.subject.trim().is_empty() {
			return Err(EmailRequestError::EmptySubject);
		}
		if self.html_body.trim().is_empty() {
			return Err(EmailRequestError::EmptyBody);
		}
		if self.recipients.is_empty() {
			return Err(EmailRequestError::NoRecipients);
		}
		if let Some(index) = self.recipients.iter().position(|r| r.trim().is_empty()) {
			return Err(EmailRequestError::BlankRecipient { index });
		}
		if self.reply_to.as_ref().is_some_and(|reply_to| reply_to.email.trim().is_empty()) {
			return Err(EmailRequestError::BlankReplyTo);
		}

		Ok(())
	}
}

/// Precondition violations reported by [`EmailRequest::validate`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum EmailRequestError {
	/// Subject is empty or whitespace.
	#[error("Email subject is empty.")]
	EmptySubject,
	/// Body is empty or whitespace.
	#[error("Email body is empty.")]
	EmptyBody,
	/// Recipient list is empty.
	#[error("Email has no recipients.")]
	NoRecipients,
	/// A recipient address is blank.
	#[error("Recipient at position {index} is blank.")]
	BlankRecipient {
		/// Position in the recipient list.
		index: usize,
	},
	/// Reply-to address is blank.
	#[error("Reply-to address is blank.")]
	BlankReplyTo,
}

/// Stages of a single [`MailDispatcher::send_email`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendState {
	/// Request accepted, nothing sent yet.
	Idle,
	/// Bearer token obtained from the cache.
	TokenAcquired,
	/// POST in flight.
	Sending,
	/// Previous attempt failed with a retryable error; waiting for the backoff delay.
	Retrying,
	/// Endpoint accepted the message.
	Succeeded,
	/// Send failed terminally.
	Failed,
}
impl SendState {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			SendState::Idle => "idle",
			SendState::TokenAcquired => "token_acquired",
			SendState::Sending => "sending",
			SendState::Retrying => "retrying",
			SendState::Succeeded => "succeeded",
			SendState::Failed => "failed",
		}
	}

	/// Returns `true` for [`SendState::Succeeded`] and [`SendState::Failed`].
	pub const fn is_terminal(self) -> bool {
		matches!(self, SendState::Succeeded | SendState::Failed)
	}
}
impl Display for SendState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// How a form handler treats a failed delivery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryPolicy {
	/// Log and count the failure, then report [`DeliveryOutcome::Suppressed`].
	BestEffort,
	/// Propagate the failure to the caller.
	#[default]
	Required,
}

/// Result of [`MailDispatcher::deliver`].
#[derive(Clone, Debug)]
pub enum DeliveryOutcome {
	/// Endpoint accepted the message.
	Delivered,
	/// Delivery failed under [`DeliveryPolicy::BestEffort`]; the error was already logged.
	Suppressed(Error),
}
impl DeliveryOutcome {
	/// Returns `true` when the message was accepted.
	pub fn is_delivered(&self) -> bool {
		matches!(self, Self::Delivered)
	}
}

/// Sends mail on behalf of the form handlers.
pub struct MailDispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	cache: Arc<TokenCache>,
	transport: Arc<C>,
	settings: MailSettings,
	retry: RetryPolicy,
	sleeper: Arc<dyn Sleep>,
}
impl<C> MailDispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a dispatcher with the default retry policy and tokio-backed sleeper.
	pub fn new(
		cache: Arc<TokenCache>,
		transport: impl Into<Arc<C>>,
		settings: MailSettings,
	) -> Self {
		Self {
			cache,
			transport: transport.into(),
			settings,
			retry: RetryPolicy::default(),
			sleeper: Arc::new(TokioSleep),
		}
	}

	/// Overrides the retry policy.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides the sleeper used between attempts.
	pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleep>) -> Self {
		self.sleeper = sleeper;

		self
	}

	/// Returns the shared token cache.
	pub fn cache(&self) -> &Arc<TokenCache> {
		&self.cache
	}

	/// Returns the mail endpoint settings.
	pub fn settings(&self) -> &MailSettings {
		&self.settings
	}

	/// Sends one message, retrying server errors and transport failures.
	///
	/// No retries happen above this method; the token fetch carries its own retry budget.
	pub async fn send_email(&self, request: &EmailRequest) -> Result<()> {
		const KIND: FlowKind = FlowKind::MailSend;

		let span = FlowSpan::new(KIND, "send_email");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.send_now(request)).await;

		match &result {
			Ok(()) => {
				obs::send_state(SendState::Succeeded, 0);
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(err) => {
				obs::send_state(SendState::Failed, 0);
				obs::flow_failed(KIND, err);
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	/// Sends one message and applies `policy` to a failure.
	pub async fn deliver(
		&self,
		request: &EmailRequest,
		policy: DeliveryPolicy,
	) -> Result<DeliveryOutcome> {
		match (self.send_email(request).await, policy) {
			(Ok(()), _) => Ok(DeliveryOutcome::Delivered),
			(Err(err), DeliveryPolicy::BestEffort) => {
				obs::delivery_suppressed(&err);
				obs::record_flow_outcome(FlowKind::MailSend, FlowOutcome::Suppressed);

				Ok(DeliveryOutcome::Suppressed(err))
			},
			(Err(err), DeliveryPolicy::Required) => Err(err),
		}
	}

	/// Delivers a contact-form submission on a best-effort basis.
	pub async fn submit_contact(&self, form: &ContactForm) -> Result<DeliveryOutcome> {
		let request = form.to_email_request(&self.settings.recipients);

		self.deliver(&request, DeliveryPolicy::BestEffort).await
	}

	/// Delivers a consultation request; failures propagate.
	pub async fn submit_consultation(&self, form: &ConsultationForm) -> Result<DeliveryOutcome> {
		let request = form.to_email_request(&self.settings.recipients);

		self.deliver(&request, DeliveryPolicy::Required).await
	}

	async fn send_now(&self, request: &EmailRequest) -> Result<()> {
		obs::send_state(SendState::Idle, 0);
		request.validate()?;

		let endpoint = self.settings.send_mail_endpoint()?;
		let token = self.cache.get_token().await?;

		obs::send_state(SendState::TokenAcquired, 0);

		let body =
			serde_json::to_vec(&SendMailPayload::from_request(request)).map_err(ConfigError::from)?;
		let http_request = oauth2::http::Request::builder()
			.method(Method::POST)
			.uri(endpoint.as_str())
			.header(AUTHORIZATION, token.bearer_header())
			.header(CONTENT_TYPE, "application/json")
			.body(body)
			.map_err(ConfigError::from)?;

		obs::mail_dispatched(&request.recipients, &request.subject);

		let response = send_with_retry(
			self.transport.as_ref(),
			&http_request,
			&self.retry,
			self.sleeper.as_ref(),
		)
		.await?;

		if !response.status().is_success() {
			return Err(MailDeliveryError::from_response(&response).into());
		}

		Ok(())
	}
}
#[cfg(feature = "reqwest")]
impl MailDispatcher<ReqwestHttpClient> {
	/// Wires a [`TokenCache`] backed by [`AzureAdProvider`] and a dispatcher over one shared
	/// reqwest transport.
	pub fn from_config(config: MailerConfig) -> Result<Self> {
		let transport = Arc::new(ReqwestHttpClient::new()?);
		let provider = AzureAdProvider::<ReqwestHttpClient>::with_http_client(transport.clone());
		let cache = Arc::new(TokenCache::new(config.credentials, Arc::new(provider)));

		Ok(Self::new(cache, transport, config.mail))
	}
}
impl<C> Debug for MailDispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MailDispatcher")
			.field("cache", &self.cache)
			.field("settings", &self.settings)
			.field("retry", &self.retry)
			.finish()
	}
}

/// POSTs `request` until it gets a non-5xx response or the attempt ceiling is reached.
///
/// A 2xx or any other non-5xx response is returned as-is after the attempt that produced it.
/// Server errors and transport failures are retried after `policy.backoff(attempt)`. When the
/// last attempt still fails, the 5xx surfaces as [`MailDeliveryError`] and a network failure as
/// [`TransportError`](crate::error::TransportError).
pub async fn send_with_retry<C>(
	transport: &C,
	request: &HttpRequest,
	policy: &RetryPolicy,
	sleeper: &dyn Sleep,
) -> Result<HttpResponse>
where
	C: ?Sized + HttpTransport,
{
	policy
		.run(FlowKind::MailSend, sleeper, |attempt| {
			let handle = transport.with_metadata(ResponseMetadataSlot::default());
			let request = http::replay_request(request);

			if attempt > 1 {
				obs::send_state(SendState::Retrying, attempt);
			}

			obs::send_state(SendState::Sending, attempt);

			async move {
				let response = handle
					.call(request)
					.await
					.map_err(|err| http::map_transport_error("mail", err))?;

				if !response.status().is_success() {
					let rejected = MailDeliveryError::from_response(&response);

					if rejected.is_server_error() {
						return Err(rejected.into());
					}
				}

				Ok(response)
			}
		})
		.await
		.map_err(|exhausted| exhausted.last_error)
}
