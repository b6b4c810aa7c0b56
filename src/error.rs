//! Crate-level error types shared across the token cache, identity provider, and mail dispatch.
//!
//! Every error is `Clone` so the outcome of one in-flight token refresh can be handed to each
//! caller that joined it.

// self
use crate::{_prelude::*, auth::CachedTokenBuilderError, mail::EmailRequestError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; retrying cannot fix it.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Identity-provider exchange failed after every retry.
	#[error(transparent)]
	TokenAcquisition(#[from] TokenAcquisitionError),
	/// Mail endpoint answered with a non-success status.
	#[error(transparent)]
	MailDelivery(#[from] MailDeliveryError),
	/// Outbound email request violates a precondition.
	#[error(transparent)]
	InvalidRequest(#[from] EmailRequestError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Identity provider rejected the client credentials.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
}

/// Configuration and request-construction failures.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// A required credential parameter is absent or blank.
	#[error("Required configuration value `{name}` is missing.")]
	MissingCredential {
		/// Name of the missing parameter.
		name: &'static str,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error("HTTP request could not be constructed.")]
	HttpRequest {
		/// Underlying request builder failure.
		#[source]
		source: Arc<oauth2::http::Error>,
	},
	/// An endpoint URL cannot be parsed or joined.
	#[error("Endpoint `{endpoint}` is not a valid URL.")]
	InvalidEndpoint {
		/// Endpoint label.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Mail payload could not be encoded as JSON.
	#[error("Mail payload could not be encoded.")]
	PayloadEncoding {
		/// Underlying serializer failure.
		#[source]
		source: Arc<serde_json::Error>,
	},
	/// Cached token builder validation failed.
	#[error("Unable to build cached token.")]
	TokenBuild(#[from] CachedTokenBuilderError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::HttpRequest { source: Arc::new(e) }
	}
}
impl From<serde_json::Error> for ConfigError {
	fn from(e: serde_json::Error) -> Self {
		Self::PayloadEncoding { source: Arc::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Raised once the credential exchange exhausted its attempts.
#[derive(Clone, Debug, ThisError)]
#[error("Token acquisition failed after {attempts} attempt(s).")]
pub struct TokenAcquisitionError {
	/// Number of exchange attempts performed.
	pub attempts: u32,
	/// Error reported by the final attempt.
	#[source]
	pub last_error: Box<Error>,
}

/// Mail endpoint rejected the request or kept failing.
#[derive(Clone, Debug, ThisError)]
#[error("Mail endpoint responded with HTTP {status}.")]
pub struct MailDeliveryError {
	/// HTTP status code of the final response.
	pub status: u16,
	/// Response body, lossily decoded as UTF-8.
	pub body: String,
}
impl MailDeliveryError {
	/// Captures status and body from a mail endpoint response.
	pub fn from_response(response: &oauth2::HttpResponse) -> Self {
		Self {
			status: response.status().as_u16(),
			body: String::from_utf8_lossy(response.body()).into_owned(),
		}
	}

	/// Returns `true` when the status is in the 5xx range.
	pub fn is_server_error(&self) -> bool {
		(500..600).contains(&self.status)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Clone, Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an error response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or crate-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint response parsed but cannot be cached.
	#[error("Token endpoint returned an unusable token: {message}.")]
	InvalidTokenResponse {
		/// Description of the rejected field.
		message: &'static str,
	},
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling `{endpoint}`.")]
	Network {
		/// Endpoint label (`token` or `mail`).
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Transport failed without a typed error.
	#[error("HTTP client error occurred while calling `{endpoint}`: {message}.")]
	Other {
		/// Endpoint label (`token` or `mail`).
		endpoint: &'static str,
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(endpoint: &'static str, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { endpoint, source: Arc::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_acquisition_error_exposes_last_error_as_source() {
		let last = Error::from(TransientError::TokenEndpoint {
			message: "upstream unavailable".into(),
			status: Some(503),
		});
		let err = Error::from(TokenAcquisitionError { attempts: 3, last_error: Box::new(last) });

		assert_eq!(err.to_string(), "Token acquisition failed after 3 attempt(s).");

		let source = StdError::source(&err)
			.expect("Token acquisition error should expose the final attempt as its source.");

		assert!(source.to_string().contains("upstream unavailable"));
	}

	#[test]
	fn mail_delivery_error_classifies_server_errors() {
		let server = MailDeliveryError { status: 503, body: String::new() };
		let client = MailDeliveryError { status: 400, body: "bad request".into() };

		assert!(server.is_server_error());
		assert!(!client.is_server_error());
		assert_eq!(client.to_string(), "Mail endpoint responded with HTTP 400.");
	}

	#[test]
	fn missing_credential_names_the_parameter() {
		let err = Error::from(ConfigError::MissingCredential { name: "client_secret" });

		assert_eq!(err.to_string(), "Required configuration value `client_secret` is missing.");
	}
}
