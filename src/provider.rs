//! Identity-provider exchange contract and the Azure AD client-credentials implementation.

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RequestTokenError, Scope,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::ResolvedCredentials,
	error::TransientError,
	http::{self, HttpTransport, ResponseMetadataSlot},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Boxed future returned by [`IdentityProvider::exchange`].
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenGrant>> + 'a + Send>>;

/// Exchanges a credential set for a bearer token.
///
/// Called only by the token cache's fetch path, once per attempt.
pub trait IdentityProvider
where
	Self: Send + Sync,
{
	/// Performs one credential exchange.
	fn exchange<'a>(&'a self, credentials: &'a ResolvedCredentials) -> ExchangeFuture<'a>;
}

/// Bearer token plus its relative lifetime, as returned by the identity provider.
#[derive(Clone, Debug)]
pub struct TokenGrant {
	/// Bearer token secret.
	pub access_token: TokenSecret,
	/// Lifetime reported by the provider.
	pub expires_in: Duration,
}
impl TokenGrant {
	/// Creates a grant from raw parts.
	pub fn new(access_token: impl Into<String>, expires_in: Duration) -> Self {
		Self { access_token: TokenSecret::new(access_token), expires_in }
	}
}

/// Client-credentials grant against the Azure AD v2.0 token endpoint.
///
/// The client secret travels in the request body and the configured scope (by default
/// `https://graph.microsoft.com/.default`) is requested on every exchange.
pub struct AzureAdProvider<C>
where
	C: ?Sized + HttpTransport,
{
	http_client: Arc<C>,
}
impl<C> AzureAdProvider<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a provider that reuses the caller-provided transport.
	pub fn with_http_client(http_client: impl Into<Arc<C>>) -> Self {
		Self { http_client: http_client.into() }
	}

	fn oauth_client(credentials: &ResolvedCredentials) -> Result<ConfiguredBasicClient> {
		let token_url = TokenUrl::from_url(credentials.token_endpoint()?);

		Ok(BasicClient::new(ClientId::new(credentials.client_id.clone()))
			.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
			.set_auth_type(AuthType::RequestBody)
			.set_token_uri(token_url))
	}

	async fn exchange_now(&self, credentials: &ResolvedCredentials) -> Result<TokenGrant> {
		let oauth_client = Self::oauth_client(credentials)?;
		let slot = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(slot.clone());
		let response = oauth_client
			.exchange_client_credentials()
			.add_scope(Scope::new(credentials.scope.clone()))
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(err, slot.status()))?;
		let expires_in = response
			.expires_in()
			.ok_or(TransientError::InvalidTokenResponse { message: "expires_in is missing" })?;
		let expires_in = Duration::try_from(expires_in).map_err(|_| {
			TransientError::InvalidTokenResponse { message: "expires_in is out of range" }
		})?;

		if !expires_in.is_positive() {
			return Err(
				TransientError::InvalidTokenResponse { message: "expires_in must be positive" }
					.into(),
			);
		}

		Ok(TokenGrant {
			access_token: TokenSecret::new(response.access_token().secret()),
			expires_in,
		})
	}
}
#[cfg(feature = "reqwest")]
impl AzureAdProvider<ReqwestHttpClient> {
	/// Creates a provider backed by a fresh reqwest transport with the default timeout.
	pub fn new() -> Result<Self> {
		Ok(Self::with_http_client(ReqwestHttpClient::new()?))
	}
}
impl<C> IdentityProvider for AzureAdProvider<C>
where
	C: ?Sized + HttpTransport,
{
	fn exchange<'a>(&'a self, credentials: &'a ResolvedCredentials) -> ExchangeFuture<'a> {
		Box::pin(self.exchange_now(credentials))
	}
}
impl<C> Debug for AzureAdProvider<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("AzureAdProvider(..)")
	}
}

fn map_request_error<E>(
	err: BasicRequestTokenError<oauth2::HttpClientError<E>>,
	status: Option<u16>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, status),
		RequestTokenError::Request(error) => http::map_transport_error("token", error),
		RequestTokenError::Parse(error, _body) =>
			TransientError::TokenResponseParse { source: Arc::new(error), status }.into(),
		RequestTokenError::Other(message) =>
			TransientError::TokenEndpoint { message, status }.into(),
	}
}

fn map_server_response_error(response: BasicErrorResponse, status: Option<u16>) -> Error {
	let message = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	match response.error() {
		BasicErrorResponseType::InvalidClient | BasicErrorResponseType::UnauthorizedClient =>
			Error::InvalidClient { reason: message },
		_ => TransientError::TokenEndpoint { message, status }.into(),
	}
}
