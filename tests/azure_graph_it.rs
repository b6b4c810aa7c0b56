#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use time::Duration;
// self
use graph_mailer::{
	cache::TokenCache,
	config::{Credentials, MailSettings, MailerConfig},
	error::Error,
	mail::{EmailRequest, MailDispatcher},
	provider::AzureAdProvider,
	retry::RetryPolicy,
	url::Url,
};

const TOKEN_PATH: &str = "/tenant-it/oauth2/v2.0/token";
const SEND_MAIL_PATH: &str = "/v1.0/users/noreply@example.com/sendMail";
const TOKEN_BODY: &str =
	"{\"access_token\":\"graph-token\",\"token_type\":\"Bearer\",\"expires_in\":3599}";
const INVALID_CLIENT_BODY: &str = "{\"error\":\"invalid_client\",\
	\"error_description\":\"AADSTS7000215: Invalid client secret provided.\"}";

fn config(server: &MockServer) -> MailerConfig {
	let authority = Url::parse(&server.base_url()).expect("Mock authority should parse.");
	let graph_base = Url::parse(&server.url("/v1.0")).expect("Mock Graph base should parse.");

	MailerConfig {
		credentials: Credentials::new("tenant-it", "client-it", "secret-it")
			.with_authority(authority),
		mail: MailSettings::new("noreply@example.com").with_graph_base(graph_base),
	}
}

#[tokio::test]
async fn token_exchange_and_send_mail_round_trip() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let mail_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(SEND_MAIL_PATH)
				.header("authorization", "Bearer graph-token")
				.header("content-type", "application/json");
			then.status(202);
		})
		.await;
	let dispatcher = MailDispatcher::from_config(config(&server))
		.expect("Dispatcher should build from configuration.");
	let request = EmailRequest::new("Welcome", "<p>Hi</p>", ["ops@example.com"]);

	dispatcher.send_email(&request).await.expect("First send should succeed.");
	dispatcher.send_email(&request).await.expect("Second send should reuse the cached token.");

	token_mock.assert_calls_async(1).await;
	mail_mock.assert_calls_async(2).await;

	let stats = dispatcher.cache().stats();

	assert_eq!(stats.hits, 1);
	assert_eq!(stats.misses, 1);
	assert!(stats.has_cached_token);
}

#[tokio::test]
async fn rejected_client_credentials_are_reported() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(401).header("content-type", "application/json").body(INVALID_CLIENT_BODY);
		})
		.await;
	let provider = AzureAdProvider::new().expect("Provider should build.");
	let cache = TokenCache::builder(config(&server).credentials, Arc::new(provider))
		.retry_policy(RetryPolicy::new(2, Duration::milliseconds(10)))
		.build();
	let err = cache.get_token().await.expect_err("Invalid client should fail the fetch.");

	match err {
		Error::TokenAcquisition(err) => {
			assert_eq!(err.attempts, 2);
			assert!(matches!(
				*err.last_error,
				Error::InvalidClient { ref reason } if reason.contains("AADSTS7000215")
			));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	token_mock.assert_calls_async(2).await;
	assert_eq!(cache.stats().errors, 1);
}

#[tokio::test]
async fn graph_client_errors_surface_status_and_body() {
	let server = MockServer::start_async().await;
	let _token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let mail_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(SEND_MAIL_PATH);
			then.status(403).body("{\"error\":{\"code\":\"ErrorAccessDenied\"}}");
		})
		.await;
	let dispatcher = MailDispatcher::from_config(config(&server))
		.expect("Dispatcher should build from configuration.");
	let request = EmailRequest::new("Welcome", "<p>Hi</p>", ["ops@example.com"]);
	let err = dispatcher.send_email(&request).await.expect_err("403 should fail the send.");

	assert!(matches!(
		err,
		Error::MailDelivery(ref inner)
			if inner.status == 403 && inner.body.contains("ErrorAccessDenied")
	));

	mail_mock.assert_calls_async(1).await;
}
