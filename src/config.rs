//! Process configuration read once at startup.
//!
//! Credential parameters are optional at load time. A missing tenant, client, or secret is
//! reported as [`ConfigError::MissingCredential`] the first time a token is fetched, so a process
//! with incomplete settings can still boot and serve its non-mail routes.

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError, mail::FormRecipients};

/// Default identity authority host.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
/// Default scope requested for Microsoft Graph application permissions.
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";
/// Default Microsoft Graph API base.
pub const DEFAULT_GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Top-level configuration consumed by [`TokenCache`](crate::cache::TokenCache) and
/// [`MailDispatcher`](crate::mail::MailDispatcher).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MailerConfig {
	/// Client-credentials parameters for the identity provider.
	pub credentials: Credentials,
	/// Mail endpoint settings.
	pub mail: MailSettings,
}
impl MailerConfig {
	/// Reads configuration from the process environment.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads configuration through `lookup`, treating blank values as unset.
	///
	/// Recognized keys: `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`,
	/// `AZURE_AUTHORITY_HOST`, `AZURE_TOKEN_SCOPE`, `GRAPH_API_BASE`, `MAIL_SENDER`,
	/// `CONTACT_RECIPIENTS`, and `CONSULTATION_RECIPIENTS` (comma separated).
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
		let mut credentials = Credentials {
			tenant_id: read("AZURE_TENANT_ID"),
			client_id: read("AZURE_CLIENT_ID"),
			client_secret: read("AZURE_CLIENT_SECRET").map(TokenSecret::new),
			..Credentials::default()
		};

		if let Some(authority) = read("AZURE_AUTHORITY_HOST") {
			credentials.authority = parse_endpoint("authority", &authority)?;
		}
		if let Some(scope) = read("AZURE_TOKEN_SCOPE") {
			credentials.scope = scope;
		}

		let mut mail = MailSettings { sender: read("MAIL_SENDER"), ..MailSettings::default() };

		if let Some(base) = read("GRAPH_API_BASE") {
			mail.graph_base = parse_endpoint("graph_base", &base)?;
		}
		if let Some(list) = read("CONTACT_RECIPIENTS") {
			mail.recipients.contact = split_list(&list);
		}
		if let Some(list) = read("CONSULTATION_RECIPIENTS") {
			mail.recipients.consultation = split_list(&list);
		}

		Ok(Self { credentials, mail })
	}
}

/// Client-credentials parameters for a single credential set.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
	/// Directory (tenant) identifier.
	pub tenant_id: Option<String>,
	/// Application (client) identifier.
	pub client_id: Option<String>,
	/// Client secret. Accepted from config files but never written back out.
	#[serde(skip_serializing)]
	pub client_secret: Option<TokenSecret>,
	/// Authority host; the token endpoint is `{authority}/{tenant}/oauth2/v2.0/token`.
	pub authority: Url,
	/// Scope requested in the client-credentials grant.
	pub scope: String,
}
impl Credentials {
	/// Creates a fully populated credential set using the default authority and scope.
	pub fn new(
		tenant_id: impl Into<String>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Self {
		Self {
			tenant_id: Some(tenant_id.into()),
			client_id: Some(client_id.into()),
			client_secret: Some(TokenSecret::new(client_secret)),
			..Self::default()
		}
	}

	/// Overrides the authority host.
	pub fn with_authority(mut self, authority: Url) -> Self {
		self.authority = authority;

		self
	}

	/// Validates that every required parameter is present and non-blank.
	pub fn resolve(&self) -> Result<ResolvedCredentials, ConfigError> {
		fn required(value: Option<&str>, name: &'static str) -> Result<String, ConfigError> {
			value
				.map(str::trim)
				.filter(|v| !v.is_empty())
				.map(str::to_owned)
				.ok_or(ConfigError::MissingCredential { name })
		}

		let tenant_id = required(self.tenant_id.as_deref(), "tenant_id")?;
		let client_id = required(self.client_id.as_deref(), "client_id")?;
		let client_secret = self
			.client_secret
			.clone()
			.filter(|secret| !secret.is_blank())
			.ok_or(ConfigError::MissingCredential { name: "client_secret" })?;

		Ok(ResolvedCredentials {
			tenant_id,
			client_id,
			client_secret,
			authority: self.authority.clone(),
			scope: self.scope.clone(),
		})
	}
}
impl Default for Credentials {
	fn default() -> Self {
		Self {
			tenant_id: None,
			client_id: None,
			client_secret: None,
			authority: default_url(DEFAULT_AUTHORITY),
			scope: DEFAULT_SCOPE.into(),
		}
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("tenant_id", &self.tenant_id)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("authority", &self.authority.as_str())
			.field("scope", &self.scope)
			.finish()
	}
}

/// Credential set whose required parameters were validated.
#[derive(Clone)]
pub struct ResolvedCredentials {
	/// Directory (tenant) identifier.
	pub tenant_id: String,
	/// Application (client) identifier.
	pub client_id: String,
	/// Client secret.
	pub client_secret: TokenSecret,
	/// Authority host.
	pub authority: Url,
	/// Requested scope.
	pub scope: String,
}
impl ResolvedCredentials {
	/// Builds the tenant-specific v2.0 token endpoint.
	pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
		join_endpoint(
			"token",
			&self.authority,
			&format!("{}/oauth2/v2.0/token", self.tenant_id),
		)
	}
}
impl Debug for ResolvedCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResolvedCredentials")
			.field("tenant_id", &self.tenant_id)
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("authority", &self.authority.as_str())
			.finish()
	}
}

/// Mail endpoint settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
	/// Graph API base, e.g. `https://graph.microsoft.com/v1.0`.
	pub graph_base: Url,
	/// Mailbox (user principal name or object id) the mail is sent from.
	pub sender: Option<String>,
	/// Fixed recipient lists per form.
	pub recipients: FormRecipients,
}
impl MailSettings {
	/// Creates settings for the provided sender mailbox using the default Graph base.
	pub fn new(sender: impl Into<String>) -> Self {
		Self { sender: Some(sender.into()), ..Self::default() }
	}

	/// Overrides the Graph API base.
	pub fn with_graph_base(mut self, graph_base: Url) -> Self {
		self.graph_base = graph_base;

		self
	}

	/// Overrides the form recipient lists.
	pub fn with_recipients(mut self, recipients: FormRecipients) -> Self {
		self.recipients = recipients;

		self
	}

	/// Builds `{graph_base}/users/{sender}/sendMail`.
	pub fn send_mail_endpoint(&self) -> Result<Url, ConfigError> {
		let sender = self
			.sender
			.as_deref()
			.map(str::trim)
			.filter(|v| !v.is_empty())
			.ok_or(ConfigError::MissingCredential { name: "mail_sender" })?;

		let mut url = self.graph_base.clone();

		// Each piece is pushed as one segment so the sender is percent-encoded.
		url.path_segments_mut()
			.map_err(|_| ConfigError::InvalidEndpoint {
				endpoint: "send_mail",
				source: oauth2::url::ParseError::RelativeUrlWithCannotBeABaseBase,
			})?
			.pop_if_empty()
			.extend(["users", sender, "sendMail"]);

		Ok(url)
	}
}
impl Default for MailSettings {
	fn default() -> Self {
		Self {
			graph_base: default_url(DEFAULT_GRAPH_BASE),
			sender: None,
			recipients: FormRecipients::default(),
		}
	}
}

fn parse_endpoint(endpoint: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint { endpoint, source })
}

// Joins relative to the base path instead of replacing its last segment.
fn join_endpoint(endpoint: &'static str, base: &Url, path: &str) -> Result<Url, ConfigError> {
	let mut base = base.clone();

	if !base.path().ends_with('/') {
		let with_slash = format!("{}/", base.path());

		base.set_path(&with_slash);
	}

	base.join(path).map_err(|source| ConfigError::InvalidEndpoint { endpoint, source })
}

fn default_url(raw: &'static str) -> Url {
	Url::parse(raw).unwrap_or_else(|_| unreachable!("Built-in endpoint `{raw}` must parse."))
}

fn split_list(raw: &str) -> Vec<String> {
	raw.split(',').map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
		move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v).to_owned())
	}

	#[test]
	fn lookup_reads_credentials_and_recipients() {
		let config = MailerConfig::from_lookup(lookup(&[
			("AZURE_TENANT_ID", "tenant-1"),
			("AZURE_CLIENT_ID", "client-1"),
			("AZURE_CLIENT_SECRET", "secret-1"),
			("MAIL_SENDER", "noreply@example.com"),
			("CONTACT_RECIPIENTS", "sales@example.com, info@example.com,"),
		]))
		.expect("Configuration should load from lookup.");
		let resolved =
			config.credentials.resolve().expect("Credentials should resolve when complete.");

		assert_eq!(resolved.tenant_id, "tenant-1");
		assert_eq!(resolved.client_secret.expose(), "secret-1");
		assert_eq!(resolved.scope, DEFAULT_SCOPE);
		assert_eq!(config.mail.recipients.contact, vec!["sales@example.com", "info@example.com"]);
		assert_eq!(
			resolved.token_endpoint().expect("Token endpoint should build.").as_str(),
			"https://login.microsoftonline.com/tenant-1/oauth2/v2.0/token"
		);
	}

	#[test]
	fn blank_values_resolve_to_missing_credentials() {
		let config = MailerConfig::from_lookup(lookup(&[
			("AZURE_TENANT_ID", "tenant-1"),
			("AZURE_CLIENT_ID", "   "),
			("AZURE_CLIENT_SECRET", "secret-1"),
		]))
		.expect("Configuration should load even when credentials are incomplete.");
		let err = config.credentials.resolve().expect_err("Blank client id should be rejected.");

		assert!(matches!(err, ConfigError::MissingCredential { name: "client_id" }));

		let err = Credentials { client_secret: None, ..Credentials::new("t", "c", "s") }
			.resolve()
			.expect_err("Missing secret should be rejected.");

		assert!(matches!(err, ConfigError::MissingCredential { name: "client_secret" }));
	}

	#[test]
	fn invalid_override_urls_are_rejected() {
		let err = MailerConfig::from_lookup(lookup(&[("GRAPH_API_BASE", "not a url")]))
			.expect_err("Invalid Graph base should be rejected.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::InvalidEndpoint { endpoint: "graph_base", .. })
		));
	}

	#[test]
	fn send_mail_endpoint_keeps_version_segment() {
		let settings = MailSettings::new("noreply@example.com");

		assert_eq!(
			settings.send_mail_endpoint().expect("Send mail endpoint should build.").as_str(),
			"https://graph.microsoft.com/v1.0/users/noreply@example.com/sendMail"
		);

		let err = MailSettings::default()
			.send_mail_endpoint()
			.expect_err("Missing sender should be rejected.");

		assert!(matches!(err, ConfigError::MissingCredential { name: "mail_sender" }));
	}

	#[test]
	fn send_mail_endpoint_encodes_the_sender_as_one_segment() {
		let url = MailSettings::new("team/ops?x#y")
			.with_graph_base(default_url("https://graph.example.com/v1.0/"))
			.send_mail_endpoint()
			.expect("Send mail endpoint should build.");

		assert_eq!(
			url.as_str(),
			"https://graph.example.com/v1.0/users/team%2Fops%3Fx%23y/sendMail"
		);
		assert_eq!(url.query(), None);
		assert_eq!(url.fragment(), None);
	}

	#[test]
	fn serialized_config_omits_client_secret() {
		let config = MailerConfig {
			credentials: Credentials::new("t", "c", "very-secret"),
			..MailerConfig::default()
		};
		let payload = serde_json::to_value(&config).expect("Configuration should serialize.");

		assert!(payload["credentials"].get("client_secret").is_none());
		assert!(!payload.to_string().contains("very-secret"));
		assert_eq!(payload["credentials"]["tenant_id"], "t");

		let parsed = serde_json::from_value::<Credentials>(serde_json::json!({
			"tenant_id": "t",
			"client_id": "c",
			"client_secret": "from-file",
		}))
		.expect("Credentials should deserialize with a secret.");

		assert_eq!(
			parsed.resolve().expect("Parsed credentials should resolve.").client_secret.expose(),
			"from-file"
		);
	}

	#[test]
	fn credentials_debug_hides_secret() {
		let rendered = format!("{:?}", Credentials::new("t", "c", "very-secret"));

		assert!(!rendered.contains("very-secret"));
		assert!(rendered.contains("client_secret_set: true"));
	}
}
