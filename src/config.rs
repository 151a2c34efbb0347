//! Command-line and environment configuration for the broker binary.

// std
use std::net::SocketAddr;
// crates.io
use clap::Parser;
// self
use crate::{
	_prelude::*,
	auth::{AccountId, ApplicationArn, BucketName, ObjectKey, RoleArn, TokenSecret},
	chain::{ChainSettings, DEFAULT_GRANT_PREFIX, DEFAULT_ROLE_SESSION_NAME},
	error::ConfigError,
	oidc::{OidcClientSettings, ProviderDescriptor, ScopeSet},
	web::SessionSettings,
};

/// Broker configuration; every option is also read from the environment.
#[derive(Clone, Debug, Parser)]
#[command(name = "grants-broker", version, about)]
pub struct Config {
	/// Address the HTTP server binds to.
	#[arg(long, env = "GRANTS_BROKER_LISTEN", default_value = "127.0.0.1:5000")]
	pub listen: SocketAddr,
	/// AWS region of every upstream service.
	#[arg(long, env = "AWS_REGION", default_value = "ap-southeast-2")]
	pub region: String,

	/// IAM Identity Center application trusting the identity provider.
	#[arg(long, env = "AWS_IIC_APPLICATION_ARN")]
	pub application_arn: String,
	/// Role assumed with the identity context.
	#[arg(long, env = "AWS_S3_ACCESS_GRANT_ROLE_ARN")]
	pub role_arn: String,
	/// Role session name.
	#[arg(long, env = "AWS_ROLE_SESSION_NAME", default_value = DEFAULT_ROLE_SESSION_NAME)]
	pub role_session_name: String,
	/// Account owning the Access Grants instance.
	#[arg(long, env = "AWS_S3_ACCESS_GRANT_ACCOUNT_ID")]
	pub account_id: String,
	/// Bucket holding the target object.
	#[arg(long, env = "AWS_TARGET_BUCKET_NAME")]
	pub bucket: String,
	/// Prefix covered by the grant.
	#[arg(long, env = "AWS_TARGET_GRANT_PREFIX", default_value = DEFAULT_GRANT_PREFIX)]
	pub grant_prefix: String,
	/// Key of the object served by `/get-s3-data`.
	#[arg(long, env = "AWS_TARGET_OBJECT_KEY", default_value = "users/user_list")]
	pub object_key: String,
	/// End-to-end deadline of one chain run, in seconds.
	#[arg(long, env = "GRANTS_BROKER_CHAIN_TIMEOUT_SECS", default_value_t = 20)]
	pub chain_timeout_secs: i64,

	/// OIDC issuer URL.
	#[arg(long, env = "OIDC_ISSUER")]
	pub oidc_issuer: String,
	/// Authorization endpoint; discovered from the issuer when unset.
	#[arg(long, env = "OIDC_AUTHORIZATION_ENDPOINT")]
	pub oidc_authorization_endpoint: Option<String>,
	/// Token endpoint; discovered from the issuer when unset.
	#[arg(long, env = "OIDC_TOKEN_ENDPOINT")]
	pub oidc_token_endpoint: Option<String>,
	/// Client identifier registered with the provider.
	#[arg(long, env = "OIDC_CLIENT_ID")]
	pub oidc_client_id: String,
	/// Client secret; omit for public clients.
	#[arg(long, env = "OIDC_CLIENT_SECRET")]
	pub oidc_client_secret: Option<TokenSecret>,
	/// Redirect URI registered with the provider; its path serves the callback.
	#[arg(long, env = "OIDC_REDIRECT_URI", default_value = "http://localhost:5000/callback")]
	pub oidc_redirect_uri: String,
	/// Space-separated scopes requested at login.
	#[arg(long, env = "OIDC_SCOPES", default_value = "openid email profile")]
	pub oidc_scopes: String,

	/// Secret the session cookie signing key is derived from.
	#[arg(long, env = "SESSION_SECRET_KEY")]
	pub session_secret: TokenSecret,
	/// Marks the session cookie `Secure`.
	#[arg(long, env = "SESSION_SECURE_COOKIES")]
	pub secure_cookies: bool,
	/// Idle lifetime of a session, in seconds.
	#[arg(long, env = "SESSION_IDLE_SECS", default_value_t = 3600)]
	pub session_idle_secs: u32,
}
impl Config {
	/// Validated chain identifiers and limits.
	pub fn chain_settings(&self) -> Result<ChainSettings, ConfigError> {
		ChainSettings::new(
			ApplicationArn::new(&self.application_arn)?,
			RoleArn::new(&self.role_arn)?,
			AccountId::new(&self.account_id)?,
			BucketName::new(&self.bucket)?,
			ObjectKey::new(&self.object_key)?,
		)
		.with_grant_prefix(self.grant_prefix.trim_matches('/'))
		.with_role_session_name(&self.role_session_name)
		.with_deadline(Duration::seconds(self.chain_timeout_secs))
	}

	/// Issuer URL.
	pub fn issuer(&self) -> Result<Url, ConfigError> {
		parse_url("oidc_issuer", &self.oidc_issuer)
	}

	/// Provider descriptor built from explicitly configured endpoints.
	///
	/// Returns `None` when neither endpoint is set, in which case the descriptor is discovered.
	pub fn explicit_descriptor(&self) -> Result<Option<ProviderDescriptor>, ConfigError> {
		if self.oidc_authorization_endpoint.is_none() && self.oidc_token_endpoint.is_none() {
			return Ok(None);
		}

		let mut builder = ProviderDescriptor::builder(self.issuer()?);

		if let Some(raw) = &self.oidc_authorization_endpoint {
			builder =
				builder.authorization_endpoint(parse_url("oidc_authorization_endpoint", raw)?);
		}
		if let Some(raw) = &self.oidc_token_endpoint {
			builder = builder.token_endpoint(parse_url("oidc_token_endpoint", raw)?);
		}

		Ok(Some(builder.build()?))
	}

	/// Client registration used by the login flow.
	pub fn oidc_settings(&self) -> Result<OidcClientSettings, ConfigError> {
		Ok(OidcClientSettings {
			client_id: self.oidc_client_id.clone(),
			client_secret: self.oidc_client_secret.clone().filter(|secret| !secret.is_empty()),
			redirect_uri: parse_url("oidc_redirect_uri", &self.oidc_redirect_uri)?,
			scope: self.oidc_scopes.parse::<ScopeSet>()?,
		})
	}

	/// Cookie signing and lifetime settings.
	pub fn session_settings(&self) -> Result<SessionSettings, ConfigError> {
		SessionSettings::new(
			&self.session_secret,
			self.secure_cookies,
			Duration::seconds(i64::from(self.session_idle_secs)),
		)
	}
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { field, source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{auth::IdentifierError, oidc::ProviderDescriptorError};

	const REQUIRED: [(&str, &str); 7] = [
		("--application-arn", "arn:aws:sso::123456789012:application/ssoins-1/apl-1"),
		("--role-arn", "arn:aws:iam::123456789012:role/access-grants-reader"),
		("--account-id", "123456789012"),
		("--bucket", "grants-data"),
		("--oidc-issuer", "https://idp.example.com"),
		("--oidc-client-id", "grants-broker"),
		("--session-secret", "s3cr3t"),
	];

	fn parse(overrides: &[(&str, &str)]) -> Config {
		let mut args = vec!["grants-broker"];

		for (flag, value) in REQUIRED {
			if !overrides.iter().any(|(name, _)| *name == flag) {
				args.extend([flag, value]);
			}
		}
		for (flag, value) in overrides {
			args.extend([*flag, *value]);
		}

		Config::try_parse_from(args).expect("Fixture arguments should parse.")
	}

	#[test]
	fn defaults_follow_the_documented_values() {
		let config = parse(&[]);
		let chain = config.chain_settings().expect("Default chain settings should validate.");
		let oidc = config.oidc_settings().expect("Default OIDC settings should validate.");

		assert_eq!(config.listen.to_string(), "127.0.0.1:5000");
		assert_eq!(chain.role_session_name, "my-role-session-with-identity-context");
		assert_eq!(chain.grant_target(), "s3://grants-data/users*");
		assert_eq!(chain.object_key.as_ref(), "users/user_list");
		assert_eq!(chain.deadline, Duration::seconds(20));
		assert_eq!(oidc.redirect_uri.as_str(), "http://localhost:5000/callback");
		assert_eq!(oidc.scope.normalized(), "email openid profile");
		assert!(oidc.client_secret.is_none());
		assert!(!config.secure_cookies);
		assert!(config.explicit_descriptor().expect("No endpoints should be fine.").is_none());
	}

	#[test]
	fn invalid_identifiers_surface_as_config_errors() {
		let config = parse(&[("--account-id", "12345678901a")]);

		assert!(matches!(
			config.chain_settings(),
			Err(ConfigError::InvalidIdentifier(IdentifierError::MalformedAccount))
		));
		assert!(matches!(
			parse(&[("--chain-timeout-secs", "0")]).chain_settings(),
			Err(ConfigError::NonPositiveDeadline)
		));
		assert!(matches!(
			parse(&[("--oidc-scopes", "email")]).oidc_settings(),
			Err(ConfigError::InvalidScope(_))
		));
	}

	#[test]
	fn explicit_endpoints_must_come_in_pairs() {
		let partial =
			parse(&[("--oidc-authorization-endpoint", "https://idp.example.com/authorize")]);

		assert!(matches!(
			partial.explicit_descriptor(),
			Err(ConfigError::InvalidDescriptor(ProviderDescriptorError::MissingTokenEndpoint))
		));

		let full = parse(&[
			("--oidc-authorization-endpoint", "https://idp.example.com/authorize"),
			("--oidc-token-endpoint", "https://idp.example.com/token"),
		]);
		let descriptor = full
			.explicit_descriptor()
			.expect("Explicit endpoints should validate.")
			.expect("Explicit endpoints should yield a descriptor.");

		assert_eq!(descriptor.endpoints.token.as_str(), "https://idp.example.com/token");
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let config = parse(&[("--oidc-client-secret", "client-s3cr3t")]);
		let rendered = format!("{config:?}");

		assert!(!rendered.contains("s3cr3t"));
	}
}
