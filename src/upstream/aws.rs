//! AWS SDK implementations of the upstream seams.
//!
//! The token exchange and role assumption run with the process's own AWS credentials. The grant
//! resolution and the object fetch each build a short-lived client around the credentials handed
//! in by the previous stage, so those credentials are consumed by exactly one call.

// std
use std::time::SystemTime;
// crates.io
use aws_config::{BehaviorVersion, Region, SdkConfig, retry::RetryConfig};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
// self
use crate::{
	_prelude::*,
	auth::{FederatedToken, SessionCredentials},
	chain::Stage,
	upstream::{
		AccessGrants, AssumeRoleRequest, DataAccessRequest, JWT_BEARER_GRANT_TYPE, ObjectLocation,
		ObjectStore, Permission, RoleAssumer, TokenExchange, TokenExchangeRequest,
		UpstreamErrorContext, UpstreamFuture,
	},
};

const CREDENTIALS_PROVIDER_NAME: &str = "grants-broker";

/// Upstream backed by SSO OIDC, STS, S3 Control, and S3.
#[derive(Clone, Debug)]
pub struct AwsUpstream {
	sdk_config: SdkConfig,
	sso_oidc: aws_sdk_ssooidc::Client,
	sts: aws_sdk_sts::Client,
}
impl AwsUpstream {
	/// Loads the default AWS configuration for `region` with SDK retries disabled.
	pub async fn from_region(region: impl Into<String>) -> Self {
		let sdk_config = aws_config::defaults(BehaviorVersion::latest())
			.region(Region::new(region.into()))
			.retry_config(RetryConfig::disabled())
			.load()
			.await;

		Self::from_sdk_config(sdk_config)
	}

	/// Builds the service clients from an already loaded configuration.
	pub fn from_sdk_config(sdk_config: SdkConfig) -> Self {
		let sso_oidc = aws_sdk_ssooidc::Client::new(&sdk_config);
		let sts = aws_sdk_sts::Client::new(&sdk_config);

		Self { sdk_config, sso_oidc, sts }
	}

	fn s3control_with(&self, credentials: SessionCredentials) -> aws_sdk_s3control::Client {
		let conf = aws_sdk_s3control::config::Builder::from(&self.sdk_config)
			.credentials_provider(into_sdk_credentials(credentials))
			.build();

		aws_sdk_s3control::Client::from_conf(conf)
	}

	fn s3_with(&self, credentials: SessionCredentials) -> aws_sdk_s3::Client {
		let conf = aws_sdk_s3::config::Builder::from(&self.sdk_config)
			.credentials_provider(into_sdk_credentials(credentials))
			.build();

		aws_sdk_s3::Client::from_conf(conf)
	}
}
impl TokenExchange for AwsUpstream {
	fn exchange_identity_token<'a>(
		&'a self,
		request: TokenExchangeRequest<'a>,
	) -> UpstreamFuture<'a, FederatedToken> {
		Box::pin(async move {
			let issued_at = OffsetDateTime::now_utc();
			let output = self
				.sso_oidc
				.create_token_with_iam()
				.client_id(request.application_arn.as_ref())
				.grant_type(JWT_BEARER_GRANT_TYPE)
				.assertion(request.assertion.expose())
				.send()
				.await
				.map_err(|e| classify_sdk_error(Stage::Exchanging, e).into_error())?;
			let id_token = output.id_token().ok_or_else(|| Error::AuthenticationExchange {
				reason: "token exchange response carried no idToken".into(),
			})?;
			let token = FederatedToken::new(
				id_token,
				issued_at,
				Duration::seconds(i64::from(output.expires_in())),
			);

			Ok(match output.access_token() {
				Some(access_token) => token.with_access_token(access_token),
				None => token,
			})
		})
	}
}
impl RoleAssumer for AwsUpstream {
	fn assume_role_with_context<'a>(
		&'a self,
		request: AssumeRoleRequest<'a>,
	) -> UpstreamFuture<'a, SessionCredentials> {
		Box::pin(async move {
			let mut call = self
				.sts
				.assume_role()
				.role_arn(request.role_arn.as_ref())
				.role_session_name(request.session_name);

			for context in &request.provided_contexts {
				call = call.provided_contexts(
					aws_sdk_sts::types::ProvidedContext::builder()
						.provider_arn(context.provider_arn)
						.context_assertion(context.assertion.expose())
						.build(),
				);
			}

			let output = call
				.send()
				.await
				.map_err(|e| classify_sdk_error(Stage::AssumingRole, e).into_error())?;
			let creds = output.credentials().ok_or_else(|| Error::Authorization {
				reason: "role assumption response carried no credentials".into(),
			})?;
			let expires_at = OffsetDateTime::from_unix_timestamp(creds.expiration().secs())
				.map_err(|e| Error::Authorization {
					reason: format!("role credentials carry an invalid expiration ({e})"),
				})?;

			Ok(SessionCredentials::new(
				creds.access_key_id(),
				creds.secret_access_key(),
				creds.session_token(),
				expires_at,
			))
		})
	}
}
impl AccessGrants for AwsUpstream {
	fn get_data_access<'a>(
		&'a self,
		credentials: SessionCredentials,
		request: DataAccessRequest<'a>,
	) -> UpstreamFuture<'a, SessionCredentials> {
		Box::pin(async move {
			let permission = match request.permission {
				Permission::Read => aws_sdk_s3control::types::Permission::Read,
			};
			let output = self
				.s3control_with(credentials)
				.get_data_access()
				.account_id(request.account_id.as_ref())
				.target(request.target)
				.permission(permission)
				.send()
				.await
				.map_err(|e| classify_sdk_error(Stage::ResolvingAccess, e).into_error())?;
			let incomplete = || Error::AccessDenied {
				reason: "data access response carried incomplete credentials".into(),
			};
			let creds = output.credentials().ok_or_else(incomplete)?;
			let expiration = creds.expiration().ok_or_else(incomplete)?;
			let expires_at =
				OffsetDateTime::from_unix_timestamp(expiration.secs()).map_err(|_| incomplete())?;

			Ok(SessionCredentials::new(
				creds.access_key_id().ok_or_else(incomplete)?,
				creds.secret_access_key().ok_or_else(incomplete)?,
				creds.session_token().ok_or_else(incomplete)?,
				expires_at,
			))
		})
	}
}
impl ObjectStore for AwsUpstream {
	fn get_object<'a>(
		&'a self,
		credentials: SessionCredentials,
		location: ObjectLocation<'a>,
	) -> UpstreamFuture<'a, Vec<u8>> {
		Box::pin(async move {
			let output = self
				.s3_with(credentials)
				.get_object()
				.bucket(location.bucket.as_ref())
				.key(location.key.as_ref())
				.send()
				.await
				.map_err(|e| {
					classify_sdk_error(Stage::FetchingObject, e)
						.with_object(location.bucket.as_ref(), location.key.as_ref())
						.into_error()
				})?;
			let body = output.body.collect().await.map_err(|e| {
				UpstreamErrorContext::network_failure(Stage::FetchingObject)
					.with_message(e.to_string())
					.into_error()
			})?;

			Ok(body.into_bytes().to_vec())
		})
	}
}

fn into_sdk_credentials(credentials: SessionCredentials) -> Credentials {
	Credentials::new(
		credentials.access_key_id(),
		credentials.secret_access_key().expose(),
		Some(credentials.session_token().expose().to_owned()),
		Some(SystemTime::from(credentials.expires_at())),
		CREDENTIALS_PROVIDER_NAME,
	)
}

fn classify_sdk_error<E>(stage: Stage, err: SdkError<E>) -> UpstreamErrorContext
where
	E: 'static + ProvideErrorMetadata + StdError,
{
	let mut ctx = match &err {
		SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) =>
			UpstreamErrorContext::network_failure(stage),
		_ => UpstreamErrorContext::new(stage),
	};

	if let Some(raw) = err.raw_response() {
		ctx = ctx.with_http_status(raw.status().as_u16());
	}
	if let Some(code) = err.code() {
		ctx = ctx.with_code(code);
	}

	let message = err.message().map(str::to_owned);

	ctx.with_message(message.unwrap_or_else(|| DisplayErrorContext(&err).to_string()))
}
