//! Authorization-code + PKCE client that turns a callback into an [`IdentityToken`].

// crates.io
use oauth2::{
	AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	ExtraTokenFields, HttpClientError, PkceCodeVerifier, RedirectUrl, RequestTokenError,
	StandardRevocableToken, StandardTokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{IdTokenClaims, IdentityToken, TokenSecret, decode_unverified},
	error::{ConfigError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
	oidc::{PendingLogin, ProviderDescriptor, ScopeSet},
};

type OidcTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;
type ConfiguredClient = oauth2::Client<
	BasicErrorResponse,
	OidcTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Extra token-response field carrying the OpenID Connect ID token.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// Compact ID token JWT.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

/// Registration details of this application at the provider.
#[derive(Clone, Debug)]
pub struct OidcClientSettings {
	/// Client identifier.
	pub client_id: String,
	/// Client secret; `None` for public clients.
	pub client_secret: Option<TokenSecret>,
	/// Redirect URI registered with the provider.
	pub redirect_uri: Url,
	/// Scopes requested at login.
	pub scope: ScopeSet,
}

/// OIDC login client bound to one provider and one client registration.
#[derive(Clone)]
pub struct OidcClient {
	descriptor: ProviderDescriptor,
	settings: OidcClientSettings,
	oauth_client: ConfiguredClient,
	http_client: ReqwestHttpClient,
}
impl OidcClient {
	/// Builds the client for `descriptor`.
	pub fn new(
		descriptor: ProviderDescriptor,
		settings: OidcClientSettings,
		http_client: ReqwestHttpClient,
	) -> Result<Self, ConfigError> {
		let auth_url = AuthUrl::from_url(descriptor.endpoints.authorization.clone());
		let token_url = TokenUrl::from_url(descriptor.endpoints.token.clone());
		let redirect_url = RedirectUrl::from_url(settings.redirect_uri.clone());

		if settings.redirect_uri.path().trim_matches('/').is_empty() {
			return Err(ConfigError::InvalidRedirectPath { uri: settings.redirect_uri.to_string() });
		}

		let mut oauth_client: ConfiguredClient =
			oauth2::Client::new(ClientId::new(settings.client_id.clone()))
				.set_auth_uri(auth_url)
				.set_token_uri(token_url)
				.set_redirect_uri(redirect_url);

		if let Some(secret) = &settings.client_secret {
			oauth_client =
				oauth_client.set_client_secret(ClientSecret::new(secret.expose().to_owned()));
		}

		Ok(Self { descriptor, settings, oauth_client, http_client })
	}

	/// Provider metadata the client was built from.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.descriptor
	}

	/// Path component of the redirect URI, where the callback route is mounted.
	pub fn redirect_path(&self) -> &str {
		self.settings.redirect_uri.path()
	}

	/// Starts a login that returns the user to `return_to` once finished.
	///
	/// The returned [`PendingLogin`] must be kept (in the session) until the callback arrives;
	/// the URL is where the browser is sent.
	pub fn start_login(&self, return_to: impl Into<String>) -> (PendingLogin, Url) {
		let pending = PendingLogin::generate(return_to);
		let mut url = self.descriptor.endpoints.authorization.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", &self.settings.client_id);
		pairs.append_pair("redirect_uri", self.settings.redirect_uri.as_str());
		pairs.append_pair("scope", &self.settings.scope.normalized());
		pairs.append_pair("state", &pending.state);
		pairs.append_pair("nonce", &pending.nonce);
		pairs.append_pair("code_challenge", &pending.code_challenge());
		pairs.append_pair("code_challenge_method", pending.code_challenge_method().as_str());

		drop(pairs);

		(pending, url)
	}

	/// Finishes a login: checks `state`, exchanges `code`, and validates the ID token.
	pub async fn complete_login(
		&self,
		pending: PendingLogin,
		state: &str,
		code: &str,
	) -> Result<IdentityToken> {
		pending.validate_state(state)?;

		if pending.is_stale_at(OffsetDateTime::now_utc()) {
			return Err(Error::Login { reason: "login attempt expired".into() });
		}

		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.instrumented(meta.clone());
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_pkce_verifier(PkceCodeVerifier::new(pending.pkce_verifier().expose().to_owned()))
			.request_async(&instrumented)
			.await
			.map_err(|e| map_request_error(meta.take(), e))?;
		let raw = response.extra_fields().id_token.clone().ok_or_else(|| Error::Login {
			reason: "token response carried no id_token".into(),
		})?;

		self.validate_id_token(raw, &pending.nonce, OffsetDateTime::now_utc())
	}

	fn validate_id_token(
		&self,
		raw: String,
		nonce: &str,
		now: OffsetDateTime,
	) -> Result<IdentityToken> {
		let claims: IdTokenClaims = decode_unverified(&raw)
			.map_err(|e| Error::Login { reason: format!("id_token could not be decoded ({e})") })?;

		if !self.descriptor.is_issuer(&claims.iss) {
			return Err(Error::Login {
				reason: format!("id_token issuer `{}` is unexpected", claims.iss),
			});
		}
		if !claims.aud.contains(&self.settings.client_id) {
			return Err(Error::Login {
				reason: "id_token audience does not include this client".into(),
			});
		}
		if claims.nonce.as_deref() != Some(nonce) {
			return Err(Error::Login { reason: "id_token nonce mismatch".into() });
		}

		let token = IdentityToken::from_claims(raw, &claims)
			.ok_or_else(|| Error::Login { reason: "id_token expiry is out of range".into() })?;

		if token.is_expired_at(now) {
			return Err(Error::Login { reason: "id_token has expired".into() });
		}

		Ok(token)
	}
}
impl Debug for OidcClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OidcClient")
			.field("descriptor", &self.descriptor)
			.field("settings", &self.settings)
			.finish_non_exhaustive()
	}
}

fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => {
			let reason = match response.error_description() {
				Some(description) =>
					format!("token endpoint returned {} ({description})", response.error().as_ref()),
				None => format!("token endpoint returned {}", response.error().as_ref()),
			};

			Error::Login { reason }
		},
		RequestTokenError::Request(HttpClientError::Reqwest(inner)) => {
			if inner.is_builder() {
				return ConfigError::from(*inner).into();
			}

			TransportError::from(*inner).into()
		},
		RequestTokenError::Request(HttpClientError::Http(inner)) => ConfigError::from(inner).into(),
		RequestTokenError::Request(HttpClientError::Io(inner)) => TransportError::Io(inner).into(),
		RequestTokenError::Request(HttpClientError::Other(message)) =>
			Error::Login { reason: format!("token request failed: {message}") },
		RequestTokenError::Request(_) => Error::Login { reason: "token request failed".into() },
		RequestTokenError::Parse(error, _body) => Error::Login {
			reason: match status {
				Some(code) => format!(
					"token endpoint answered HTTP {code} with an unreadable body ({})",
					error.path()
				),
				None => format!("token response is unreadable ({})", error.path()),
			},
		},
		RequestTokenError::Other(message) => Error::Login {
			reason: match status {
				Some(code) => format!("token endpoint answered HTTP {code}: {message}"),
				None => format!("token endpoint returned an unexpected response: {message}"),
			},
		},
	}
}
