//! Federated token returned by the token-exchange service.

// self
use crate::{
	_prelude::*,
	auth::{FederatedClaims, TokenSecret, decode_unverified},
};

/// Identity-context assertion extracted from a federated token and forwarded to STS.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityContext(TokenSecret);
impl IdentityContext {
	/// Wraps an assertion string.
	pub fn new(assertion: impl Into<String>) -> Self {
		Self(TokenSecret::new(assertion))
	}

	/// Returns the assertion. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		self.0.expose()
	}
}
impl Debug for IdentityContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("IdentityContext(<redacted>)")
	}
}

/// Short-lived token pair issued by the federation service for one request.
pub struct FederatedToken {
	id_token: TokenSecret,
	access_token: Option<TokenSecret>,
	/// Instant the token pair was received.
	pub issued_at: OffsetDateTime,
	/// Expiry derived from the service's `expiresIn`.
	pub expires_at: OffsetDateTime,
}
impl FederatedToken {
	/// Creates a federated token from the ID token the service returned.
	pub fn new(id_token: impl Into<String>, issued_at: OffsetDateTime, expires_in: Duration) -> Self {
		Self {
			id_token: TokenSecret::new(id_token),
			access_token: None,
			issued_at,
			expires_at: issued_at + expires_in,
		}
	}

	/// Attaches the access token the service returned alongside the ID token.
	pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(access_token));

		self
	}

	/// Access token, if the service issued one.
	pub fn access_token(&self) -> Option<&TokenSecret> {
		self.access_token.as_ref()
	}

	/// Reads the `sts:identity_context` claim out of the ID token payload.
	///
	/// The payload is decoded without signature verification; STS validates the assertion it is
	/// handed.
	pub fn identity_context(&self) -> Result<IdentityContext> {
		let claims: FederatedClaims =
			decode_unverified(self.id_token.expose()).map_err(|e| Error::AuthenticationExchange {
				reason: format!("federated token could not be decoded ({e})"),
			})?;

		claims.identity_context.filter(|value| !value.is_empty()).map(IdentityContext::new).ok_or_else(
			|| Error::AuthenticationExchange {
				reason: "federated token is missing the sts:identity_context claim".into(),
			},
		)
	}
}
impl Debug for FederatedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FederatedToken")
			.field("id_token", &"<redacted>")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
