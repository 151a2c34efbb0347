//! ID token issued by the OIDC provider at login.

// self
use crate::{
	_prelude::*,
	auth::{IdTokenClaims, TokenSecret},
};

/// Signed-in user's ID token plus the profile claims the web surface displays.
///
/// The value lives in the user's session and is handed to the exchange chain by reference; the
/// chain never stores it.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentityToken {
	raw: TokenSecret,
	/// Subject claim.
	pub subject: String,
	/// Email claim, when the provider released it.
	pub email: Option<String>,
	/// Expiry instant taken from the `exp` claim.
	#[serde(with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
}
impl IdentityToken {
	/// Wraps a raw ID token with its already-decoded profile fields.
	pub fn new(
		raw: impl Into<String>,
		subject: impl Into<String>,
		email: Option<String>,
		expires_at: OffsetDateTime,
	) -> Self {
		Self { raw: TokenSecret::new(raw), subject: subject.into(), email, expires_at }
	}

	/// Builds the token from its raw form and decoded claims.
	///
	/// Returns `None` when the `exp` claim is outside the representable range.
	pub fn from_claims(raw: impl Into<String>, claims: &IdTokenClaims) -> Option<Self> {
		let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp).ok()?;

		Some(Self::new(raw, claims.sub.clone(), claims.email.clone(), expires_at))
	}

	/// Returns the raw JWT. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		self.raw.expose()
	}

	/// Returns `true` when the raw token is empty.
	pub fn is_empty(&self) -> bool {
		self.raw.is_empty()
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}
impl Debug for IdentityToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityToken")
			.field("raw", &"<redacted>")
			.field("subject", &self.subject)
			.field("email", &self.email)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
