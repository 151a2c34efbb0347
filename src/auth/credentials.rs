//! Temporary AWS credentials produced by the role-assumption and grant-resolution stages.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Freshness of a credential set at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialStatus {
	/// The credentials can be used.
	Fresh,
	/// The credentials have expired and must not be forwarded.
	Expired,
}

/// Temporary access key triple plus expiry.
///
/// The type is deliberately not `Clone`: each stage consumes the credentials it is handed, so the
/// outer role credentials cannot be reused once the grant credentials are issued.
pub struct SessionCredentials {
	access_key_id: String,
	secret_access_key: TokenSecret,
	session_token: TokenSecret,
	expires_at: OffsetDateTime,
}
impl SessionCredentials {
	/// Assembles a credential triple.
	pub fn new(
		access_key_id: impl Into<String>,
		secret_access_key: impl Into<String>,
		session_token: impl Into<String>,
		expires_at: OffsetDateTime,
	) -> Self {
		Self {
			access_key_id: access_key_id.into(),
			secret_access_key: TokenSecret::new(secret_access_key),
			session_token: TokenSecret::new(session_token),
			expires_at,
		}
	}

	/// Access key identifier. Not secret on its own.
	pub fn access_key_id(&self) -> &str {
		&self.access_key_id
	}

	/// Secret access key.
	pub fn secret_access_key(&self) -> &TokenSecret {
		&self.secret_access_key
	}

	/// Session token.
	pub fn session_token(&self) -> &TokenSecret {
		&self.session_token
	}

	/// Expiry instant reported by the issuing service.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Returns the credential status at the provided instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> CredentialStatus {
		if instant >= self.expires_at { CredentialStatus::Expired } else { CredentialStatus::Fresh }
	}

	/// Returns `true` if the credentials have expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), CredentialStatus::Expired)
	}

	/// Returns `true` when every field carries a value.
	pub fn is_complete(&self) -> bool {
		!self.access_key_id.is_empty()
			&& !self.secret_access_key.is_empty()
			&& !self.session_token.is_empty()
	}
}
impl Debug for SessionCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionCredentials")
			.field("access_key_id", &self.access_key_id)
			.field("secret_access_key", &"<redacted>")
			.field("session_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
