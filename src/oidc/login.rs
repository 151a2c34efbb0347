//! Per-login state kept in the user's session between `/login` and the callback.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::TokenSecret};

const STATE_LEN: usize = 32;
const NONCE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// How long a started login may wait for its callback.
pub const PENDING_LOGIN_TTL: Duration = Duration::minutes(10);

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Login handshake started by `/login` and finished by the callback.
#[derive(Clone, Serialize, Deserialize)]
pub struct PendingLogin {
	/// Opaque state value that must round-trip via the redirect.
	pub state: String,
	/// Nonce the ID token must echo.
	pub nonce: String,
	/// Local path the user returns to after login.
	pub return_to: String,
	/// Instant the login was started.
	#[serde(with = "time::serde::timestamp")]
	pub started_at: OffsetDateTime,
	pkce_verifier: TokenSecret,
}
impl PendingLogin {
	/// Generates fresh state, nonce, and PKCE verifier.
	pub fn generate(return_to: impl Into<String>) -> Self {
		Self {
			state: random_string(STATE_LEN),
			nonce: random_string(NONCE_LEN),
			return_to: return_to.into(),
			started_at: OffsetDateTime::now_utc(),
			pkce_verifier: TokenSecret::new(random_string(PKCE_VERIFIER_LEN)),
		}
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> String {
		compute_pkce_challenge(self.pkce_verifier.expose())
	}

	/// PKCE challenge method (always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		PkceCodeChallengeMethod::S256
	}

	/// Secret PKCE verifier sent with the code exchange.
	pub fn pkce_verifier(&self) -> &TokenSecret {
		&self.pkce_verifier
	}

	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(Error::Login { reason: "authorization state mismatch".into() })
		}
	}

	/// Returns `true` once the login has waited longer than [`PENDING_LOGIN_TTL`].
	pub fn is_stale_at(&self, instant: OffsetDateTime) -> bool {
		instant - self.started_at > PENDING_LOGIN_TTL
	}
}
impl Debug for PendingLogin {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PendingLogin")
			.field("state", &self.state)
			.field("nonce", &self.nonce)
			.field("return_to", &self.return_to)
			.field("started_at", &self.started_at)
			.field("pkce_verifier", &self.pkce_verifier)
			.finish()
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let digest = Sha256::digest(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(digest)
}
