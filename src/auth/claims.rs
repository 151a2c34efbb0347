//! Unverified JWT payload decoding.
//!
//! The broker only ever reads claims from tokens it received directly from the issuer over TLS
//! (the OIDC token endpoint and the federation service), so payloads are decoded without checking
//! signatures. Downstream services re-validate whatever assertion is forwarded to them.

// crates.io
use base64::{
	Engine as _,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use serde::de::DeserializeOwned;
// self
use crate::_prelude::*;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
	&base64::alphabet::URL_SAFE,
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Failures raised while reading claims out of a compact JWT.
#[derive(Debug, ThisError)]
pub enum ClaimsError {
	/// The token is not a `header.payload.signature` triple.
	#[error("Token is not a compact JWT (expected 3 segments, found {segments}).")]
	Malformed {
		/// Number of `.`-separated segments found.
		segments: usize,
	},
	/// The payload segment is not base64url.
	#[error("Token payload is not valid base64url.")]
	Base64(#[from] base64::DecodeError),
	/// The payload is not the expected JSON object.
	#[error("Token payload is not valid claims JSON.")]
	Json(#[from] serde_path_to_error::Error<serde_json::Error>),
}

/// Claims the broker reads from an OIDC ID token.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
	/// Issuer identifier.
	pub iss: String,
	/// Subject (end-user identifier at the issuer).
	pub sub: String,
	/// Audience, a single client id or a list of them.
	pub aud: Audience,
	/// Expiry as seconds since the Unix epoch.
	pub exp: i64,
	/// Nonce echoed from the authorization request.
	#[serde(default)]
	pub nonce: Option<String>,
	/// End-user email address, when the `email` scope was granted.
	#[serde(default)]
	pub email: Option<String>,
}

/// `aud` claim, which may be a string or an array of strings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
	/// Single audience.
	One(String),
	/// Multiple audiences.
	Many(Vec<String>),
}
impl Audience {
	/// Returns `true` when `client_id` is one of the audiences.
	pub fn contains(&self, client_id: &str) -> bool {
		match self {
			Audience::One(value) => value == client_id,
			Audience::Many(values) => values.iter().any(|value| value == client_id),
		}
	}
}

/// Claims the broker reads from the federated token returned by the exchange service.
#[derive(Clone, Debug, Deserialize)]
pub struct FederatedClaims {
	/// Identity-context assertion forwarded to STS.
	#[serde(rename = "sts:identity_context", default)]
	pub identity_context: Option<String>,
	/// Subject, when present.
	#[serde(default)]
	pub sub: Option<String>,
}

/// Decodes the payload segment of a compact JWT into `T` without verifying the signature.
pub fn decode_unverified<T>(token: &str) -> Result<T, ClaimsError>
where
	T: DeserializeOwned,
{
	let segments = token.split('.').collect::<Vec<_>>();

	if segments.len() != 3 {
		return Err(ClaimsError::Malformed { segments: segments.len() });
	}

	let payload = URL_SAFE_LENIENT.decode(segments[1])?;
	let mut deserializer = serde_json::Deserializer::from_slice(&payload);

	Ok(serde_path_to_error::deserialize(&mut deserializer)?)
}
