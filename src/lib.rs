//! Identity-context credential broker: trade an OIDC login for AWS Access Grants credentials and
//! read one S3 object back as structured rows.
//!
//! The crate wires a four-stage exchange chain (token exchange, role assumption with identity
//! context, access grant resolution, object fetch) behind a small axum surface that handles the
//! OIDC login and keeps the signed-in user in a server-side session.

#![deny(clippy::all, missing_docs)]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub mod auth;
pub mod chain;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod oidc;
pub mod payload;
pub mod upstream;
pub mod web;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;
	pub use crate::upstream::scripted::*;

	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use crate::{
		auth::{AccountId, ApplicationArn, BucketName, IdentityToken, ObjectKey, RoleArn},
		chain::{ChainSettings, ExchangeChain},
		http::ReqwestHttpClient,
	};

	/// Installs `ring` as the process-wide rustls provider.
	///
	/// rustls cannot choose a default while both `aws-lc-rs` and `ring` are linked. Call this
	/// before starting an `httpmock` HTTPS server. Repeated calls are no-ops.
	pub fn install_test_crypto_provider() {
		let _ = rustls::crypto::ring::default_provider().install_default();
	}

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Mints a compact JWT with the provided claims and a placeholder signature.
	///
	/// The broker never verifies signatures locally, so tests only need a well-formed
	/// `header.payload.signature` triple.
	pub fn mint_unsigned_jwt(claims: &serde_json::Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
		let payload = URL_SAFE_NO_PAD
			.encode(serde_json::to_vec(claims).expect("Failed to serialize test JWT claims."));

		format!("{header}.{payload}.c2lnbmF0dXJl")
	}

	/// Identity token for `alice@example.com`, valid for one hour.
	pub fn test_identity_token() -> IdentityToken {
		let expires_at = OffsetDateTime::now_utc() + Duration::hours(1);
		let raw = mint_unsigned_jwt(&serde_json::json!({
			"iss": "https://idp.example.com",
			"sub": "user-alice",
			"aud": "grants-broker",
			"exp": expires_at.unix_timestamp(),
			"email": "alice@example.com",
		}));

		IdentityToken::new(raw, "user-alice", Some("alice@example.com".into()), expires_at)
	}

	/// Chain settings pointing at the fixture account, role, and bucket used across tests.
	pub fn test_chain_settings() -> ChainSettings {
		ChainSettings::new(
			ApplicationArn::new("arn:aws:sso::123456789012:application/ssoins-1/apl-1")
				.expect("Application ARN fixture should be valid."),
			RoleArn::new("arn:aws:iam::123456789012:role/access-grants-reader")
				.expect("Role ARN fixture should be valid."),
			AccountId::new("123456789012").expect("Account fixture should be valid."),
			BucketName::new("grants-fixture-bucket").expect("Bucket fixture should be valid."),
			ObjectKey::new("users/user_list").expect("Object key fixture should be valid."),
		)
	}

	/// Constructs an [`ExchangeChain`] whose four upstream seams all resolve to `upstream`.
	pub fn build_scripted_chain(upstream: Arc<ScriptedUpstream>) -> ExchangeChain {
		ExchangeChain::new(
			test_chain_settings(),
			upstream.clone(),
			upstream.clone(),
			upstream.clone(),
			upstream,
		)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
// Used by the server binary.
use color_eyre as _;
