//! `/.well-known/openid-configuration` lookup.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::ReqwestHttpClient,
	oidc::ProviderDescriptor,
};

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
	issuer: String,
	authorization_endpoint: Url,
	token_endpoint: Url,
}

/// Returns the discovery document URL for `issuer`.
pub fn well_known_url(issuer: &Url) -> Result<Url, ConfigError> {
	let raw = format!("{}/.well-known/openid-configuration", issuer.as_str().trim_end_matches('/'));

	Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { field: "issuer", source })
}

impl ProviderDescriptor {
	/// Fetches the issuer's discovery document and builds a validated descriptor from it.
	///
	/// The document must name the same issuer it was fetched for.
	pub async fn discover(http: &ReqwestHttpClient, issuer: &Url) -> Result<Self> {
		let discovery_failed =
			|reason: String| ConfigError::Discovery { issuer: issuer.to_string(), reason };
		let url = well_known_url(issuer)?;
		let response = http
			.get(url)
			.header(reqwest::header::ACCEPT, "application/json")
			.send()
			.await
			.map_err(|e| discovery_failed(e.to_string()))?;
		let status = response.status();

		if !status.is_success() {
			return Err(discovery_failed(format!("HTTP {}", status.as_u16())).into());
		}

		let body = response.bytes().await.map_err(|e| discovery_failed(e.to_string()))?;
		let mut deserializer = serde_json::Deserializer::from_slice(&body);
		let document: DiscoveryDocument = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| ConfigError::DiscoveryParse { source })?;
		let descriptor = ProviderDescriptor::builder(issuer.clone())
			.authorization_endpoint(document.authorization_endpoint)
			.token_endpoint(document.token_endpoint)
			.build()
			.map_err(ConfigError::from)?;

		if !descriptor.is_issuer(&document.issuer) {
			return Err(discovery_failed(format!(
				"document names issuer `{}`",
				document.issuer
			))
			.into());
		}

		tracing::info!(
			authorization_endpoint = %descriptor.endpoints.authorization,
			token_endpoint = %descriptor.endpoints.token,
			"Discovered OIDC endpoints."
		);

		Ok(descriptor)
	}
}
