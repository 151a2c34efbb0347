//! grants-broker server binary.

// crates.io
use clap::Parser;
use color_eyre::eyre::Result;
use tokio::net::TcpListener;
// self
use grants_broker::{
	chain::ExchangeChain,
	config::Config,
	http::ReqwestHttpClient,
	obs,
	oidc::{OidcClient, ProviderDescriptor},
	upstream::aws::AwsUpstream,
	web::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	obs::init_tracing();

	let config = Config::parse();
	let chain_settings = config.chain_settings()?;
	let oidc_settings = config.oidc_settings()?;
	let session_settings = config.session_settings()?;
	let http_client = ReqwestHttpClient::new()?;
	let descriptor = match config.explicit_descriptor()? {
		Some(descriptor) => descriptor,
		None => ProviderDescriptor::discover(&http_client, &config.issuer()?).await?,
	};
	let oidc = OidcClient::new(descriptor, oidc_settings, http_client)?;
	let upstream = std::sync::Arc::new(AwsUpstream::from_region(config.region.clone()).await);
	let chain = ExchangeChain::new(
		chain_settings,
		upstream.clone(),
		upstream.clone(),
		upstream.clone(),
		upstream,
	);

	tracing::info!(
		region = %config.region,
		bucket = %chain.settings().bucket,
		object_key = %chain.settings().object_key,
		grant_target = %chain.settings().grant_target(),
		"Exchange chain configured."
	);

	let app = web::router(AppState::new(chain, oidc), &session_settings)?;
	let listener = TcpListener::bind(config.listen).await?;

	tracing::info!(listen = %config.listen, "grants-broker listening.");

	axum::serve(listener, app).with_graceful_shutdown(web::shutdown_signal()).await?;

	Ok(())
}
