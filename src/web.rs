//! HTTP surface: login, callback, logout, and the data route, served by axum.
//!
//! The signed-in user lives in a server-side session (in-memory store, signed cookie). Handlers
//! receive it through the [`AuthenticatedUser`] extractor.

mod response;
mod routes;
mod session;

pub use session::*;

// crates.io
use axum::{Router, routing::get};
use sha2::{Digest, Sha512};
use tower_http::trace::TraceLayer;
use tower_sessions::{
	Expiry, MemoryStore, SessionManagerLayer, cookie::Key, service::SignedCookie,
};
// self
use crate::{
	_prelude::*, auth::TokenSecret, chain::ExchangeChain, error::ConfigError, oidc::OidcClient,
};

/// Default idle lifetime of a session.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::hours(1);

const RESERVED_PATHS: [&str; 4] = ["/", "/login", "/logout", "/get-s3-data"];

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
	/// Exchange chain run by the data route.
	pub chain: Arc<ExchangeChain>,
	/// OIDC client driving login and callback.
	pub oidc: Arc<OidcClient>,
}
impl AppState {
	/// Bundles the chain and the login client.
	pub fn new(chain: ExchangeChain, oidc: OidcClient) -> Self {
		Self { chain: Arc::new(chain), oidc: Arc::new(oidc) }
	}
}

/// Cookie and lifetime settings of the session layer.
#[derive(Clone)]
pub struct SessionSettings {
	key: Key,
	/// Marks the session cookie `Secure`.
	pub secure: bool,
	/// Sessions expire after this much inactivity.
	pub idle_timeout: Duration,
}
impl SessionSettings {
	/// Derives the cookie signing key from `secret`.
	pub fn new(
		secret: &TokenSecret,
		secure: bool,
		idle_timeout: Duration,
	) -> Result<Self, ConfigError> {
		if secret.is_empty() {
			return Err(ConfigError::EmptySessionSecret);
		}

		let digest = Sha512::digest(secret.expose().as_bytes());

		Ok(Self { key: Key::from(digest.as_slice()), secure, idle_timeout })
	}

	fn layer(&self) -> SessionManagerLayer<MemoryStore, SignedCookie> {
		let idle =
			tower_sessions::cookie::time::Duration::seconds(self.idle_timeout.whole_seconds());

		SessionManagerLayer::new(MemoryStore::default())
			.with_secure(self.secure)
			.with_expiry(Expiry::OnInactivity(idle))
			.with_signed(self.key.clone())
	}
}
impl Debug for SessionSettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionSettings")
			.field("key", &"<redacted>")
			.field("secure", &self.secure)
			.field("idle_timeout", &self.idle_timeout)
			.finish()
	}
}

/// Builds the application router.
///
/// The callback route is mounted at the path of the configured redirect URI.
pub fn router(state: AppState, sessions: &SessionSettings) -> Result<Router, ConfigError> {
	let callback = state.oidc.redirect_path().to_owned();

	if RESERVED_PATHS.contains(&callback.as_str()) {
		return Err(ConfigError::ReservedRedirectPath { path: callback });
	}

	let router = Router::new()
		.route("/", get(routes::index))
		.route("/login", get(routes::login))
		.route(&callback, get(routes::callback))
		.route("/logout", get(routes::logout))
		.route("/get-s3-data", get(routes::get_s3_data))
		.layer(sessions.layer())
		.layer(TraceLayer::new_for_http())
		.with_state(state);

	Ok(router)
}

/// Resolves once the process receives Ctrl-C (or SIGTERM on Unix).
pub async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "Failed to listen for Ctrl-C.");
		}
	};
	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			},
			Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM."),
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	tracing::info!("Shutdown signal received.");
}
