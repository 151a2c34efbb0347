//! Broker-level error types shared across the chain, the login client, and the web surface.

// self
use crate::{_prelude::*, chain::Stage};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
///
/// Every chain stage owns exactly one rejection variant; transient failures from any stage are
/// folded into [`Error::Upstream`] with the stage attached.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) while talking to the identity provider.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Object fetch, decode, or CSV parsing failure.
	#[error(transparent)]
	DataRead(#[from] DataReadError),

	/// The federation service rejected the identity token or returned an unusable token.
	#[error("Identity token exchange failed: {reason}.")]
	AuthenticationExchange {
		/// Service- or broker-supplied reason string.
		reason: String,
	},
	/// Role assumption with the identity context was refused.
	#[error("Role assumption with identity context failed: {reason}.")]
	Authorization {
		/// Service- or broker-supplied reason string.
		reason: String,
	},
	/// No access grant matched the requested target and permission.
	#[error("Access grant resolution was denied: {reason}.")]
	AccessDenied {
		/// Service- or broker-supplied reason string.
		reason: String,
	},
	/// Temporary upstream failure (network, throttling, 5xx) while running a stage.
	#[error("Upstream failure while {stage}: {message}.")]
	Upstream {
		/// Stage that was running when the failure occurred.
		stage: Stage,
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The end-to-end chain deadline elapsed.
	#[error("Exchange chain exceeded its {after} deadline while {stage}.")]
	DeadlineExceeded {
		/// Stage that was running when the deadline elapsed.
		stage: Stage,
		/// Configured deadline.
		after: Duration,
	},
	/// The OIDC login callback could not be completed.
	#[error("Login failed: {reason}.")]
	Login {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// The session store could not be read or written.
	#[error("Session store failed.")]
	Session(
		#[from]
		#[source]
		tower_sessions::session::Error,
	),
}
impl Error {
	/// Returns the chain stage this error belongs to, if it was raised by the chain.
	pub fn stage(&self) -> Option<Stage> {
		match self {
			Self::AuthenticationExchange { .. } => Some(Stage::Exchanging),
			Self::Authorization { .. } => Some(Stage::AssumingRole),
			Self::AccessDenied { .. } => Some(Stage::ResolvingAccess),
			Self::DataRead(_) => Some(Stage::FetchingObject),
			Self::Upstream { stage, .. } | Self::DeadlineExceeded { stage, .. } => Some(*stage),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Provider descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::oidc::ProviderDescriptorError),
	/// Requested login scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::oidc::ScopeValidationError),
	/// A configured URL cannot be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Configuration field holding the URL.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The redirect URI cannot be served by this process.
	#[error("Redirect URI `{uri}` must have a non-root path.")]
	InvalidRedirectPath {
		/// Offending redirect URI.
		uri: String,
	},
	/// The OIDC discovery document could not be fetched.
	#[error("OIDC discovery for `{issuer}` failed: {reason}.")]
	Discovery {
		/// Issuer whose metadata was requested.
		issuer: String,
		/// Transport- or status-level reason string.
		reason: String,
	},
	/// The OIDC discovery document is malformed.
	#[error("OIDC discovery document is malformed.")]
	DiscoveryParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The chain deadline must be positive.
	#[error("The chain deadline must be positive.")]
	NonPositiveDeadline,
	/// The session signing secret is empty.
	#[error("The session signing secret cannot be empty.")]
	EmptySessionSecret,
	/// The callback path collides with another route.
	#[error("Redirect path `{path}` is already served by another route.")]
	ReservedRedirectPath {
		/// Offending path.
		path: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures raised while reading and reshaping the target object.
#[derive(Debug, ThisError)]
pub enum DataReadError {
	/// The object could not be fetched with the granted credentials.
	#[error("Object s3://{bucket}/{key} could not be read: {reason}.")]
	Fetch {
		/// Bucket holding the object.
		bucket: String,
		/// Object key.
		key: String,
		/// Service- or broker-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The object body is not UTF-8 text.
	#[error("Object body is not valid UTF-8.")]
	Decode(#[from] std::string::FromUtf8Error),
	/// The object body is not well-formed CSV.
	#[error("Object body is not valid CSV.")]
	Csv(#[from] csv::Error),
	/// The parsed rows could not be serialized.
	#[error("Object rows could not be serialized.")]
	Serialize(#[from] serde_json::Error),
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the identity provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the identity provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
