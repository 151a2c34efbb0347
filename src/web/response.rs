//! HTTP mapping of broker errors.

// crates.io
use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
};
// self
use crate::_prelude::*;

impl Error {
	/// HTTP status returned to the browser for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::AuthenticationExchange { .. } | Self::Authorization { .. } | Self::Login { .. } =>
				StatusCode::UNAUTHORIZED,
			Self::AccessDenied { .. } => StatusCode::FORBIDDEN,
			Self::DataRead(_) | Self::Session(_) | Self::Config(_) =>
				StatusCode::INTERNAL_SERVER_ERROR,
			Self::Upstream { .. } | Self::Transport(_) => StatusCode::BAD_GATEWAY,
			Self::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
		}
	}

	fn public_message(&self) -> String {
		match self {
			Self::Config(_) => "The broker is misconfigured.".into(),
			Self::Session(_) => "The session could not be loaded.".into(),
			Self::Transport(_) => "The identity provider could not be reached.".into(),
			other => other.to_string(),
		}
	}
}
impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = self.status_code();
		let stage = self.stage();
		let chain = error_chain(&self);

		if status.is_server_error() {
			tracing::error!(status = status.as_u16(), ?stage, error = %chain, "Request failed.");
		} else {
			tracing::warn!(status = status.as_u16(), ?stage, error = %chain, "Request rejected.");
		}

		(status, self.public_message()).into_response()
	}
}

fn error_chain(err: &dyn StdError) -> String {
	let mut rendered = err.to_string();
	let mut source = err.source();

	while let Some(inner) = source {
		rendered.push_str(": ");
		rendered.push_str(&inner.to_string());

		source = inner.source();
	}

	rendered
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{chain::Stage, error::DataReadError};

	#[test]
	fn each_stage_maps_to_its_own_status() {
		let cases = [
			(Error::AuthenticationExchange { reason: "expired".into() }, 401),
			(Error::Authorization { reason: "denied".into() }, 401),
			(Error::AccessDenied { reason: "no grant".into() }, 403),
			(
				Error::DataRead(DataReadError::Fetch {
					bucket: "b".into(),
					key: "k".into(),
					reason: "NoSuchKey".into(),
					status: Some(404),
				}),
				500,
			),
			(
				Error::Upstream { stage: Stage::AssumingRole, message: "throttled".into(), status: None },
				502,
			),
			(
				Error::DeadlineExceeded { stage: Stage::FetchingObject, after: Duration::seconds(20) },
				504,
			),
			(Error::Login { reason: "state mismatch".into() }, 401),
		];

		for (err, status) in cases {
			assert_eq!(err.status_code().as_u16(), status, "{err}");
		}
	}

	#[test]
	fn responses_hide_internal_details() {
		let err = Error::Config(crate::error::ConfigError::EmptySessionSecret);

		assert_eq!(err.public_message(), "The broker is misconfigured.");
		assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn error_chain_joins_sources() {
		let err = Error::DataRead(DataReadError::Decode(
			String::from_utf8(vec![0xff]).expect_err("Invalid UTF-8 fixture must fail."),
		));

		assert!(error_chain(&err).starts_with("Object body is not valid UTF-8.: "));
	}
}
