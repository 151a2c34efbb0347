//! Upstream failure classification.
//!
//! Each service error is reduced to primitive data (stage, status, error code, message) and then
//! split into a stage rejection or a transient failure. The error code wins over the HTTP status;
//! network failures are always transient.

// self
use crate::{_prelude::*, chain::Stage, error::DataReadError};

const MESSAGE_LIMIT: usize = 256;

/// Outcome of classifying an upstream failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpstreamErrorKind {
	/// The service refused the request; the stage's own error applies.
	Rejected,
	/// The failure is temporary (network, throttling, 5xx).
	Transient,
}

/// Primitive description of an upstream failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamErrorContext {
	/// Stage that issued the request.
	pub stage: Stage,
	/// HTTP status code returned by the service, when available.
	pub http_status: Option<u16>,
	/// Service error code (e.g. `AccessDenied`).
	pub code: Option<String>,
	/// Service or transport message.
	pub message: Option<String>,
	/// Whether the failure happened before a response arrived.
	pub network_error: bool,
	/// Object the fetch stage was reading.
	pub object: Option<(String, String)>,
}
impl UpstreamErrorContext {
	/// Creates an empty context for the stage.
	pub fn new(stage: Stage) -> Self {
		Self { stage, http_status: None, code: None, message: None, network_error: false, object: None }
	}

	/// Context for a failure that never reached the service.
	pub fn network_failure(stage: Stage) -> Self {
		let mut ctx = Self::new(stage);

		ctx.network_error = true;

		ctx
	}

	/// Adds the HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the service error code.
	pub fn with_code(mut self, code: impl Into<String>) -> Self {
		self.code = Some(code.into());

		self
	}

	/// Adds a message, truncated to a short preview.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(truncate(message.into()));

		self
	}

	/// Records the object being fetched.
	pub fn with_object(mut self, bucket: impl Into<String>, key: impl Into<String>) -> Self {
		self.object = Some((bucket.into(), key.into()));

		self
	}

	/// Classifies the failure.
	pub fn kind(&self) -> UpstreamErrorKind {
		if self.network_error {
			return UpstreamErrorKind::Transient;
		}
		if let Some(kind) = self.code.as_deref().and_then(classify_code) {
			return kind;
		}

		classify_status(self.http_status)
	}

	/// Converts the context into the broker error for its stage.
	pub fn into_error(self) -> Error {
		let reason = self.reason();

		match (self.kind(), self.stage) {
			(UpstreamErrorKind::Transient, stage) =>
				Error::Upstream { stage, message: reason, status: self.http_status },
			(UpstreamErrorKind::Rejected, Stage::Exchanging) =>
				Error::AuthenticationExchange { reason },
			(UpstreamErrorKind::Rejected, Stage::AssumingRole) => Error::Authorization { reason },
			(UpstreamErrorKind::Rejected, Stage::ResolvingAccess) => Error::AccessDenied { reason },
			(UpstreamErrorKind::Rejected, Stage::FetchingObject | Stage::Done) => {
				let (bucket, key) = self.object.unwrap_or_default();

				DataReadError::Fetch { bucket, key, reason, status: self.http_status }.into()
			},
		}
	}

	fn reason(&self) -> String {
		match (&self.code, &self.message) {
			(Some(code), Some(message)) => format!("{code} ({message})"),
			(Some(code), None) => code.clone(),
			(None, Some(message)) => message.clone(),
			(None, None) => match self.http_status {
				Some(status) => format!("HTTP {status}"),
				None => "no response".into(),
			},
		}
	}
}

fn truncate(message: String) -> String {
	if message.chars().count() <= MESSAGE_LIMIT {
		return message;
	}

	let mut buf = message.chars().take(MESSAGE_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn classify_code(code: &str) -> Option<UpstreamErrorKind> {
	const REJECTED: &[&str] = &[
		"AccessDenied",
		"AccessDeniedException",
		"AuthorizationPendingException",
		"ExpiredToken",
		"ExpiredTokenException",
		"IDPRejectedClaim",
		"InvalidClientException",
		"InvalidGrantException",
		"InvalidIdentityToken",
		"InvalidRequestException",
		"InvalidRequestRegionException",
		"InvalidScopeException",
		"InvalidAccessKeyId",
		"InvalidParameterValue",
		"InvalidToken",
		"MalformedPolicyDocument",
		"NoSuchBucket",
		"NoSuchKey",
		"PackedPolicyTooLarge",
		"RegionDisabledException",
		"SignatureDoesNotMatch",
		"UnauthorizedClientException",
		"UnsupportedGrantTypeException",
	];
	const TRANSIENT: &[&str] = &[
		"IDPCommunicationError",
		"InternalError",
		"InternalServerError",
		"InternalServerException",
		"RequestTimeout",
		"RequestTimeoutException",
		"ServiceUnavailable",
		"ServiceUnavailableException",
		"SlowDown",
		"Throttling",
		"ThrottlingException",
		"TooManyRequestsException",
	];

	if REJECTED.iter().any(|known| known.eq_ignore_ascii_case(code)) {
		Some(UpstreamErrorKind::Rejected)
	} else if TRANSIENT.iter().any(|known| known.eq_ignore_ascii_case(code)) {
		Some(UpstreamErrorKind::Transient)
	} else {
		None
	}
}

fn classify_status(status: Option<u16>) -> UpstreamErrorKind {
	match status {
		Some(408 | 429) => UpstreamErrorKind::Transient,
		Some(code) if (400..500).contains(&code) => UpstreamErrorKind::Rejected,
		_ => UpstreamErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn codes_take_precedence_over_status() {
		let throttled = UpstreamErrorContext::new(Stage::AssumingRole)
			.with_http_status(400)
			.with_code("Throttling");
		let denied = UpstreamErrorContext::new(Stage::ResolvingAccess)
			.with_http_status(503)
			.with_code("AccessDenied");

		assert_eq!(throttled.kind(), UpstreamErrorKind::Transient);
		assert_eq!(denied.kind(), UpstreamErrorKind::Rejected);
	}

	#[test]
	fn status_fallback_splits_client_and_server_failures() {
		let kind = |status| UpstreamErrorContext::new(Stage::Exchanging).with_http_status(status).kind();

		assert_eq!(kind(400), UpstreamErrorKind::Rejected);
		assert_eq!(kind(403), UpstreamErrorKind::Rejected);
		assert_eq!(kind(429), UpstreamErrorKind::Transient);
		assert_eq!(kind(500), UpstreamErrorKind::Transient);
		assert_eq!(UpstreamErrorContext::new(Stage::Exchanging).kind(), UpstreamErrorKind::Transient);
		assert_eq!(
			UpstreamErrorContext::network_failure(Stage::Exchanging).with_code("AccessDenied").kind(),
			UpstreamErrorKind::Transient
		);
	}

	#[test]
	fn rejections_map_to_their_stage_error() {
		let rejected = |stage| {
			UpstreamErrorContext::new(stage).with_http_status(403).with_code("AccessDenied").into_error()
		};

		assert!(matches!(rejected(Stage::Exchanging), Error::AuthenticationExchange { .. }));
		assert!(matches!(rejected(Stage::AssumingRole), Error::Authorization { .. }));
		assert!(matches!(rejected(Stage::ResolvingAccess), Error::AccessDenied { .. }));

		let fetch = UpstreamErrorContext::new(Stage::FetchingObject)
			.with_http_status(404)
			.with_code("NoSuchKey")
			.with_object("bucket", "users/user_list")
			.into_error();

		match fetch {
			Error::DataRead(DataReadError::Fetch { bucket, key, status, .. }) => {
				assert_eq!(bucket, "bucket");
				assert_eq!(key, "users/user_list");
				assert_eq!(status, Some(404));
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn transient_failures_keep_stage_and_status() {
		let err = UpstreamErrorContext::new(Stage::FetchingObject)
			.with_http_status(503)
			.with_message("slow down")
			.into_error();

		assert!(matches!(
			err,
			Error::Upstream { stage: Stage::FetchingObject, status: Some(503), .. }
		));
	}

	#[test]
	fn long_messages_are_truncated() {
		let ctx = UpstreamErrorContext::new(Stage::Exchanging).with_message("x".repeat(1_000));

		assert_eq!(ctx.message.map(|m| m.chars().count()), Some(MESSAGE_LIMIT + 1));
	}
}
