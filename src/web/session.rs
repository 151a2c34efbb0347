//! Session keys and the signed-in user extractor.

// crates.io
use axum::{
	extract::FromRequestParts,
	http::request::Parts,
	response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
// self
use crate::{_prelude::*, auth::IdentityToken, oidc::PendingLogin};

pub(crate) const USER_KEY: &str = "grants_broker.user";
pub(crate) const PENDING_LOGIN_KEY: &str = "grants_broker.pending_login";

/// User signed in through the OIDC login, as stored in the session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthenticatedUser {
	/// Identity token obtained at login.
	pub identity: IdentityToken,
}
impl AuthenticatedUser {
	/// Name shown on the index page: the email when known, else the subject.
	pub fn display_name(&self) -> &str {
		self.identity.email.as_deref().unwrap_or(&self.identity.subject)
	}

	/// Reads the current user from `session`.
	///
	/// A user whose identity token has expired is removed and reported as signed out.
	pub(crate) async fn current(session: &Session) -> Result<Option<Self>> {
		let Some(user) = session.get::<Self>(USER_KEY).await? else {
			return Ok(None);
		};

		if user.identity.is_expired_at(OffsetDateTime::now_utc()) {
			tracing::info!(subject = %user.identity.subject, "Signed-in identity expired.");

			session.remove::<Self>(USER_KEY).await?;

			return Ok(None);
		}

		Ok(Some(user))
	}

	pub(crate) async fn store(self, session: &Session) -> Result<()> {
		Ok(session.insert(USER_KEY, self).await?)
	}
}
impl<S> FromRequestParts<S> for AuthenticatedUser
where
	S: Send + Sync,
{
	type Rejection = Response;

	async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
		let session =
			Session::from_request_parts(parts, state).await.map_err(IntoResponse::into_response)?;

		match Self::current(&session).await {
			Ok(Some(user)) => Ok(user),
			Ok(None) => Err(Redirect::to(&login_redirect(parts.uri.path())).into_response()),
			Err(e) => Err(e.into_response()),
		}
	}
}

pub(crate) async fn stash_pending_login(session: &Session, pending: PendingLogin) -> Result<()> {
	Ok(session.insert(PENDING_LOGIN_KEY, pending).await?)
}

pub(crate) async fn take_pending_login(session: &Session) -> Result<Option<PendingLogin>> {
	Ok(session.remove::<PendingLogin>(PENDING_LOGIN_KEY).await?)
}

/// Returns `next` when it is a path on this host, else `/`.
pub(crate) fn local_return_path(next: Option<&str>) -> &str {
	match next {
		Some(path)
			if path.starts_with('/')
				&& !path.starts_with("//")
				&& path.bytes().all(|b| b.is_ascii_graphic() && b != b'\\') =>
			path,
		_ => "/",
	}
}

fn login_redirect(path: &str) -> String {
	let plain = path
		.bytes()
		.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'/' | b'-' | b'_' | b'.'));

	if plain && path != "/" { format!("/login?next={path}") } else { "/login".into() }
}
