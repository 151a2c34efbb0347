//! Route handlers.

// crates.io
use axum::{
	extract::{Query, State},
	response::{Html, Redirect},
};
use tower_sessions::Session;
// self
use crate::{
	_prelude::*,
	web::{
		AppState, AuthenticatedUser,
		session::{local_return_path, stash_pending_login, take_pending_login},
	},
};

#[derive(Debug, Deserialize)]
pub(crate) struct LoginParams {
	next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackParams {
	code: Option<String>,
	state: Option<String>,
	error: Option<String>,
	error_description: Option<String>,
}

pub(crate) async fn index(session: Session) -> Result<Html<String>> {
	let page = match AuthenticatedUser::current(&session).await? {
		Some(user) => format!(
			"Welcome, {}! <a href=\"/logout\">Log out</a> --- <a href=\"/get-s3-data\">Get S3 Data</a>",
			escape_html(user.display_name())
		),
		None => "Not logged in! <a href=\"/login\">Log in</a>".into(),
	};

	Ok(Html(page))
}

pub(crate) async fn login(
	State(state): State<AppState>,
	session: Session,
	Query(params): Query<LoginParams>,
) -> Result<Redirect> {
	let return_to = local_return_path(params.next.as_deref());

	if AuthenticatedUser::current(&session).await?.is_some() {
		return Ok(Redirect::to(return_to));
	}

	let (pending, url) = state.oidc.start_login(return_to);

	stash_pending_login(&session, pending).await?;

	Ok(Redirect::to(url.as_str()))
}

pub(crate) async fn callback(
	State(state): State<AppState>,
	session: Session,
	Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
	let pending = take_pending_login(&session)
		.await?
		.ok_or_else(|| Error::Login { reason: "no login is in progress".into() })?;

	if let Some(error) = params.error {
		let reason = match params.error_description {
			Some(description) => format!("provider returned {error} ({description})"),
			None => format!("provider returned {error}"),
		};

		return Err(Error::Login { reason });
	}

	let (Some(code), Some(returned_state)) = (params.code, params.state) else {
		return Err(Error::Login { reason: "callback is missing code or state".into() });
	};
	let identity = state.oidc.complete_login(pending.clone(), &returned_state, &code).await?;

	tracing::info!(subject = %identity.subject, "User signed in.");

	session.cycle_id().await?;
	AuthenticatedUser { identity }.store(&session).await?;

	Ok(Redirect::to(local_return_path(Some(&pending.return_to))))
}

pub(crate) async fn logout(session: Session) -> Result<Redirect> {
	session.flush().await?;

	Ok(Redirect::to("/"))
}

pub(crate) async fn get_s3_data(
	State(state): State<AppState>,
	user: AuthenticatedUser,
) -> Result<String> {
	let payload = state.chain.run(&user.identity).await?;

	tracing::info!(subject = %user.identity.subject, rows = payload.rows.len(), "Object served.");

	Ok(payload.to_text()?)
}

fn escape_html(raw: &str) -> String {
	let mut escaped = String::with_capacity(raw.len());

	for c in raw.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#x27;"),
			other => escaped.push(other),
		}
	}

	escaped
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn display_names_are_escaped() {
		assert_eq!(escape_html("alice@example.com"), "alice@example.com");
		assert_eq!(
			escape_html("<b>\"x\"&'y'</b>"),
			"&lt;b&gt;&quot;x&quot;&amp;&#x27;y&#x27;&lt;/b&gt;"
		);
	}
}
