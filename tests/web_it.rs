// crates.io
use axum::{
	Router,
	body::Body,
	http::{
		Request, Response, StatusCode,
		header::{COOKIE, LOCATION, SET_COOKIE},
	},
	response::IntoResponse,
};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use tower::ServiceExt;
// self
use grants_broker::{
	_preludet::*,
	auth::TokenSecret,
	chain::{ExchangeChain, Stage},
	oidc::{OidcClient, OidcClientSettings, ProviderDescriptor},
	upstream::UpstreamErrorContext,
	web::{self, AppState, SessionSettings},
};

const CLIENT_ID: &str = "grants-broker";

async fn start_mock_server() -> MockServer {
	install_test_crypto_provider();

	MockServer::start_async().await
}

fn build_app(server: &MockServer, upstream: Arc<ScriptedUpstream>) -> Router {
	let descriptor = ProviderDescriptor::builder(
		Url::parse(&server.base_url()).expect("Mock issuer should parse successfully."),
	)
	.authorization_endpoint(
		Url::parse(&server.url("/authorize"))
			.expect("Mock authorization endpoint should parse successfully."),
	)
	.token_endpoint(
		Url::parse(&server.url("/token")).expect("Mock token endpoint should parse successfully."),
	)
	.build()
	.expect("Provider descriptor should build successfully.");
	let settings = OidcClientSettings {
		client_id: CLIENT_ID.into(),
		client_secret: None,
		redirect_uri: Url::parse("http://localhost:5000/callback")
			.expect("Redirect URI should parse successfully."),
		scope: "openid email".parse().expect("Scope set should be valid."),
	};
	let oidc = OidcClient::new(descriptor, settings, test_reqwest_http_client())
		.expect("OIDC client should build successfully.");
	let sessions =
		SessionSettings::new(&TokenSecret::new("web-it-secret"), false, web::DEFAULT_SESSION_IDLE)
			.expect("Session settings should build successfully.");

	web::router(AppState::new(build_scripted_chain(upstream), oidc), &sessions)
		.expect("Router should build successfully.")
}

async fn send(app: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
	let mut request = Request::builder().uri(uri);

	if let Some(cookie) = cookie {
		request = request.header(COOKIE, cookie);
	}

	app.clone()
		.oneshot(request.body(Body::empty()).expect("Request should build successfully."))
		.await
		.expect("Router should answer every request.")
}

fn location(response: &Response<Body>) -> String {
	response
		.headers()
		.get(LOCATION)
		.expect("Redirects should carry a location.")
		.to_str()
		.expect("Location should be ASCII.")
		.to_owned()
}

fn session_cookie(response: &Response<Body>) -> Option<String> {
	response
		.headers()
		.get_all(SET_COOKIE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.find(|value| value.starts_with("id="))
		.and_then(|value| value.split(';').next())
		.map(ToOwned::to_owned)
}

async fn body_text(response: Response<Body>) -> String {
	let bytes = response
		.into_body()
		.collect()
		.await
		.expect("Response body should be readable.")
		.to_bytes();

	String::from_utf8(bytes.to_vec()).expect("Response body should be UTF-8.")
}

async fn sign_in(app: &Router, server: &MockServer, next: &str) -> String {
	let (cookie, landing) = sign_in_for(app, server, next, Duration::hours(1)).await;

	assert_eq!(landing, next);

	cookie
}

/// Drives `/login` and the callback against the mock provider.
///
/// The issued ID token expires `lifetime` from now. Returns the signed-in cookie and the location
/// the callback redirected to.
async fn sign_in_for(
	app: &Router,
	server: &MockServer,
	next: &str,
	lifetime: Duration,
) -> (String, String) {
	let response = send(app, &format!("/login?next={next}"), None).await;

	assert_eq!(response.status(), StatusCode::SEE_OTHER);

	let cookie = session_cookie(&response).expect("Login should start a session.");
	let authorize_url =
		Url::parse(&location(&response)).expect("Authorize URL should parse successfully.");
	let pairs: HashMap<_, _> = authorize_url.query_pairs().into_owned().collect();
	let id_token = mint_unsigned_jwt(&serde_json::json!({
		"iss": server.base_url(),
		"sub": "user-alice",
		"aud": CLIENT_ID,
		"exp": (OffsetDateTime::now_utc() + lifetime).unix_timestamp(),
		"nonce": pairs["nonce"],
		"email": "alice@example.com",
	}));
	let body = serde_json::json!({
		"access_token": "access-it",
		"token_type": "bearer",
		"expires_in": 3600,
		"id_token": id_token,
	});
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(body.to_string());
		})
		.await;
	let response =
		send(app, &format!("/callback?code=valid-code&state={}", pairs["state"]), Some(&cookie))
			.await;

	mock.assert_async().await;

	assert_eq!(response.status(), StatusCode::SEE_OTHER);

	let signed_in = session_cookie(&response).expect("Login should rotate the session id.");

	assert_ne!(signed_in, cookie);

	(signed_in, location(&response))
}

#[tokio::test]
async fn anonymous_data_requests_redirect_to_login_without_running_the_chain() {
	let server = start_mock_server().await;
	let upstream = Arc::new(ScriptedUpstream::new());
	let app = build_app(&server, upstream.clone());
	let response = send(&app, "/get-s3-data", None).await;

	assert_eq!(response.status(), StatusCode::SEE_OTHER);
	assert_eq!(location(&response), "/login?next=/get-s3-data");
	assert!(upstream.calls().is_empty());

	let index = body_text(send(&app, "/", None).await).await;

	assert_eq!(index, "Not logged in! <a href=\"/login\">Log in</a>");
}

#[tokio::test]
async fn login_data_and_logout_round_trip() {
	let server = start_mock_server().await;
	let upstream = Arc::new(ScriptedUpstream::new());
	let app = build_app(&server, upstream.clone());
	let cookie = sign_in(&app, &server, "/get-s3-data").await;
	let response = send(&app, "/get-s3-data", Some(&cookie)).await;

	assert_eq!(response.status(), StatusCode::OK);

	let first = body_text(response).await;
	let payload: serde_json::Value =
		serde_json::from_str(&first).expect("Data route should return JSON text.");

	assert_eq!(
		payload,
		serde_json::json!({
			"s3_object_data": [{ "id": "1", "name": "Alice" }, { "id": "2", "name": "Bob" }]
		})
	);
	assert_eq!(
		upstream.called_stages(),
		vec![Stage::Exchanging, Stage::AssumingRole, Stage::ResolvingAccess, Stage::FetchingObject]
	);

	let second = body_text(send(&app, "/get-s3-data", Some(&cookie)).await).await;

	assert_eq!(first, second);

	let index = body_text(send(&app, "/", Some(&cookie)).await).await;

	assert_eq!(
		index,
		"Welcome, alice@example.com! <a href=\"/logout\">Log out</a> --- <a href=\"/get-s3-data\">Get S3 Data</a>"
	);

	let response = send(&app, "/login", Some(&cookie)).await;

	assert_eq!(response.status(), StatusCode::SEE_OTHER);
	assert_eq!(location(&response), "/");

	let response = send(&app, "/logout", Some(&cookie)).await;

	assert_eq!(response.status(), StatusCode::SEE_OTHER);
	assert_eq!(location(&response), "/");

	let index = body_text(send(&app, "/", Some(&cookie)).await).await;

	assert!(index.starts_with("Not logged in!"));

	let response = send(&app, "/get-s3-data", Some(&cookie)).await;

	assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn expired_identities_are_signed_out() {
	let server = start_mock_server().await;
	let upstream = Arc::new(ScriptedUpstream::new());
	let app = build_app(&server, upstream.clone());
	let (cookie, _) = sign_in_for(&app, &server, "/", Duration::seconds(3)).await;

	tokio::time::sleep(std::time::Duration::from_secs(4)).await;

	let response = send(&app, "/get-s3-data", Some(&cookie)).await;

	assert_eq!(response.status(), StatusCode::SEE_OTHER);
	assert_eq!(location(&response), "/login?next=/get-s3-data");

	let index = body_text(send(&app, "/", Some(&cookie)).await).await;

	assert_eq!(index, "Not logged in! <a href=\"/login\">Log in</a>");
	assert!(upstream.calls().is_empty());
}

#[tokio::test]
async fn stage_failures_map_to_http_statuses() {
	let cases = [
		(
			UpstreamErrorContext::new(Stage::Exchanging)
				.with_http_status(400)
				.with_code("InvalidGrantException"),
			StatusCode::UNAUTHORIZED,
		),
		(
			UpstreamErrorContext::new(Stage::ResolvingAccess)
				.with_http_status(403)
				.with_code("AccessDenied"),
			StatusCode::FORBIDDEN,
		),
		(
			UpstreamErrorContext::new(Stage::FetchingObject)
				.with_http_status(404)
				.with_code("NoSuchKey"),
			StatusCode::INTERNAL_SERVER_ERROR,
		),
		(
			UpstreamErrorContext::new(Stage::AssumingRole).with_http_status(503),
			StatusCode::BAD_GATEWAY,
		),
	];

	for (failure, status) in cases {
		let server = start_mock_server().await;
		let upstream = Arc::new(ScriptedUpstream::new().failing_at(failure));
		let app = build_app(&server, upstream);
		let cookie = sign_in(&app, &server, "/get-s3-data").await;
		let response = send(&app, "/get-s3-data", Some(&cookie)).await;

		assert_eq!(response.status(), status);
	}
}

#[tokio::test]
async fn slow_stages_hit_the_deadline() {
	let upstream = Arc::new(
		ScriptedUpstream::new()
			.delayed_at(Stage::FetchingObject, std::time::Duration::from_secs(60)),
	);
	let settings = test_chain_settings()
		.with_deadline(Duration::milliseconds(200))
		.expect("Positive deadlines should be accepted.");
	let chain = ExchangeChain::new(
		settings,
		upstream.clone(),
		upstream.clone(),
		upstream.clone(),
		upstream.clone(),
	);
	let err = chain.run(&test_identity_token()).await.expect_err("Slow fetches must time out.");

	assert!(matches!(err, Error::DeadlineExceeded { stage: Stage::FetchingObject, .. }));
	assert_eq!(err.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
	assert_eq!(upstream.called_stages().len(), 4);
}

#[tokio::test]
async fn callbacks_without_a_pending_login_are_rejected() {
	let server = start_mock_server().await;
	let app = build_app(&server, Arc::new(ScriptedUpstream::new()));
	let response = send(&app, "/callback?code=valid-code&state=unknown", None).await;

	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

	let response = send(&app, "/login", None).await;
	let cookie = session_cookie(&response).expect("Login should start a session.");
	let response =
		send(&app, "/callback?error=access_denied&error_description=denied", Some(&cookie)).await;

	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	assert!(body_text(response).await.contains("access_denied"));
}

#[tokio::test]
async fn login_refuses_off_site_return_paths() {
	let server = start_mock_server().await;
	let app = build_app(&server, Arc::new(ScriptedUpstream::new()));
	let cookie = sign_in(&app, &server, "/").await;

	for next in ["//evil.example.com", "/%09/evil.example.com", "/%0d%0a/evil.example.com"] {
		let response = send(&app, &format!("/login?next={next}"), Some(&cookie)).await;

		assert_eq!(response.status(), StatusCode::SEE_OTHER);
		assert_eq!(location(&response), "/");
	}
}

#[tokio::test]
async fn callbacks_refuse_off_site_return_paths() {
	let server = start_mock_server().await;
	let app = build_app(&server, Arc::new(ScriptedUpstream::new()));
	let (_, landing) =
		sign_in_for(&app, &server, "/%09/evil.example.com", Duration::hours(1)).await;

	assert_eq!(landing, "/");
}
