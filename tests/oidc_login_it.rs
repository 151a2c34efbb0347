// crates.io
use httpmock::prelude::*;
// self
use grants_broker::{
	_preludet::*,
	auth::TokenSecret,
	error::ConfigError,
	oidc::{
		OidcClient, OidcClientSettings, PkceCodeChallengeMethod, ProviderDescriptor,
		ProviderDescriptorError,
	},
};

const CLIENT_ID: &str = "grants-broker";
const CLIENT_SECRET: &str = "secret-it";
const BASIC_AUTH: &str = "Basic Z3JhbnRzLWJyb2tlcjpzZWNyZXQtaXQ=";

async fn start_mock_server() -> MockServer {
	install_test_crypto_provider();

	MockServer::start_async().await
}

fn build_descriptor(server: &MockServer) -> ProviderDescriptor {
	ProviderDescriptor::builder(
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
	.expect("Provider descriptor should build successfully.")
}

fn build_client(server: &MockServer) -> OidcClient {
	let settings = OidcClientSettings {
		client_id: CLIENT_ID.into(),
		client_secret: Some(TokenSecret::new(CLIENT_SECRET)),
		redirect_uri: Url::parse("http://localhost:5000/callback")
			.expect("Redirect URI should parse successfully."),
		scope: "openid email profile".parse().expect("Scope set should be valid."),
	};

	OidcClient::new(build_descriptor(server), settings, test_reqwest_http_client())
		.expect("OIDC client should build successfully.")
}

fn id_token_for(server: &MockServer, nonce: &str) -> String {
	mint_unsigned_jwt(&serde_json::json!({
		"iss": server.base_url(),
		"sub": "user-alice",
		"aud": CLIENT_ID,
		"exp": (OffsetDateTime::now_utc() + Duration::hours(1)).unix_timestamp(),
		"nonce": nonce,
		"email": "alice@example.com",
	}))
}

fn token_body(id_token: Option<&str>) -> String {
	let mut body = serde_json::json!({
		"access_token": "access-it",
		"token_type": "bearer",
		"expires_in": 3600,
	});

	if let Some(id_token) = id_token {
		body["id_token"] = id_token.into();
	}

	body.to_string()
}

#[tokio::test]
async fn login_round_trip_yields_the_identity_token() {
	let server = start_mock_server().await;
	let client = build_client(&server);
	let (pending, authorize_url) = client.start_login("/get-s3-data");
	let pairs: HashMap<_, _> = authorize_url.query_pairs().into_owned().collect();

	assert_eq!(authorize_url.path(), "/authorize");
	assert_eq!(pairs.get("state"), Some(&pending.state));
	assert_eq!(pairs.get("nonce"), Some(&pending.nonce));
	assert_eq!(pending.code_challenge_method(), PkceCodeChallengeMethod::S256);

	let id_token = id_token_for(&server, &pending.nonce);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.header("authorization", BASIC_AUTH);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body(Some(&id_token)));
		})
		.await;
	let state = pending.state.clone();
	let identity = client
		.complete_login(pending, &state, "valid-code")
		.await
		.expect("Login should complete successfully.");

	mock.assert_async().await;

	assert_eq!(identity.expose(), id_token);
	assert_eq!(identity.subject, "user-alice");
	assert_eq!(identity.email.as_deref(), Some("alice@example.com"));
	assert!(!identity.is_expired_at(OffsetDateTime::now_utc()));
}

#[tokio::test]
async fn invalid_grant_is_a_login_error() {
	let server = start_mock_server().await;
	let client = build_client(&server);
	let (pending, _) = client.start_login("/");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"already used\"}");
		})
		.await;
	let state = pending.state.clone();
	let err = client
		.complete_login(pending, &state, "stale-code")
		.await
		.expect_err("Invalid grants must fail the login.");

	mock.assert_async().await;

	match err {
		Error::Login { reason } => {
			assert!(reason.contains("invalid_grant"));
			assert!(reason.contains("already used"));
		},
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn token_responses_without_id_token_are_rejected() {
	let server = start_mock_server().await;
	let client = build_client(&server);
	let (pending, _) = client.start_login("/");
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(token_body(None));
		})
		.await;
	let state = pending.state.clone();
	let err = client
		.complete_login(pending, &state, "valid-code")
		.await
		.expect_err("Responses without an ID token must fail.");

	assert!(matches!(err, Error::Login { .. }));
}

#[tokio::test]
async fn nonce_mismatch_is_rejected() {
	let server = start_mock_server().await;
	let client = build_client(&server);
	let (pending, _) = client.start_login("/");
	let id_token = id_token_for(&server, "replayed-nonce");
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body(Some(&id_token)));
		})
		.await;
	let state = pending.state.clone();
	let err = client
		.complete_login(pending, &state, "valid-code")
		.await
		.expect_err("Foreign nonces must fail.");

	assert!(matches!(err, Error::Login { .. }));
}

#[tokio::test]
async fn state_mismatch_never_reaches_the_token_endpoint() {
	let server = start_mock_server().await;
	let client = build_client(&server);
	let (pending, _) = client.start_login("/");
	let id_token = id_token_for(&server, &pending.nonce);
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body(Some(&id_token)));
		})
		.await;
	let err = client
		.complete_login(pending, "forged-state", "valid-code")
		.await
		.expect_err("Forged state must fail even though the token endpoint would succeed.");

	assert!(matches!(err, Error::Login { .. }));
}

#[tokio::test]
async fn discovery_reads_the_well_known_document() {
	let server = start_mock_server().await;
	let document = serde_json::json!({
		"issuer": server.base_url(),
		"authorization_endpoint": server.url("/authorize"),
		"token_endpoint": server.url("/token"),
		"jwks_uri": server.url("/jwks"),
	});
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").body(document.to_string());
		})
		.await;
	let issuer = Url::parse(&server.base_url()).expect("Mock issuer should parse successfully.");
	let descriptor = ProviderDescriptor::discover(&test_reqwest_http_client(), &issuer)
		.await
		.expect("Discovery should succeed.");

	mock.assert_async().await;

	assert_eq!(descriptor.endpoints.token.as_str(), server.url("/token"));
	assert!(descriptor.is_issuer(&server.base_url()));
}

#[tokio::test]
async fn discovery_rejects_foreign_issuers_and_missing_documents() {
	let server = start_mock_server().await;
	let document = serde_json::json!({
		"issuer": "https://other.example.com",
		"authorization_endpoint": server.url("/authorize"),
		"token_endpoint": server.url("/token"),
	});
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/tenant-a/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").body(document.to_string());
		})
		.await;
	let http = test_reqwest_http_client();
	let foreign = Url::parse(&server.url("/tenant-a")).expect("Issuer should parse successfully.");
	let missing = Url::parse(&server.url("/tenant-b")).expect("Issuer should parse successfully.");

	assert!(matches!(
		ProviderDescriptor::discover(&http, &foreign).await,
		Err(Error::Config(ConfigError::Discovery { .. }))
	));
	assert!(matches!(
		ProviderDescriptor::discover(&http, &missing).await,
		Err(Error::Config(ConfigError::Discovery { .. }))
	));
}

#[test]
fn descriptor_rejects_plain_http_endpoints() {
	let err = ProviderDescriptor::builder(
		Url::parse("https://idp.example.com").expect("Issuer should parse successfully."),
	)
	.authorization_endpoint(
		Url::parse("https://idp.example.com/authorize").expect("Endpoint should parse."),
	)
	.token_endpoint(Url::parse("http://idp.example.com/token").expect("Endpoint should parse."))
	.build()
	.expect_err("Plain HTTP endpoints must be rejected.");

	assert!(matches!(err, ProviderDescriptorError::InsecureEndpoint { endpoint: "token", .. }));
}
