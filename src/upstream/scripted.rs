//! In-memory upstream that answers every seam from a script and records each call.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	_preludet::mint_unsigned_jwt,
	auth::{FederatedToken, SessionCredentials},
	chain::Stage,
	upstream::{
		AccessGrants, AssumeRoleRequest, DataAccessRequest, ObjectLocation, ObjectStore,
		RoleAssumer, TokenExchange, TokenExchangeRequest, UpstreamErrorContext, UpstreamFuture,
	},
};

/// Access key id of the credentials returned by the role-assumption seam.
pub const SCRIPTED_ROLE_ACCESS_KEY: &str = "ASIASCRIPTEDROLE";
/// Access key id of the credentials returned by the access-grants seam.
pub const SCRIPTED_GRANT_ACCESS_KEY: &str = "ASIASCRIPTEDGRANT";
/// Identity-context claim embedded in scripted federated tokens by default.
pub const SCRIPTED_IDENTITY_CONTEXT: &str = "scripted-identity-context";

/// One recorded upstream call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptedCall {
	/// Token exchange.
	Exchange {
		/// Application ARN.
		application_arn: String,
		/// Raw assertion.
		assertion: String,
	},
	/// Role assumption.
	AssumeRole {
		/// Role ARN.
		role_arn: String,
		/// Session name.
		session_name: String,
		/// `(provider, assertion)` pairs.
		provided_contexts: Vec<(String, String)>,
	},
	/// Access grant resolution.
	GetDataAccess {
		/// Access key id of the credentials presented.
		access_key_id: String,
		/// Account id.
		account_id: String,
		/// Grant target.
		target: String,
		/// Permission.
		permission: String,
	},
	/// Object fetch.
	GetObject {
		/// Access key id of the credentials presented.
		access_key_id: String,
		/// Bucket.
		bucket: String,
		/// Key.
		key: String,
	},
}
impl ScriptedCall {
	/// Stage the call belongs to.
	pub fn stage(&self) -> Stage {
		match self {
			Self::Exchange { .. } => Stage::Exchanging,
			Self::AssumeRole { .. } => Stage::AssumingRole,
			Self::GetDataAccess { .. } => Stage::ResolvingAccess,
			Self::GetObject { .. } => Stage::FetchingObject,
		}
	}
}

/// Scripted implementation of all four upstream seams.
#[derive(Debug)]
pub struct ScriptedUpstream {
	federated_token: Option<String>,
	identity_context: String,
	object_body: Vec<u8>,
	role_expiry: Duration,
	grant_expiry: Duration,
	failures: HashMap<Stage, UpstreamErrorContext>,
	delays: HashMap<Stage, StdDuration>,
	calls: Mutex<Vec<ScriptedCall>>,
}
impl ScriptedUpstream {
	/// Creates an upstream that succeeds at every stage and serves a small CSV object.
	pub fn new() -> Self {
		Self {
			federated_token: None,
			identity_context: SCRIPTED_IDENTITY_CONTEXT.into(),
			object_body: b"id,name\n1,Alice\n2,Bob\n".to_vec(),
			role_expiry: Duration::hours(1),
			grant_expiry: Duration::hours(1),
			failures: HashMap::new(),
			delays: HashMap::new(),
			calls: Mutex::new(Vec::new()),
		}
	}

	/// Serves `body` from the object seam.
	pub fn with_object_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.object_body = body.into();

		self
	}

	/// Embeds `context` as the identity-context claim of issued federated tokens.
	pub fn with_identity_context(mut self, context: impl Into<String>) -> Self {
		self.identity_context = context.into();

		self
	}

	/// Returns `raw` verbatim as the federated ID token.
	pub fn with_federated_token(mut self, raw: impl Into<String>) -> Self {
		self.federated_token = Some(raw.into());

		self
	}

	/// Issues role credentials expiring `ttl` after the call.
	pub fn with_role_credentials_ttl(mut self, ttl: Duration) -> Self {
		self.role_expiry = ttl;

		self
	}

	/// Issues grant credentials expiring `ttl` after the call.
	pub fn with_grant_credentials_ttl(mut self, ttl: Duration) -> Self {
		self.grant_expiry = ttl;

		self
	}

	/// Makes the seam for `stage` fail with `failure`.
	pub fn failing_at(mut self, failure: UpstreamErrorContext) -> Self {
		self.failures.insert(failure.stage, failure);

		self
	}

	/// Delays the seam for `stage` by `delay` before it answers.
	pub fn delayed_at(mut self, stage: Stage, delay: StdDuration) -> Self {
		self.delays.insert(stage, delay);

		self
	}

	/// Returns every call recorded so far.
	pub fn calls(&self) -> Vec<ScriptedCall> {
		self.calls.lock().clone()
	}

	/// Returns the stages that were called, in order.
	pub fn called_stages(&self) -> Vec<Stage> {
		self.calls.lock().iter().map(ScriptedCall::stage).collect()
	}

	async fn answer(&self, call: ScriptedCall) -> Result<()> {
		let stage = call.stage();
		let object = match &call {
			ScriptedCall::GetObject { bucket, key, .. } => Some((bucket.clone(), key.clone())),
			_ => None,
		};

		self.calls.lock().push(call);

		if let Some(delay) = self.delays.get(&stage) {
			tokio::time::sleep(*delay).await;
		}
		if let Some(failure) = self.failures.get(&stage) {
			let mut failure = failure.clone();

			if failure.object.is_none() {
				failure.object = object;
			}

			return Err(failure.into_error());
		}

		Ok(())
	}
}
impl Default for ScriptedUpstream {
	fn default() -> Self {
		Self::new()
	}
}
impl TokenExchange for ScriptedUpstream {
	fn exchange_identity_token<'a>(
		&'a self,
		request: TokenExchangeRequest<'a>,
	) -> UpstreamFuture<'a, FederatedToken> {
		Box::pin(async move {
			let call = ScriptedCall::Exchange {
				application_arn: request.application_arn.to_string(),
				assertion: request.assertion.expose().to_owned(),
			};

			self.answer(call).await?;

			let raw = self.federated_token.clone().unwrap_or_else(|| {
				mint_unsigned_jwt(&serde_json::json!({
					"sub": "scripted-user",
					"sts:identity_context": self.identity_context,
				}))
			});

			Ok(FederatedToken::new(raw, OffsetDateTime::now_utc(), Duration::hours(1))
				.with_access_token("scripted-access-token"))
		})
	}
}
impl RoleAssumer for ScriptedUpstream {
	fn assume_role_with_context<'a>(
		&'a self,
		request: AssumeRoleRequest<'a>,
	) -> UpstreamFuture<'a, SessionCredentials> {
		Box::pin(async move {
			let call = ScriptedCall::AssumeRole {
				role_arn: request.role_arn.to_string(),
				session_name: request.session_name.to_owned(),
				provided_contexts: request
					.provided_contexts
					.iter()
					.map(|ctx| (ctx.provider_arn.to_owned(), ctx.assertion.expose().to_owned()))
					.collect(),
			};

			self.answer(call).await?;

			Ok(SessionCredentials::new(
				SCRIPTED_ROLE_ACCESS_KEY,
				"scripted-role-secret",
				"scripted-role-token",
				OffsetDateTime::now_utc() + self.role_expiry,
			))
		})
	}
}
impl AccessGrants for ScriptedUpstream {
	fn get_data_access<'a>(
		&'a self,
		credentials: SessionCredentials,
		request: DataAccessRequest<'a>,
	) -> UpstreamFuture<'a, SessionCredentials> {
		Box::pin(async move {
			let call = ScriptedCall::GetDataAccess {
				access_key_id: credentials.access_key_id().to_owned(),
				account_id: request.account_id.to_string(),
				target: request.target,
				permission: request.permission.to_string(),
			};

			self.answer(call).await?;

			Ok(SessionCredentials::new(
				SCRIPTED_GRANT_ACCESS_KEY,
				"scripted-grant-secret",
				"scripted-grant-token",
				OffsetDateTime::now_utc() + self.grant_expiry,
			))
		})
	}
}
impl ObjectStore for ScriptedUpstream {
	fn get_object<'a>(
		&'a self,
		credentials: SessionCredentials,
		location: ObjectLocation<'a>,
	) -> UpstreamFuture<'a, Vec<u8>> {
		Box::pin(async move {
			let call = ScriptedCall::GetObject {
				access_key_id: credentials.access_key_id().to_owned(),
				bucket: location.bucket.to_string(),
				key: location.key.to_string(),
			};

			self.answer(call).await?;

			Ok(self.object_body.clone())
		})
	}
}
