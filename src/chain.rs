//! The four-stage credential exchange chain.
//!
//! `Exchanging → AssumingRole → ResolvingAccess → FetchingObject → Done`. Each stage consumes the
//! previous stage's output, and the first failure ends the run with that stage's error.

// self
use crate::{
	_prelude::*,
	auth::{
		AccountId, ApplicationArn, BucketName, IdentityContext, IdentityToken, ObjectKey, RoleArn,
		SessionCredentials,
	},
	error::ConfigError,
	obs::{self, StageOutcome, StageSpan},
	payload::ObjectPayload,
	upstream::{
		AccessGrants, AssumeRoleRequest, DataAccessRequest, ObjectLocation, ObjectStore,
		Permission, ProvidedContext, RoleAssumer, TokenExchange, TokenExchangeRequest,
	},
};

/// Role session name used when none is configured.
pub const DEFAULT_ROLE_SESSION_NAME: &str = "my-role-session-with-identity-context";
/// Grant prefix used when none is configured.
pub const DEFAULT_GRANT_PREFIX: &str = "users";
/// End-to-end deadline used when none is configured.
pub const DEFAULT_DEADLINE: Duration = Duration::seconds(20);

/// Chain stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	/// Identity token → federated token.
	Exchanging,
	/// Identity context → outer role credentials.
	AssumingRole,
	/// Outer credentials → grant-scoped credentials.
	ResolvingAccess,
	/// Grant credentials → object payload.
	FetchingObject,
	/// The chain finished.
	Done,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::Exchanging => "exchanging",
			Stage::AssumingRole => "assuming_role",
			Stage::ResolvingAccess => "resolving_access",
			Stage::FetchingObject => "fetching_object",
			Stage::Done => "done",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Externally supplied identifiers and limits for the chain.
#[derive(Clone, Debug)]
pub struct ChainSettings {
	/// Application that trusts the identity provider.
	pub application_arn: ApplicationArn,
	/// Role assumed with the identity context.
	pub role_arn: RoleArn,
	/// Role session name.
	pub role_session_name: String,
	/// Account owning the access-grants instance.
	pub account_id: AccountId,
	/// Target bucket.
	pub bucket: BucketName,
	/// Prefix the grant covers inside the bucket.
	pub grant_prefix: String,
	/// Object read by the final stage.
	pub object_key: ObjectKey,
	/// End-to-end deadline for one run.
	pub deadline: Duration,
}
impl ChainSettings {
	/// Creates settings with the default prefix, session name, and deadline.
	pub fn new(
		application_arn: ApplicationArn,
		role_arn: RoleArn,
		account_id: AccountId,
		bucket: BucketName,
		object_key: ObjectKey,
	) -> Self {
		Self {
			application_arn,
			role_arn,
			role_session_name: DEFAULT_ROLE_SESSION_NAME.into(),
			account_id,
			bucket,
			grant_prefix: DEFAULT_GRANT_PREFIX.into(),
			object_key,
			deadline: DEFAULT_DEADLINE,
		}
	}

	/// Overrides the grant prefix.
	pub fn with_grant_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.grant_prefix = prefix.into();

		self
	}

	/// Overrides the role session name.
	pub fn with_role_session_name(mut self, name: impl Into<String>) -> Self {
		self.role_session_name = name.into();

		self
	}

	/// Overrides the end-to-end deadline.
	pub fn with_deadline(mut self, deadline: Duration) -> Result<Self, ConfigError> {
		if !deadline.is_positive() {
			return Err(ConfigError::NonPositiveDeadline);
		}

		self.deadline = deadline;

		Ok(self)
	}

	/// Grant target, `s3://{bucket}/{prefix}*`.
	pub fn grant_target(&self) -> String {
		format!("s3://{}/{}*", self.bucket, self.grant_prefix)
	}
}

/// The exchange chain with its four upstream seams.
#[derive(Clone)]
pub struct ExchangeChain {
	settings: ChainSettings,
	exchanger: Arc<dyn TokenExchange>,
	assumer: Arc<dyn RoleAssumer>,
	grants: Arc<dyn AccessGrants>,
	objects: Arc<dyn ObjectStore>,
}
impl ExchangeChain {
	/// Wires the chain to its upstream seams.
	pub fn new(
		settings: ChainSettings,
		exchanger: Arc<dyn TokenExchange>,
		assumer: Arc<dyn RoleAssumer>,
		grants: Arc<dyn AccessGrants>,
		objects: Arc<dyn ObjectStore>,
	) -> Self {
		Self { settings, exchanger, assumer, grants, objects }
	}

	/// Settings the chain runs with.
	pub fn settings(&self) -> &ChainSettings {
		&self.settings
	}

	/// Runs every stage for `identity` under the configured deadline.
	pub async fn run(&self, identity: &IdentityToken) -> Result<ObjectPayload> {
		let progress = Mutex::new(Stage::Exchanging);
		let deadline = self.settings.deadline;

		match tokio::time::timeout(deadline.unsigned_abs(), self.run_stages(identity, &progress))
			.await
		{
			Ok(result) => result,
			Err(_) => {
				let stage = *progress.lock();

				obs::record_stage_outcome(stage, StageOutcome::Failure);
				tracing::warn!(stage = %stage, "Exchange chain deadline elapsed.");

				Err(Error::DeadlineExceeded { stage, after: deadline })
			},
		}
	}

	async fn run_stages(
		&self,
		identity: &IdentityToken,
		progress: &Mutex<Stage>,
	) -> Result<ObjectPayload> {
		let context = self.stage(Stage::Exchanging, progress, self.exchange(identity)).await?;
		let outer = self.stage(Stage::AssumingRole, progress, self.assume_role(context)).await?;
		let inner = self.stage(Stage::ResolvingAccess, progress, self.resolve_access(outer)).await?;
		let payload = self.stage(Stage::FetchingObject, progress, self.fetch(inner)).await?;

		*progress.lock() = Stage::Done;

		Ok(payload)
	}

	async fn stage<T, Fut>(&self, stage: Stage, progress: &Mutex<Stage>, fut: Fut) -> Result<T>
	where
		Fut: Future<Output = Result<T>>,
	{
		*progress.lock() = stage;

		obs::record_stage_outcome(stage, StageOutcome::Attempt);

		let result = StageSpan::new(stage).instrument(fut).await;

		match &result {
			Ok(_) => {
				obs::record_stage_outcome(stage, StageOutcome::Success);
				tracing::debug!(stage = %stage, "Exchange chain stage completed.");
			},
			Err(e) => {
				obs::record_stage_outcome(stage, StageOutcome::Failure);
				tracing::warn!(stage = %stage, error = %e, "Exchange chain stage failed.");
			},
		}

		result
	}

	async fn exchange(&self, identity: &IdentityToken) -> Result<IdentityContext> {
		if identity.is_empty() {
			return Err(Error::AuthenticationExchange { reason: "identity token is empty".into() });
		}
		if identity.is_expired_at(OffsetDateTime::now_utc()) {
			return Err(Error::AuthenticationExchange {
				reason: "identity token has expired".into(),
			});
		}

		let request = TokenExchangeRequest {
			application_arn: &self.settings.application_arn,
			assertion: identity,
		};
		let federated = self.exchanger.exchange_identity_token(request).await?;

		federated.identity_context()
	}

	async fn assume_role(&self, context: IdentityContext) -> Result<SessionCredentials> {
		let request = AssumeRoleRequest {
			role_arn: &self.settings.role_arn,
			session_name: &self.settings.role_session_name,
			provided_contexts: vec![ProvidedContext::identity_center(context)],
		};
		let credentials = self.assumer.assume_role_with_context(request).await?;

		if !credentials.is_complete() {
			return Err(Error::Authorization {
				reason: "role credentials are incomplete".into(),
			});
		}
		if credentials.is_expired_at(OffsetDateTime::now_utc()) {
			return Err(Error::Authorization { reason: "role credentials have expired".into() });
		}

		Ok(credentials)
	}

	async fn resolve_access(&self, outer: SessionCredentials) -> Result<SessionCredentials> {
		let request = DataAccessRequest {
			account_id: &self.settings.account_id,
			target: self.settings.grant_target(),
			permission: Permission::Read,
		};
		let credentials = self.grants.get_data_access(outer, request).await?;

		if !credentials.is_complete() {
			return Err(Error::AccessDenied { reason: "grant credentials are incomplete".into() });
		}
		if credentials.is_expired_at(OffsetDateTime::now_utc()) {
			return Err(Error::AccessDenied { reason: "grant credentials have expired".into() });
		}

		Ok(credentials)
	}

	async fn fetch(&self, inner: SessionCredentials) -> Result<ObjectPayload> {
		let location =
			ObjectLocation { bucket: &self.settings.bucket, key: &self.settings.object_key };
		let body = self.objects.get_object(inner, location).await?;

		Ok(ObjectPayload::from_csv_bytes(body)?)
	}
}
impl Debug for ExchangeChain {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExchangeChain").field("settings", &self.settings).finish_non_exhaustive()
	}
}
