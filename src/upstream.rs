//! Service seams the exchange chain calls, one trait per external service.
//!
//! Every trait returns a boxed `Send` future so the chain can hold the four clients as
//! `Arc<dyn Trait>` and stay agnostic of the SDK underneath. Implementations classify their own
//! failures through [`UpstreamErrorContext`] before returning.

#[cfg(feature = "aws")] pub mod aws;
pub mod classify;
#[cfg(any(test, feature = "test"))] pub mod scripted;

pub use classify::*;

// self
use crate::{
	_prelude::*,
	auth::{
		AccountId, ApplicationArn, BucketName, FederatedToken, IdentityContext, IdentityToken,
		ObjectKey, RoleArn, SessionCredentials,
	},
};

/// Grant type sent to the token-exchange service.
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Context provider that vouches for identity-context assertions.
pub const IDENTITY_CENTER_CONTEXT_PROVIDER: &str =
	"arn:aws:iam::aws:contextProvider/IdentityCenter";

/// Boxed future returned by upstream seams.
pub type UpstreamFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Exchanges an identity token for a federated token via a JWT-bearer grant.
pub trait TokenExchange
where
	Self: 'static + Send + Sync,
{
	/// Submits the identity token on behalf of the configured application.
	fn exchange_identity_token<'a>(
		&'a self,
		request: TokenExchangeRequest<'a>,
	) -> UpstreamFuture<'a, FederatedToken>;
}

/// Assumes a role with provided identity-context assertions.
pub trait RoleAssumer
where
	Self: 'static + Send + Sync,
{
	/// Returns the outer session credentials for the assumed role.
	fn assume_role_with_context<'a>(
		&'a self,
		request: AssumeRoleRequest<'a>,
	) -> UpstreamFuture<'a, SessionCredentials>;
}

/// Resolves an access grant into credentials scoped to one target.
pub trait AccessGrants
where
	Self: 'static + Send + Sync,
{
	/// Consumes the caller's credentials and returns credentials scoped to the grant.
	fn get_data_access<'a>(
		&'a self,
		credentials: SessionCredentials,
		request: DataAccessRequest<'a>,
	) -> UpstreamFuture<'a, SessionCredentials>;
}

/// Reads a single object.
pub trait ObjectStore
where
	Self: 'static + Send + Sync,
{
	/// Consumes the grant credentials and returns the object body.
	fn get_object<'a>(
		&'a self,
		credentials: SessionCredentials,
		location: ObjectLocation<'a>,
	) -> UpstreamFuture<'a, Vec<u8>>;
}

/// Token-exchange request.
#[derive(Clone, Copy, Debug)]
pub struct TokenExchangeRequest<'a> {
	/// Application that trusts the identity provider.
	pub application_arn: &'a ApplicationArn,
	/// Identity token used as the JWT-bearer assertion.
	pub assertion: &'a IdentityToken,
}

/// Context assertion attached to a role session.
#[derive(Clone, Debug)]
pub struct ProvidedContext {
	/// Context provider ARN.
	pub provider_arn: &'static str,
	/// Assertion vouched for by the provider.
	pub assertion: IdentityContext,
}
impl ProvidedContext {
	/// Wraps an identity-context assertion issued by IAM Identity Center.
	pub fn identity_center(assertion: IdentityContext) -> Self {
		Self { provider_arn: IDENTITY_CENTER_CONTEXT_PROVIDER, assertion }
	}
}

/// Role-assumption request.
#[derive(Clone, Debug)]
pub struct AssumeRoleRequest<'a> {
	/// Role to assume.
	pub role_arn: &'a RoleArn,
	/// Role session name.
	pub session_name: &'a str,
	/// Context assertions attached to the session.
	pub provided_contexts: Vec<ProvidedContext>,
}

/// Permission requested from the access-grants service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
	/// Read-only access.
	Read,
}
impl Permission {
	/// Wire representation.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Read => "READ",
		}
	}
}
impl Display for Permission {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Access-grant resolution request.
#[derive(Clone, Debug)]
pub struct DataAccessRequest<'a> {
	/// Account owning the access-grants instance.
	pub account_id: &'a AccountId,
	/// Grant target, `s3://bucket/prefix*`.
	pub target: String,
	/// Requested permission.
	pub permission: Permission,
}

/// Bucket and key of the object to read.
#[derive(Clone, Copy, Debug)]
pub struct ObjectLocation<'a> {
	/// Bucket name.
	pub bucket: &'a BucketName,
	/// Object key.
	pub key: &'a ObjectKey,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn provided_context_uses_the_identity_center_provider() {
		let context = ProvidedContext::identity_center(IdentityContext::new("ctx"));

		assert_eq!(context.provider_arn, "arn:aws:iam::aws:contextProvider/IdentityCenter");
		assert_eq!(context.assertion.expose(), "ctx");
		assert_eq!(Permission::Read.to_string(), "READ");
	}
}
