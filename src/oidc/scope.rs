//! Requested login scopes.

// std
use std::collections::BTreeSet;
// self
use crate::_prelude::*;

/// Scope every OpenID Connect request must carry.
pub const OPENID_SCOPE: &str = "openid";

/// Errors raised while validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ScopeValidationError {
	/// No scopes were supplied.
	#[error("At least one scope is required.")]
	Empty,
	/// A scope contains characters outside RFC 6749 `scope-token`.
	#[error("Scope `{scope}` contains invalid characters.")]
	InvalidCharacter {
		/// Offending scope.
		scope: String,
	},
	/// The `openid` scope is missing.
	#[error("The `openid` scope is required.")]
	MissingOpenId,
}

/// Normalized, de-duplicated set of login scopes that always includes `openid`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopeSet(BTreeSet<String>);
impl ScopeSet {
	/// Validates and normalizes the provided scopes.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut set = BTreeSet::new();

		for scope in scopes {
			let scope = scope.as_ref();

			if !scope.bytes().all(is_scope_byte) || scope.is_empty() {
				return Err(ScopeValidationError::InvalidCharacter { scope: scope.to_owned() });
			}

			set.insert(scope.to_owned());
		}

		if set.is_empty() {
			return Err(ScopeValidationError::Empty);
		}
		if !set.contains(OPENID_SCOPE) {
			return Err(ScopeValidationError::MissingOpenId);
		}

		Ok(Self(set))
	}

	/// Space-delimited form used on the wire.
	pub fn normalized(&self) -> String {
		self.0.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
	}

	/// Iterates over the scopes in normalized order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Returns `true` when `scope` is part of the set.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.contains(scope)
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s.split_whitespace())
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}

fn is_scope_byte(b: u8) -> bool {
	matches!(b, 0x21 | 0x23..=0x5B | 0x5D..=0x7E)
}
