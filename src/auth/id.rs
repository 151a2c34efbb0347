//! Strongly typed identifiers for the AWS resources the chain touches.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $max:expr) => {
		def_id! { $name, $doc, $kind, $max, |_| Ok(()) }
	};
	($name:ident, $doc:literal, $kind:literal, $max:expr, $extra:expr) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				Self::validate(view)?;

				Ok(Self(view.to_owned()))
			}

			fn validate(view: &str) -> Result<(), IdentifierError> {
				validate_view($kind, $max, view)?;

				let extra: fn(&str) -> Result<(), IdentifierError> = $extra;

				extra(view)
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::validate(&value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const ARN_MAX_LEN: usize = 2048;
const ACCOUNT_ID_LEN: usize = 12;
const BUCKET_MAX_LEN: usize = 63;
const OBJECT_KEY_MAX_LEN: usize = 1024;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (application, role, account, bucket, object key).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (application, role, account, bucket, object key).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed byte count.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Kind of identifier (application, role, account, bucket, object key).
		kind: &'static str,
		/// Maximum permitted byte count.
		max: usize,
	},
	/// ARN-typed identifiers must start with `arn:`.
	#[error("{kind} identifier must be an ARN.")]
	NotAnArn {
		/// Kind of identifier (application, role).
		kind: &'static str,
	},
	/// Account identifiers are exactly twelve ASCII digits.
	#[error("Account identifier must be 12 digits.")]
	MalformedAccount,
	/// Object keys must not start with a slash.
	#[error("Object key must not start with '/'.")]
	LeadingSlash,
}

def_id! { ApplicationArn, "ARN of the IAM Identity Center application that trusts the identity provider.", "Application", ARN_MAX_LEN, |view| require_arn("Application", view) }
def_id! { RoleArn, "ARN of the role assumed with the user's identity context.", "Role", ARN_MAX_LEN, |view| require_arn("Role", view) }
def_id! { AccountId, "AWS account that owns the Access Grants instance.", "Account", ACCOUNT_ID_LEN, |view| {
	if view.len() == ACCOUNT_ID_LEN && view.bytes().all(|b| b.is_ascii_digit()) {
		Ok(())
	} else {
		Err(IdentifierError::MalformedAccount)
	}
} }
def_id! { BucketName, "Name of the S3 bucket holding the target object.", "Bucket", BUCKET_MAX_LEN }
def_id! { ObjectKey, "Key of the single S3 object read by the chain.", "ObjectKey", OBJECT_KEY_MAX_LEN, |view| {
	if view.starts_with('/') { Err(IdentifierError::LeadingSlash) } else { Ok(()) }
} }

fn validate_view(kind: &'static str, max: usize, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > max {
		return Err(IdentifierError::TooLong { kind, max });
	}

	Ok(())
}

fn require_arn(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.starts_with("arn:") { Ok(()) } else { Err(IdentifierError::NotAnArn { kind }) }
}
