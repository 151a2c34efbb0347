//! Auth-domain identifiers, redacted secrets, tokens, and temporary credentials.

pub mod claims;
pub mod credentials;
pub mod id;
pub mod token;

pub use claims::*;
pub use credentials::*;
pub use id::*;
pub use token::{federated::*, identity::*, secret::*};
