//! OpenID Connect login: provider metadata, authorization-code + PKCE start, and the callback
//! code exchange that yields the user's [`IdentityToken`](crate::auth::IdentityToken).

pub mod client;
pub mod descriptor;
pub mod discovery;
pub mod login;
pub mod scope;

pub use client::*;
pub use descriptor::*;
pub use login::*;
pub use scope::*;
