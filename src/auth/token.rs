//! Token models handed between the login flow and the exchange chain.

pub mod federated;
pub mod identity;
pub mod secret;
