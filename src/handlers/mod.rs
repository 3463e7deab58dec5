// handlers/mod.rs - HTTP handlers for every service
//
// Resource handlers take the requester from the gateway's trusted X-User-Id header
// (RequestIdentity) and delegate to the service layer. The gateway proxy lives
// in crate::gateway.

pub mod auth;
pub mod health;
pub mod owned;
pub mod tasks;
pub mod users;
