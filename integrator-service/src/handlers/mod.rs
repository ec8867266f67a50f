//! HTTP handlers for integrator-service.
//!
//! Every handler under `/users/:userID` takes a [`CallerIdentity`] first, so
//! the acting user is confirmed before any service call.
//!
//! [`CallerIdentity`]: crate::middleware::CallerIdentity

pub mod auth;
pub mod groups;
pub mod health;
pub mod integrators;
pub mod reports;
pub mod users;
