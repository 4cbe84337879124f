//! HTTP request handlers.
//!
//! - [`health`]: liveness probe
//! - [`payments`]: payment creation, status polling and cancellation
//! - [`webhooks`]: gateway notification intake
//!
//! Handlers return [`crate::errors::Error`], which maps provider failures onto status codes.

pub mod health;
pub mod payments;
pub mod webhooks;
