//! Request and response models for the HTTP API.

pub mod payments;
pub mod webhooks;
