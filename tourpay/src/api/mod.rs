//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Payments** (`/api/v1/payments/*`): create, poll and cancel payments
//! - **Webhooks** (`/webhooks/payments`): gateway status notifications
//! - **Health** (`/healthz`): liveness
//!
//! API documentation is served at `/api/docs` when the server is running.

pub mod handlers;
pub mod models;
