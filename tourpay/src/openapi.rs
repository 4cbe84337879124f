//! OpenAPI documentation, served as JSON at `/api/openapi.json` and rendered at `/api/docs`.

use utoipa::OpenApi;

use crate::api;
use crate::api::handlers::health::HealthResponse;
use crate::api::models::payments::{CancelPaymentRequest, CreatePaymentRequest};
use crate::api::models::webhooks::NotificationAck;
use crate::payment_providers::{Checkout, PaymentState};
use crate::payments::{PaymentStatus, VerifiedNotification};

/// Payment routes live under `/api/v1`; the notification and health routes are at the root and
/// are merged in by [`ApiDoc::full`].
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tourpay API",
        description = "Payment initialization, status polling, refunds and gateway notifications for tour bookings."
    ),
    paths(
        api::handlers::payments::create_payment,
        api::handlers::payments::get_payment,
        api::handlers::payments::cancel_payment,
    ),
    components(schemas(CreatePaymentRequest, CancelPaymentRequest, Checkout, PaymentState, PaymentStatus)),
    tags(
        (name = "payments", description = "Payment lifecycle"),
    )
)]
pub struct ApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(api::handlers::webhooks::payment_notification, api::handlers::health::healthz),
    components(schemas(NotificationAck, VerifiedNotification, HealthResponse)),
    tags(
        (name = "webhooks", description = "Inbound gateway notifications"),
        (name = "health", description = "Service health"),
    )
)]
struct RootApiDoc;

impl ApiDoc {
    /// The complete document with every path at its mounted location.
    pub fn full() -> utoipa::openapi::OpenApi {
        let mut doc = ApiDoc::openapi();
        let versioned = std::mem::take(&mut doc.paths.paths);
        for (path, item) in versioned {
            doc.paths.paths.insert(format!("/api/v1{path}"), item);
        }
        doc.merge(RootApiDoc::openapi());
        doc
    }
}
