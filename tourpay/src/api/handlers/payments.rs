//! HTTP handlers for payment processing endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use crate::{
    AppState,
    api::models::payments::{CancelPaymentRequest, CreatePaymentRequest},
    errors::{Error, Result},
    payment_providers::{Checkout, PaymentProvider, PaymentState},
};

/// The configured provider, or 501 when payments are disabled.
pub(crate) fn provider(state: &AppState) -> Result<&Arc<dyn PaymentProvider>> {
    state.provider.as_ref().ok_or(Error::PaymentsDisabled)
}

/// Start a payment for a booking.
#[utoipa::path(
    post,
    path = "/payments",
    tag = "payments",
    summary = "Create payment",
    description = "Validates the booking, signs an Init request and registers it with the gateway. \
                   Redirect the payer to `payment_url`.",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment registered", body = Checkout),
        (status = 400, description = "Invalid booking data"),
        (status = 402, description = "Gateway declined the request"),
        (status = 501, description = "No payment provider configured"),
        (status = 502, description = "Gateway unreachable"),
        (status = 504, description = "Gateway timed out"),
    )
)]
#[instrument(skip_all, fields(order_id = %request.order_id))]
pub async fn create_payment(State(state): State<AppState>, Json(request): Json<CreatePaymentRequest>) -> Result<(StatusCode, Json<Checkout>)> {
    let provider = provider(&state)?;
    let cancel = state.shutdown.child_token();

    let checkout = provider.create_payment(request.into(), &cancel).await?;
    Ok((StatusCode::CREATED, Json(checkout)))
}

/// Poll a payment's state at the gateway.
#[utoipa::path(
    get,
    path = "/payments/{payment_id}",
    tag = "payments",
    summary = "Get payment state",
    params(
        ("payment_id" = String, Path, description = "Gateway payment ID"),
    ),
    responses(
        (status = 200, description = "Current payment state", body = PaymentState),
        (status = 400, description = "Malformed payment ID"),
        (status = 402, description = "Gateway declined the request"),
        (status = 501, description = "No payment provider configured"),
        (status = 502, description = "Gateway unreachable"),
    )
)]
#[instrument(skip(state))]
pub async fn get_payment(State(state): State<AppState>, Path(payment_id): Path<String>) -> Result<Json<PaymentState>> {
    let provider = provider(&state)?;
    let cancel = state.shutdown.child_token();

    Ok(Json(provider.get_payment_state(&payment_id, &cancel).await?))
}

/// Cancel a payment, or refund part of it.
#[utoipa::path(
    post,
    path = "/payments/{payment_id}/cancel",
    tag = "payments",
    summary = "Cancel or refund payment",
    description = "Reverses an authorization or refunds a confirmed payment. Pass `amount` for a partial refund.",
    params(
        ("payment_id" = String, Path, description = "Gateway payment ID"),
    ),
    request_body(content = CancelPaymentRequest, description = "Optional; omit the body to cancel in full"),
    responses(
        (status = 200, description = "Payment state after cancellation", body = PaymentState),
        (status = 400, description = "Invalid amount or payment ID"),
        (status = 402, description = "Gateway declined the request"),
        (status = 501, description = "No payment provider configured"),
        (status = 502, description = "Gateway unreachable"),
    )
)]
#[instrument(skip(state, request))]
pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    request: Option<Json<CancelPaymentRequest>>,
) -> Result<Json<PaymentState>> {
    let provider = provider(&state)?;
    let cancel = state.shutdown.child_token();
    let amount = request.and_then(|Json(body)| body.amount);

    Ok(Json(provider.cancel_payment(&payment_id, amount, &cancel).await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::payments::PaymentStatus;
    use crate::test_utils::{RecordingEventSink, create_test_app, create_test_app_with_sink, create_test_config, dummy_config, tinkoff_config};
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test_log::test(tokio::test)]
    async fn test_create_payment_with_dummy_provider() {
        let server = create_test_app(dummy_config());

        let response = server
            .post("/api/v1/payments")
            .json(&json!({
                "amount": "1500.00",
                "order_id": "tour-42",
                "description": "City walk",
                "email": "guest@example.com"
            }))
            .await;

        response.assert_status(axum::http::StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["order_id"], "tour-42");
        assert_eq!(body["status"], "confirmed");
        let payment_id = body["payment_id"].as_str().unwrap();
        assert!(body["payment_url"].as_str().unwrap().contains(payment_id));

        let state = server.get(&format!("/api/v1/payments/{payment_id}")).await;
        state.assert_status_ok();
        assert_eq!(state.json::<Value>()["order_id"], "tour-42");
    }

    #[test_log::test(tokio::test)]
    async fn test_dummy_payment_confirmation_reaches_sink() {
        let sink = Arc::new(RecordingEventSink::default());
        let server = create_test_app_with_sink(dummy_config(), sink.clone());

        let response = server
            .post("/api/v1/payments")
            .json(&json!({"amount": 1500, "order_id": "tour-42", "description": "City walk"}))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let checkout: Value = response.json();

        let recorded = sink.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].status, PaymentStatus::Confirmed);
        assert_eq!(recorded[0].order_id, "tour-42");
        assert_eq!(recorded[0].payment_id, checkout["payment_id"].as_str().unwrap());
        assert_eq!(recorded[0].amount, Some(150000));
    }

    #[test_log::test(tokio::test)]
    async fn test_failing_sink_fails_dummy_payment() {
        let server = create_test_app_with_sink(dummy_config(), Arc::new(RecordingEventSink::failing()));

        let response = server
            .post("/api/v1/payments")
            .json(&json!({"amount": 1500, "order_id": "tour-42", "description": "City walk"}))
            .await;
        response.assert_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.text(), "Internal server error");
    }

    #[test_log::test(tokio::test)]
    async fn test_invalid_booking_is_bad_request() {
        let server = create_test_app(dummy_config());

        let response = server
            .post("/api/v1/payments")
            .json(&json!({"amount": 0, "order_id": "tour-42", "description": "City walk"}))
            .await;
        response.assert_status_bad_request();

        let response = server
            .post("/api/v1/payments")
            .json(&json!({"amount": 1500, "description": "City walk"}))
            .await;
        response.assert_status_bad_request();
        assert!(response.text().contains("order_id"));
    }

    #[test_log::test(tokio::test)]
    async fn test_caller_cannot_choose_notification_url() {
        let sink = Arc::new(RecordingEventSink::default());
        let server = create_test_app_with_sink(dummy_config(), sink.clone());

        let response = server
            .post("/api/v1/payments")
            .json(&json!({
                "amount": 1500,
                "order_id": "tour-42",
                "description": "City walk",
                "notification_url": "https://attacker.example.com/hook"
            }))
            .await;

        response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.text().contains("notification_url"));
        assert!(sink.recorded().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_payments_disabled_without_provider() {
        let server = create_test_app(create_test_config());

        let response = server
            .post("/api/v1/payments")
            .json(&json!({"amount": 1500, "order_id": "tour-42", "description": "City walk"}))
            .await;
        response.assert_status(axum::http::StatusCode::NOT_IMPLEMENTED);

        let response = server.get("/api/v1/payments/13660").await;
        response.assert_status(axum::http::StatusCode::NOT_IMPLEMENTED);
    }

    #[test_log::test(tokio::test)]
    async fn test_cancel_with_and_without_body() {
        let server = create_test_app(dummy_config());
        let created: Value = server
            .post("/api/v1/payments")
            .json(&json!({"amount": 1500, "order_id": "tour-42", "description": "City walk"}))
            .await
            .json();
        let payment_id = created["payment_id"].as_str().unwrap();

        let full = server.post(&format!("/api/v1/payments/{payment_id}/cancel")).await;
        full.assert_status_ok();
        assert_eq!(full.json::<Value>()["gateway_status"], "REFUNDED");

        let partial = server
            .post(&format!("/api/v1/payments/{payment_id}/cancel"))
            .json(&json!({"amount": "500.00"}))
            .await;
        partial.assert_status_ok();
        assert_eq!(partial.json::<Value>()["gateway_status"], "PARTIAL_REFUNDED");
    }

    #[test_log::test(tokio::test)]
    async fn test_gateway_rejection_is_payment_required() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/Init"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Success": false,
                "ErrorCode": "8",
                "Message": "Неверный статус транзакции"
            })))
            .mount(&gateway)
            .await;

        let server = create_test_app(tinkoff_config(&format!("{}/v2/", gateway.uri())));
        let response = server
            .post("/api/v1/payments")
            .json(&json!({"amount": 1500, "order_id": "tour-42", "description": "City walk"}))
            .await;

        response.assert_status(axum::http::StatusCode::PAYMENT_REQUIRED);
        assert_eq!(response.json::<Value>()["code"], "8");
    }

    #[test_log::test(tokio::test)]
    async fn test_unreachable_gateway_is_bad_gateway() {
        // Nothing listens on the discard port
        let server = create_test_app(tinkoff_config("http://127.0.0.1:9/v2/"));
        let response = server.get("/api/v1/payments/13660").await;
        response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
    }
}
