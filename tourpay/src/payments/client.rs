//! HTTP adapter for the Tinkoff Acquiring API v2.
//!
//! The client is the only part of the payment core that performs I/O. Each call:
//!
//! - POSTs JSON to `{api_base}/{Method}` with a bounded timeout,
//! - aborts early when the caller's [`CancellationToken`] fires,
//! - turns `Success: false` into [`GatewayError::Rejected`].
//!
//! Nothing is retried here. Transport failures are reported as retryable
//! ([`GatewayError::is_retryable`]) and the caller decides, keeping the `OrderId` stable so the
//! gateway can deduplicate.

use std::sync::Arc;
use std::time::Duration;

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::GatewayCredentials;
use super::builder::PaymentRequest;
use super::signature::{self, FieldValue, SignOperation, SignatureError};

/// Production endpoint of the v2 API.
pub const DEFAULT_API_BASE: &str = "https://securepay.tinkoff.ru/v2/";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("failed to reach the gateway: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("gateway rejected the request (code {code}): {message}")]
    Rejected { code: String, message: String },

    #[error("unexpected gateway response: {0}")]
    Decode(String),

    #[error("gateway request was cancelled")]
    Cancelled,

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

impl GatewayError {
    /// Whether resubmitting the same payload may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Transport(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err)
        }
    }
}

/// Common shape of `Init`, `GetState` and `Cancel` responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatewayResponse {
    pub success: bool,
    #[serde(default, deserialize_with = "string_or_number")]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub terminal_key: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default, rename = "PaymentURL")]
    pub payment_url: Option<String>,
}

impl GatewayResponse {
    fn into_result(self) -> Result<Self, GatewayError> {
        if self.success {
            return Ok(self);
        }
        let message = match (&self.message, &self.details) {
            (Some(m), Some(d)) if !d.is_empty() => format!("{m}: {d}"),
            (Some(m), _) => m.clone(),
            (None, Some(d)) => d.clone(),
            (None, None) => "no message".to_string(),
        };
        Err(GatewayError::Rejected {
            code: self.error_code.unwrap_or_else(|| "unknown".to_string()),
            message,
        })
    }
}

/// `PaymentId` and `ErrorCode` arrive as strings from some endpoints and numbers from others.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PaymentOperationRequest<'a> {
    terminal_key: &'a str,
    payment_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<i64>,
    token: String,
}

/// Client bound to one terminal.
#[derive(Debug, Clone)]
pub struct TinkoffClient {
    http: reqwest::Client,
    api_base: Url,
    credentials: Arc<GatewayCredentials>,
}

impl TinkoffClient {
    pub fn new(api_base: Url, timeout: Duration, credentials: Arc<GatewayCredentials>) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(timeout).build().map_err(GatewayError::Transport)?;
        Ok(Self {
            http,
            api_base: with_trailing_slash(api_base),
            credentials,
        })
    }

    /// `POST /Init` with an already signed request.
    #[tracing::instrument(skip_all, fields(order_id = %request.order_id(), amount = request.amount()))]
    pub async fn init(&self, request: &PaymentRequest, cancel: &CancellationToken) -> Result<GatewayResponse, GatewayError> {
        let response = self.call("Init", request, cancel).await?;
        tracing::info!(payment_id = ?response.payment_id, status = ?response.status, "Payment initialized");
        Ok(response)
    }

    /// `POST /GetState` for status polling.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn get_state(&self, payment_id: &str, cancel: &CancellationToken) -> Result<GatewayResponse, GatewayError> {
        let body = self.payment_operation(SignOperation::GetState, payment_id, None)?;
        self.call("GetState", &body, cancel).await
    }

    /// `POST /Cancel`: reverses an authorization or refunds a confirmed payment.
    /// `amount` (minor units) requests a partial refund; `None` cancels in full.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn cancel(&self, payment_id: &str, amount: Option<i64>, cancel: &CancellationToken) -> Result<GatewayResponse, GatewayError> {
        let body = self.payment_operation(SignOperation::Cancel, payment_id, amount)?;
        let response = self.call("Cancel", &body, cancel).await?;
        tracing::info!(status = ?response.status, "Payment cancelled");
        Ok(response)
    }

    fn payment_operation<'a>(
        &'a self,
        operation: SignOperation,
        payment_id: &'a str,
        amount: Option<i64>,
    ) -> Result<PaymentOperationRequest<'a>, GatewayError> {
        let mut fields = vec![
            ("TerminalKey", FieldValue::from(self.credentials.terminal_key())),
            ("PaymentId", FieldValue::from(payment_id)),
        ];
        if let Some(amount) = amount {
            fields.push(("Amount", FieldValue::from(amount)));
        }
        let token = signature::sign(operation, fields, self.credentials.password())?;

        Ok(PaymentOperationRequest {
            terminal_key: self.credentials.terminal_key(),
            payment_id,
            amount,
            token,
        })
    }

    async fn call<B: Serialize>(&self, method: &str, body: &B, cancel: &CancellationToken) -> Result<GatewayResponse, GatewayError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(method, "Gateway call cancelled by caller");
                Err(GatewayError::Cancelled)
            }
            result = self.post::<B, GatewayResponse>(method, body) => result?.into_result(),
        }
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, method: &str, body: &B) -> Result<R, GatewayError> {
        let url = self
            .api_base
            .join(method)
            .map_err(|e| GatewayError::Decode(format!("invalid endpoint for {method}: {e}")))?;

        let response = self.http.post(url).json(body).send().await.map_err(|e| {
            tracing::warn!(method, error = %e, "Gateway request failed");
            GatewayError::from(e)
        })?;

        let status = response.status();
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!(method, http_status = %status, error = %e, "Failed to decode gateway response");
            GatewayError::Decode(format!("HTTP {status}: {e}"))
        })
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::{PaymentIntent, PaymentRequestBuilder};
    use rust_decimal::Decimal;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Arc<GatewayCredentials> {
        Arc::new(GatewayCredentials::new("TK1", "pwd"))
    }

    fn client(server: &MockServer, timeout: Duration) -> TinkoffClient {
        crate::test_utils::install_crypto_provider();
        let base = Url::parse(&format!("{}/v2", server.uri())).unwrap();
        TinkoffClient::new(base, timeout, credentials()).unwrap()
    }

    fn request() -> PaymentRequest {
        PaymentRequestBuilder::new(credentials())
            .build(
                PaymentIntent::builder()
                    .amount(Decimal::new(1500, 0))
                    .order_id("tour-42")
                    .description("City walk")
                    .build(),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_init_success() {
        let server = MockServer::start().await;
        let request = request();

        Mock::given(method("POST"))
            .and(path("/v2/Init"))
            .and(body_partial_json(json!({
                "TerminalKey": "TK1",
                "Amount": 150000,
                "OrderId": "tour-42",
                "Token": request.token()
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Success": true,
                "ErrorCode": "0",
                "TerminalKey": "TK1",
                "Status": "NEW",
                "PaymentId": "13660",
                "OrderId": "tour-42",
                "Amount": 150000,
                "PaymentURL": "https://securepay.tinkoff.ru/new/fU1ppgqa"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server, DEFAULT_TIMEOUT)
            .init(&request, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.payment_id.as_deref(), Some("13660"));
        assert_eq!(response.payment_url.as_deref(), Some("https://securepay.tinkoff.ru/new/fU1ppgqa"));
        assert_eq!(response.status.as_deref(), Some("NEW"));
    }

    #[tokio::test]
    async fn test_rejection_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/Init"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Success": false,
                "ErrorCode": 204,
                "Message": "Неверный токен",
                "Details": "Проверьте пару TerminalKey/SecretKey"
            })))
            .mount(&server)
            .await;

        let err = client(&server, DEFAULT_TIMEOUT)
            .init(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        match &err {
            GatewayError::Rejected { code, message } => {
                assert_eq!(code, "204");
                assert!(message.starts_with("Неверный токен"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_timeout_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/Init"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)).set_body_json(json!({"Success": true})))
            .mount(&server)
            .await;

        let err = client(&server, Duration::from_millis(100))
            .init(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Timeout), "got {err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_cancellation_aborts_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/Init"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)).set_body_json(json!({"Success": true})))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = client(&server, DEFAULT_TIMEOUT).init(&request(), &cancel).await.unwrap_err();
        assert!(matches!(err, GatewayError::Cancelled));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_get_state_is_signed() {
        let server = MockServer::start().await;
        let expected_token = signature::sign(
            SignOperation::GetState,
            [("TerminalKey", FieldValue::from("TK1")), ("PaymentId", FieldValue::from("13660"))],
            "pwd",
        )
        .unwrap();

        Mock::given(method("POST"))
            .and(path("/v2/GetState"))
            .and(body_partial_json(json!({
                "TerminalKey": "TK1",
                "PaymentId": "13660",
                "Token": expected_token
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Success": true,
                "ErrorCode": "0",
                "Status": "CONFIRMED",
                "PaymentId": 13660,
                "OrderId": "tour-42",
                "Amount": 150000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server, DEFAULT_TIMEOUT)
            .get_state("13660", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status.as_deref(), Some("CONFIRMED"));
        assert_eq!(response.payment_id.as_deref(), Some("13660"));
        assert_eq!(response.order_id.as_deref(), Some("tour-42"));
    }

    #[tokio::test]
    async fn test_partial_cancel_sends_amount() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/Cancel"))
            .and(body_partial_json(json!({"PaymentId": "13660", "Amount": 5000})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Success": true,
                "ErrorCode": "0",
                "Status": "PARTIAL_REFUNDED",
                "PaymentId": "13660",
                "OrderId": "tour-42"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server, DEFAULT_TIMEOUT)
            .cancel("13660", Some(5000), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status.as_deref(), Some("PARTIAL_REFUNDED"));
    }

    #[tokio::test]
    async fn test_non_json_response_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/GetState"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&server)
            .await;

        let err = client(&server, DEFAULT_TIMEOUT)
            .get_state("13660", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Decode(ref m) if m.contains("502")), "got {err:?}");
    }

    #[test]
    fn test_trailing_slash_is_added() {
        let url = with_trailing_slash(Url::parse("https://securepay.tinkoff.ru/v2").unwrap());
        assert_eq!(url.join("Init").unwrap().as_str(), "https://securepay.tinkoff.ru/v2/Init");
    }
}
