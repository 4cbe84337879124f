//! # tourpay: payment core for a tour booking storefront
//!
//! `tourpay` takes a booking from the storefront, turns it into a signed payment initialization
//! for the Tinkoff Acquiring API, and verifies the asynchronous status notifications the gateway
//! sends back.
//!
//! ## Architecture
//!
//! - [`payments`] is the core: the signature engine, the request builder, the webhook verifier
//!   and the HTTP client for the gateway. Apart from the client it is pure and synchronous.
//! - [`payment_providers`] wraps the core behind the `PaymentProvider` trait so the HTTP layer
//!   does not care whether it talks to the real gateway or the local dummy.
//! - [`events`] is where verified notifications leave this crate (persistence, customer email).
//! - [`api`] holds thin axum handlers; they translate HTTP to provider calls and errors back.
//!
//! ## Request Flow
//!
//! ```text
//! storefront ─POST /api/v1/payments─► builder ─sign─► client ─Init─► gateway
//!                                                                       │
//! gateway ─POST /webhooks/payments─► verifier ─► PaymentEventSink ◄─────┘ (payer pays)
//! ```
//!
//! ## Configuration
//!
//! See [`config`]. The only secrets are the terminal key and password, read once at startup.

pub mod api;
pub mod config;
pub mod errors;
pub mod events;
mod openapi;
pub mod payment_providers;
pub mod payments;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{self, HeaderValue};
use axum::{
    Router,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa_scalar::{Scalar, Servable};

use crate::events::{LoggingEventSink, PaymentEventSink};
use crate::openapi::ApiDoc;
use crate::payment_providers::PaymentProvider;

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .maybe_provider(provider)
///     .events(Arc::new(LoggingEventSink))
///     .shutdown(token)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    /// `None` when no provider is configured; payment routes then answer 501
    pub provider: Option<Arc<dyn PaymentProvider>>,
    pub events: Arc<dyn PaymentEventSink>,
    /// Cancelled on shutdown; gateway calls run under child tokens
    #[builder(default)]
    pub shutdown: CancellationToken,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<Option<CorsLayer>> {
    if config.cors_allowed_origins.is_empty() {
        return Ok(None);
    }

    let origins = config
        .cors_allowed_origins
        .iter()
        .map(|url| url.origin().ascii_serialization().parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([http::Method::GET, http::Method::POST])
            .allow_headers([http::header::CONTENT_TYPE]),
    ))
}

/// Build the application router.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let payments = Router::new()
        .route("/payments", post(api::handlers::payments::create_payment))
        .route("/payments/{payment_id}", get(api::handlers::payments::get_payment))
        .route("/payments/{payment_id}/cancel", post(api::handlers::payments::cancel_payment));

    let mut api_router = Router::new().nest("/api/v1", payments);
    if let Some(cors) = create_cors_layer(&state.config)? {
        api_router = api_router.layer(cors);
    }

    let router = Router::new()
        .merge(api_router)
        .route(
            "/webhooks/payments",
            post(api::handlers::webhooks::payment_notification).layer(DefaultBodyLimit::max(state.config.webhook.max_body_bytes)),
        )
        .route("/healthz", get(api::handlers::health::healthz))
        .route("/api/openapi.json", get(|| async { axum::Json(ApiDoc::full()) }))
        .merge(Scalar::with_url("/api/docs", ApiDoc::full()))
        .with_state(state);

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application: owns the router and the shutdown token.
///
/// 1. **Create**: [`Application::new`] builds the provider from config and wires the router
/// 2. **Serve**: [`Application::serve`] binds and serves until the shutdown future resolves,
///    then cancels in-flight gateway calls and flushes telemetry
pub struct Application {
    router: Router,
    config: Config,
    shutdown: CancellationToken,
}

impl Application {
    /// Create a new application that logs verified notifications.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_sink(config, Arc::new(LoggingEventSink))
    }

    /// Create a new application that forwards verified notifications to `events`.
    pub fn new_with_sink(config: Config, events: Arc<dyn PaymentEventSink>) -> anyhow::Result<Self> {
        debug!("Starting tourpay with configuration: {:#?}", config);

        let provider: Option<Arc<dyn PaymentProvider>> = match &config.payment {
            Some(_) => Some(Arc::from(payment_providers::create_provider(&config, events.clone())?)),
            None => {
                tracing::warn!("No payment provider configured; payment endpoints will answer 501");
                None
            }
        };

        let shutdown = CancellationToken::new();
        let state = AppState::builder()
            .config(config.clone())
            .maybe_provider(provider)
            .events(events)
            .shutdown(shutdown.clone())
            .build();

        let router = build_router(state)?;

        Ok(Self { router, config, shutdown })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("tourpay listening on http://{}", bind_addr);

        let token = self.shutdown.clone();
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                shutdown.await;
                // Abandon gateway calls still in flight so connections can drain
                token.cancel();
            })
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{create_test_app, create_test_config};
    use url::Url;

    #[test_log::test(tokio::test)]
    async fn test_healthz() {
        let server = create_test_app(create_test_config());
        let response = server.get("/healthz").await;
        response.assert_status_ok();
        assert_eq!(response.json::<serde_json::Value>()["status"], "ok");
    }

    #[test_log::test(tokio::test)]
    async fn test_openapi_json_and_docs() {
        let server = create_test_app(create_test_config());

        let response = server.get("/api/openapi.json").await;
        response.assert_status_ok();
        let content = response.text();
        assert!(content.contains("\"openapi\""));
        assert!(content.contains("/api/v1/payments"));
        assert!(content.contains("/webhooks/payments"));

        server.get("/api/docs").await.assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_cors_preflight_for_storefront() {
        let mut config = create_test_config();
        config.cors_allowed_origins = vec![Url::parse("https://tours.example.com/").unwrap()];
        let server = create_test_app(config);

        let response = server
            .method(http::Method::OPTIONS, "/api/v1/payments")
            .add_header(http::header::ORIGIN, "https://tours.example.com")
            .add_header(http::header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .await;

        assert_eq!(
            response.header(http::header::ACCESS_CONTROL_ALLOW_ORIGIN),
            HeaderValue::from_static("https://tours.example.com")
        );
    }

    #[test]
    fn test_application_builds_with_tinkoff_provider() {
        let mut config = create_test_config();
        config.payment = Some(crate::config::PaymentConfig::Tinkoff(crate::config::TinkoffConfig {
            terminal_key: "TK1".to_string(),
            password: "pwd".to_string(),
            api_base: Url::parse("https://securepay.tinkoff.ru/v2/").unwrap(),
            timeout: std::time::Duration::from_secs(1),
            success_url: None,
            fail_url: None,
            notification_url: None,
            receipt: Default::default(),
        }));
        crate::test_utils::install_crypto_provider();
        assert!(Application::new(config).is_ok());
    }
}
