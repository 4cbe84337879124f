//! Test utilities shared by handler and provider tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::TestServer;
use url::Url;

use crate::config::{Config, DummyConfig, PaymentConfig, TinkoffConfig};
use crate::events::PaymentEventSink;
use crate::payments::VerifiedNotification;
use crate::payments::receipt::ReceiptDefaults;

/// Install the rustls crypto provider once per process; reqwest is built without one.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub fn create_test_app(config: Config) -> TestServer {
    install_crypto_provider();
    crate::Application::new(config)
        .expect("Failed to create application")
        .into_test_server()
}

pub fn create_test_app_with_sink(config: Config, sink: Arc<dyn PaymentEventSink>) -> TestServer {
    install_crypto_provider();
    crate::Application::new_with_sink(config, sink)
        .expect("Failed to create application")
        .into_test_server()
}

/// Config without a payment provider.
pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    }
}

pub fn dummy_config() -> Config {
    Config {
        payment: Some(PaymentConfig::Dummy(DummyConfig {
            terminal_key: "TestTerminal".to_string(),
            password: "test-password".to_string(),
            checkout_url: Url::parse("http://localhost/checkout").unwrap(),
        })),
        ..create_test_config()
    }
}

/// Tinkoff provider pointed at `api_base` (usually a wiremock server) with terminal `TK1` / `pwd`.
pub fn tinkoff_config(api_base: &str) -> Config {
    Config {
        payment: Some(PaymentConfig::Tinkoff(TinkoffConfig {
            terminal_key: "TK1".to_string(),
            password: "pwd".to_string(),
            api_base: Url::parse(api_base).unwrap(),
            timeout: std::time::Duration::from_secs(2),
            success_url: None,
            fail_url: None,
            notification_url: None,
            receipt: ReceiptDefaults::default(),
        })),
        ..create_test_config()
    }
}

/// Event sink that remembers what it was given, optionally failing every call.
#[derive(Default)]
pub struct RecordingEventSink {
    recorded: Mutex<Vec<VerifiedNotification>>,
    fail: bool,
}

impl RecordingEventSink {
    pub fn failing() -> Self {
        Self {
            recorded: Mutex::default(),
            fail: true,
        }
    }

    pub fn recorded(&self) -> Vec<VerifiedNotification> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentEventSink for RecordingEventSink {
    async fn payment_updated(&self, notification: &VerifiedNotification) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("storage unavailable");
        }
        self.recorded.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
