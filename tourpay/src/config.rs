//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `TOURPAY_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `TOURPAY_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. The terminal
//! password should always come from the environment:
//!
//! ```bash
//! TOURPAY_PAYMENT__TINKOFF__TERMINAL_KEY=1700000000000DEMO
//! TOURPAY_PAYMENT__TINKOFF__PASSWORD=...
//! TOURPAY_PORT=8080
//! ```

use std::fmt;
use std::time::Duration;

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::Error;
use crate::payments::client::{DEFAULT_API_BASE, DEFAULT_TIMEOUT};
use crate::payments::receipt::ReceiptDefaults;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "TOURPAY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Externally reachable base URL of this service. When set, the gateway is told to deliver
    /// notifications to `{public_url}/webhooks/payments` unless the provider config overrides it.
    pub public_url: Option<Url>,
    /// Browser origins allowed to call the payments API (the storefront)
    pub cors_allowed_origins: Vec<Url>,
    /// Export traces over OTLP in addition to logging them
    pub enable_otel_export: bool,
    /// Payment provider. Payment routes answer 501 when absent.
    pub payment: Option<PaymentConfig>,
    pub webhook: WebhookConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            public_url: None,
            cors_allowed_origins: Vec::new(),
            enable_otel_export: false,
            payment: None,
            webhook: WebhookConfig::default(),
        }
    }
}

/// Payment provider configuration.
///
/// Supports different payment providers via an enum. Credentials should be
/// set via environment variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentConfig {
    /// Tinkoff Acquiring API v2
    /// - `TOURPAY_PAYMENT__TINKOFF__TERMINAL_KEY`
    /// - `TOURPAY_PAYMENT__TINKOFF__PASSWORD`
    Tinkoff(TinkoffConfig),
    /// Local provider that never leaves the process
    Dummy(DummyConfig),
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TinkoffConfig {
    pub terminal_key: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(default = "TinkoffConfig::default_api_base")]
    pub api_base: Url,
    /// Per-request timeout for gateway calls
    #[serde(default = "TinkoffConfig::default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Where the payer lands after a successful payment
    #[serde(default)]
    pub success_url: Option<Url>,
    /// Where the payer lands after a failed payment
    #[serde(default)]
    pub fail_url: Option<Url>,
    /// Explicit notification URL; derived from `public_url` when unset
    #[serde(default)]
    pub notification_url: Option<Url>,
    #[serde(default)]
    pub receipt: ReceiptDefaults,
}

impl fmt::Debug for TinkoffConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TinkoffConfig")
            .field("terminal_key", &self.terminal_key)
            .field("password", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .field("success_url", &self.success_url)
            .field("fail_url", &self.fail_url)
            .field("notification_url", &self.notification_url)
            .field("receipt", &self.receipt)
            .finish()
    }
}

impl TinkoffConfig {
    fn default_api_base() -> Url {
        Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL")
    }

    fn default_timeout() -> Duration {
        DEFAULT_TIMEOUT
    }
}

/// Dummy payment configuration for local development.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DummyConfig {
    pub terminal_key: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Checkout page the payer is "redirected" to; the payment id is appended as `PaymentId`
    pub checkout_url: Url,
}

impl fmt::Debug for DummyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyConfig")
            .field("terminal_key", &self.terminal_key)
            .field("password", &"<redacted>")
            .field("checkout_url", &self.checkout_url)
            .finish()
    }
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            terminal_key: "TourpayDummy".to_string(),
            password: "dummy-password".to_string(),
            checkout_url: Url::parse("http://localhost:3001/dummy-checkout").expect("default checkout URL is valid"),
        }
    }
}

/// Notification endpoint settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebhookConfig {
    /// Largest notification body accepted, in bytes
    pub max_body_bytes: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { max_body_bytes: 64 * 1024 }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(PaymentConfig::Tinkoff(tinkoff)) = &self.payment {
            if tinkoff.terminal_key.trim().is_empty() {
                return Err(Error::Internal {
                    operation: "Config validation: payment.tinkoff.terminal_key is empty. \
                     Set TOURPAY_PAYMENT__TINKOFF__TERMINAL_KEY or add it to the config file."
                        .to_string(),
                });
            }
            if tinkoff.password.is_empty() {
                return Err(Error::Internal {
                    operation: "Config validation: payment.tinkoff.password is empty. \
                     Set TOURPAY_PAYMENT__TINKOFF__PASSWORD."
                        .to_string(),
                });
            }
            if tinkoff.timeout.is_zero() {
                return Err(Error::Internal {
                    operation: "Config validation: payment.tinkoff.timeout must be greater than zero".to_string(),
                });
            }
        }

        if let Some(PaymentConfig::Dummy(dummy)) = &self.payment {
            if dummy.password.is_empty() {
                return Err(Error::Internal {
                    operation: "Config validation: payment.dummy.password is empty".to_string(),
                });
            }
        }

        if self.webhook.max_body_bytes == 0 {
            return Err(Error::Internal {
                operation: "Config validation: webhook.max_body_bytes must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("TOURPAY_").split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Notification URL derived from `public_url`, if one is configured.
    pub fn webhook_url(&self) -> Option<Url> {
        self.public_url.as_ref()?.join("webhooks/payments").ok()
    }
}
