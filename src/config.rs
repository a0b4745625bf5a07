//! Gateway settings and credential resolution.
//!
//! Settings are read once into an immutable [`GatewayConfig`] and handed to the
//! orchestrator at construction.

use crate::domain::order::OrderId;
use crate::domain::session::{DEFAULT_LOCALE, PaymentAction};
use crate::error::{GatewayError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const TEST_ENDPOINT: &str = "https://payment.preprod.anzworldline-solutions.com.au";
pub const LIVE_ENDPOINT: &str = "https://payment.anzworldline-solutions.com.au";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Test,
    Live,
}

/// One merchant credential set as entered in the merchant portal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CredentialSet {
    /// PSPID.
    pub merchant_id: String,
    pub api_key: String,
    pub api_secret: String,
}

impl CredentialSet {
    pub fn is_complete(&self) -> bool {
        !self.merchant_id.trim().is_empty()
            && !self.api_key.trim().is_empty()
            && !self.api_secret.trim().is_empty()
    }
}

/// The active credentials together with the endpoint they belong to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub merchant_id: String,
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("merchant_id", &self.merchant_id)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Host endpoints the shopper is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HostUrls {
    pub callback_url: String,
    pub checkout_url: String,
    /// Prefix of the order-received page; the order id is appended.
    pub order_received_url: String,
}

impl Default for HostUrls {
    fn default() -> Self {
        Self {
            callback_url: "http://127.0.0.1:8080/checkout/callback".to_string(),
            checkout_url: "http://127.0.0.1:8080/checkout".to_string(),
            order_received_url: "http://127.0.0.1:8080/checkout/order-received".to_string(),
        }
    }
}

impl HostUrls {
    pub fn return_url(&self, order_id: OrderId) -> String {
        let separator = if self.callback_url.contains('?') { '&' } else { '?' };
        format!("{}{}order_id={}", self.callback_url, separator, order_id)
    }

    pub fn order_received(&self, order_id: OrderId) -> String {
        format!("{}/{}", self.order_received_url.trim_end_matches('/'), order_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub enabled: bool,
    pub test_mode: bool,
    pub payment_action: PaymentAction,
    pub max_payment_attempts: u8,
    pub template_variant: Option<String>,
    pub host_locale: String,
    pub request_timeout_secs: u64,
    pub test: CredentialSet,
    pub live: CredentialSet,
    pub urls: HostUrls,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            test_mode: true,
            payment_action: PaymentAction::AuthorizeCapture,
            max_payment_attempts: 3,
            template_variant: None,
            host_locale: DEFAULT_LOCALE.to_string(),
            request_timeout_secs: 30,
            test: CredentialSet::default(),
            live: CredentialSet::default(),
            urls: HostUrls::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn mode(&self) -> Mode {
        if self.test_mode { Mode::Test } else { Mode::Live }
    }

    pub fn credentials(&self) -> Result<Credentials> {
        CredentialResolver::resolve(self.mode(), self)
    }

    /// Enabled and holding a complete credential set for the active mode.
    pub fn is_available(&self) -> bool {
        self.enabled && self.credentials().is_ok()
    }

    pub fn ensure_available(&self) -> Result<()> {
        if !self.enabled {
            return Err(GatewayError::Configuration(
                "gateway is disabled".to_string(),
            ));
        }
        self.credentials().map(|_| ())
    }
}

pub struct CredentialResolver;

impl CredentialResolver {
    pub fn resolve(mode: Mode, config: &GatewayConfig) -> Result<Credentials> {
        let (set, endpoint, label) = match mode {
            Mode::Test => (&config.test, TEST_ENDPOINT, "test"),
            Mode::Live => (&config.live, LIVE_ENDPOINT, "live"),
        };
        if !set.is_complete() {
            return Err(GatewayError::Configuration(format!(
                "{label} credentials are incomplete: merchant_id, api_key and api_secret are required"
            )));
        }
        Ok(Credentials {
            endpoint: endpoint.to_string(),
            merchant_id: set.merchant_id.trim().to_string(),
            api_key: set.api_key.trim().to_string(),
            api_secret: set.api_secret.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn complete(prefix: &str) -> CredentialSet {
        CredentialSet {
            merchant_id: format!("{prefix}-merchant"),
            api_key: format!("{prefix}-key"),
            api_secret: format!("{prefix}-secret"),
        }
    }

    #[test]
    fn test_resolve_picks_endpoint_by_mode() {
        let config = GatewayConfig {
            test: complete("t"),
            live: complete("l"),
            ..Default::default()
        };

        let test = CredentialResolver::resolve(Mode::Test, &config).unwrap();
        assert_eq!(test.endpoint, TEST_ENDPOINT);
        assert_eq!(test.merchant_id, "t-merchant");

        let live = CredentialResolver::resolve(Mode::Live, &config).unwrap();
        assert_eq!(live.endpoint, LIVE_ENDPOINT);
        assert_eq!(live.api_key, "l-key");
    }

    #[test]
    fn test_missing_field_is_configuration_error() {
        let mut set = complete("t");
        set.api_secret = "  ".to_string();
        let config = GatewayConfig {
            test: set,
            ..Default::default()
        };
        assert!(matches!(
            CredentialResolver::resolve(Mode::Test, &config),
            Err(GatewayError::Configuration(_))
        ));
        assert!(!config.is_available());
    }

    #[test]
    fn test_availability_follows_active_mode() {
        let mut config = GatewayConfig {
            test: complete("t"),
            ..Default::default()
        };
        assert!(config.is_available());
        config.test_mode = false;
        assert!(!config.is_available());
        config.test_mode = true;
        config.enabled = false;
        assert!(matches!(
            config.ensure_available(),
            Err(GatewayError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = GatewayConfig {
            test: complete("t"),
            ..Default::default()
        };
        let printed = format!("{:?}", config.credentials().unwrap());
        assert!(!printed.contains("t-secret"));
        assert!(!printed.contains("t-key"));
    }

    #[test]
    fn test_host_urls() {
        let urls = HostUrls {
            callback_url: "https://shop.test/wc-api/gateway".into(),
            checkout_url: "https://shop.test/checkout".into(),
            order_received_url: "https://shop.test/checkout/order-received/".into(),
        };
        assert_eq!(urls.return_url(42), "https://shop.test/wc-api/gateway?order_id=42");
        assert_eq!(
            urls.order_received(42),
            "https://shop.test/checkout/order-received/42"
        );

        let urls = HostUrls {
            callback_url: "https://shop.test/?wc-api=gateway".into(),
            ..urls
        };
        assert_eq!(urls.return_url(7), "https://shop.test/?wc-api=gateway&order_id=7");
    }

    #[test]
    fn test_from_file_applies_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"payment_action": "authorize", "test": {{"merchant_id": "m", "api_key": "k", "api_secret": "s"}}}}"#
        )
        .unwrap();

        let config = GatewayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.payment_action, PaymentAction::Authorize);
        assert_eq!(config.max_payment_attempts, 3);
        assert!(config.test_mode);
        assert!(config.is_available());
    }
}
