use crate::domain::order::Order;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Merchant policy for how payments are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentAction {
    Authorize,
    #[default]
    AuthorizeCapture,
}

impl PaymentAction {
    pub fn authorization_mode(&self) -> AuthorizationMode {
        match self {
            PaymentAction::Authorize => AuthorizationMode::FinalAuthorization,
            PaymentAction::AuthorizeCapture => AuthorizationMode::Sale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationMode {
    FinalAuthorization,
    Sale,
}

impl AuthorizationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationMode::FinalAuthorization => "FINAL_AUTHORIZATION",
            AuthorizationMode::Sale => "SALE",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuthorizationMode::FinalAuthorization => "Authorize Only",
            AuthorizationMode::Sale => "Authorize & Capture",
        }
    }
}

impl fmt::Display for AuthorizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const MIN_PAYMENT_ATTEMPTS: u8 = 1;
pub const MAX_PAYMENT_ATTEMPTS: u8 = 10;
pub const DEFAULT_LOCALE: &str = "en_AU";

/// Host locales the hosted checkout page understands, mapped to processor locales.
const LOCALE_MAP: &[(&str, &str)] = &[
    ("en_AU", "en_AU"),
    ("en_US", "en_US"),
    ("en_GB", "en_UK"),
    ("zh_CN", "zh_CN"),
    ("ja", "ja_JP"),
    ("ko_KR", "ko_KR"),
];

/// Exact match first, then the first entry sharing the two-letter language code.
pub fn resolve_locale(host_locale: &str) -> &'static str {
    if let Some((_, locale)) = LOCALE_MAP.iter().find(|(host, _)| *host == host_locale) {
        return *locale;
    }
    let lang = host_locale.get(..2).unwrap_or(host_locale);
    LOCALE_MAP
        .iter()
        .find(|(host, _)| host.get(..2) == Some(lang))
        .map(|(_, locale)| *locale)
        .unwrap_or(DEFAULT_LOCALE)
}

/// Everything needed to open one hosted checkout session. Discarded once the
/// processor response is stored on the order.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSession {
    pub amount_minor_units: i64,
    pub currency: String,
    pub authorization_mode: AuthorizationMode,
    pub return_url: String,
    pub locale: String,
    pub max_payment_attempts: u8,
    pub template_variant: Option<String>,
}

impl PaymentSession {
    pub fn for_order(
        order: &Order,
        action: PaymentAction,
        return_url: String,
        host_locale: &str,
        max_payment_attempts: u8,
        template_variant: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            amount_minor_units: crate::domain::order::to_minor_units(order.total)?,
            currency: order.currency.clone(),
            authorization_mode: action.authorization_mode(),
            return_url,
            locale: resolve_locale(host_locale).to_string(),
            max_payment_attempts: max_payment_attempts
                .clamp(MIN_PAYMENT_ATTEMPTS, MAX_PAYMENT_ATTEMPTS),
            template_variant: template_variant
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        })
    }
}
