//! Processor responses as the gateway sees them, independent of the wire format.

use serde::{Deserialize, Serialize};

/// Result of creating a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedCheckout {
    pub hosted_checkout_id: String,
    /// Per-session secret echoed back on the return URL as `RETURNMAC`.
    pub return_token: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiError {
    pub error_code: Option<String>,
    pub id: Option<String>,
    pub message: Option<String>,
}

/// Status of a payment, capture or refund as reported by the processor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusReport {
    pub id: String,
    pub status: String,
    pub status_code: i32,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

impl StatusReport {
    pub fn new(id: impl Into<String>, status: impl Into<String>, status_code: i32) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            status_code,
            errors: Vec::new(),
        }
    }

    pub fn with_error(mut self, error: ApiError) -> Self {
        self.errors.push(error);
        self
    }

    pub fn first_error(&self) -> Option<&ApiError> {
        self.errors.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedCheckoutStatus {
    pub status: String,
    pub payment: Option<StatusReport>,
}

impl HostedCheckoutStatus {
    /// Only these statuses carry payment details worth examining.
    pub fn has_payment_details(&self) -> bool {
        matches!(self.status.as_str(), "PAYMENT_CREATED" | "PAYMENT_FINISHED")
    }
}
