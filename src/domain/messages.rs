//! Customer-safe and administrator-facing texts for processor outcomes.

use crate::domain::processor::StatusReport;

const UNKNOWN_REASON: &str = "Unknown error";

pub const INITIATION_FAILED: &str =
    "Payment could not be initiated. Please try again or contact support.";
pub const VERIFICATION_FAILED: &str = "Payment verification failed. Please try again.";
pub const VERIFICATION_ERROR: &str = "Payment verification failed. Please contact support.";
pub const CAPTURE_UNAVAILABLE: &str = "Capture could not be processed. Please try again or process the capture directly in the merchant portal.";
pub const REFUND_UNAVAILABLE: &str = "Refund could not be processed. Please try again or process the refund directly in the merchant portal.";

/// Why a payment failed: `reason` is recorded on the order, `customer_message` is
/// the only text the shopper sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureInfo {
    pub reason: String,
    pub error_code: String,
    pub customer_message: String,
}

pub fn payment_failure(report: &StatusReport) -> FailureInfo {
    let mut reason = UNKNOWN_REASON.to_string();
    let mut error_code = String::new();

    if let Some(err) = report.first_error() {
        if let Some(code) = &err.error_code {
            error_code = code.clone();
        }
        if let Some(detail) = err.message.as_ref().or(err.id.as_ref()) {
            reason = detail.clone();
        }
    }

    let (reason, customer_message) = match report.status_code {
        2 => {
            if reason == UNKNOWN_REASON {
                reason = "Transaction declined by issuer".to_string();
            }
            (
                reason,
                "Your payment was declined. Please check your card details or try a different card.",
            )
        }
        51 => (
            "Transaction pending".to_string(),
            "Your payment is pending. Please wait or contact support if the issue persists.",
        ),
        0 => (
            "Invalid payment response".to_string(),
            "We could not process your payment. Please try again.",
        ),
        1 => (
            "Transaction cancelled".to_string(),
            "The payment was cancelled. Please try again if you wish to complete your purchase.",
        ),
        52 => (
            "Transaction outcome uncertain".to_string(),
            "We could not confirm your payment status. Please contact support.",
        ),
        57 | 59 => (
            "Transaction rejected by fraud prevention".to_string(),
            "Your payment could not be processed. Please try a different payment method or contact support.",
        ),
        83 => (
            "Refund rejected".to_string(),
            "The refund could not be processed. Please contact support.",
        ),
        code => {
            if reason == UNKNOWN_REASON {
                reason = format!("Payment failed with status code {code}");
            }
            (
                reason,
                "Payment was not successful. Please try again or use a different payment method.",
            )
        }
    };

    FailureInfo {
        reason,
        error_code,
        customer_message: customer_message.to_string(),
    }
}

/// Shopper-facing text for a hosted checkout that never produced a payment.
pub fn checkout_status_message(status: &str) -> &'static str {
    match status {
        "CANCELLED_BY_CONSUMER" => {
            "You cancelled the payment. Please try again if you wish to complete your purchase."
        }
        "CLIENT_NOT_ELIGIBLE_FOR_SELECTED_PAYMENT_PRODUCT" => {
            "The selected payment method is not available. Please try a different payment method."
        }
        "IN_PROGRESS" => {
            "Your payment is still being processed. Please wait a moment and check your order status."
        }
        "PAYMENT_NOT_COMPLETED" => "Payment was not completed. Please try again.",
        "PAYMENT_TIMED_OUT" => "The payment session timed out. Please try again.",
        _ => "Payment was not successful. Please try again.",
    }
}

fn first_error_message(report: &StatusReport) -> Option<String> {
    report.first_error().and_then(|err| err.message.clone())
}

pub fn capture_error_message(report: &StatusReport) -> String {
    if let Some(message) = first_error_message(report) {
        return message;
    }
    match report.status_code {
        92 => "Capture outcome is uncertain. Please check the merchant portal for the actual status.".to_string(),
        93 => "Capture was rejected. The authorization may have expired or been cancelled.".to_string(),
        code => match report.status.as_str() {
            "REJECTED" | "CANCELLED" => {
                "Capture was rejected. The authorization may have expired.".to_string()
            }
            _ => format!("Capture failed with status code {code}."),
        },
    }
}

pub fn refund_error_message(report: &StatusReport) -> String {
    if let Some(message) = first_error_message(report) {
        return message;
    }
    match report.status_code {
        82 => "Refund outcome is uncertain. Please check the merchant portal for the actual status.".to_string(),
        83 => "Refund was rejected. The original transaction may not be eligible for refund.".to_string(),
        code => {
            if report.status == "REJECTED" {
                "Refund was rejected. Please verify the transaction is eligible for refund.".to_string()
            } else {
                format!("Refund failed with status code {code}.")
            }
        }
    }
}
