use crate::error::{GatewayError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type OrderId = u64;

/// A strictly positive monetary amount.
///
/// Capture and refund requests are validated into an `Amount` before any remote
/// call is made, so a zero or negative value never reaches the processor.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(GatewayError::InvalidAmount(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Converts to the smallest currency unit, rounding half away from zero.
    ///
    /// Fails when the amount rounds to zero units, so a sub-cent value is never sent.
    pub fn minor_units(&self) -> Result<i64> {
        let units = to_minor_units(self.0)?;
        if units <= 0 {
            return Err(GatewayError::InvalidAmount(format!(
                "{} is below the smallest currency unit",
                self.0
            )));
        }
        Ok(units)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidAmount(format!("{amount} is out of range")))
}

/// Host-defined order lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    #[default]
    PendingPayment,
    OnHold,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// States in which the host considers the order paid.
    pub fn is_paid(&self) -> bool {
        matches!(self, OrderStatus::Processing | OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::PendingPayment => "pending-payment",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        };
        f.write_str(name)
    }
}

/// Payment progress of an order, derived from its stored metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    NotInitiated,
    AwaitingReturn,
    Authorized,
    Captured,
    Failed,
    AlreadyPaid,
}

/// The host order together with the payment metadata this gateway stores on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub total: Decimal,
    /// ISO 4217 code.
    pub currency: String,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub hosted_checkout_id: Option<String>,
    #[serde(default)]
    pub return_token: Option<String>,
    #[serde(default)]
    pub needs_capture: bool,
    #[serde(default)]
    pub captured: bool,
    #[serde(default)]
    pub authorized_amount: Option<Decimal>,
    #[serde(default)]
    pub refund_ids: Vec<String>,
    #[serde(default)]
    pub capture_id: Option<String>,
}

impl Order {
    pub fn new(id: OrderId, total: Decimal, currency: impl Into<String>) -> Self {
        Self {
            id,
            total,
            currency: currency.into(),
            status: OrderStatus::PendingPayment,
            transaction_id: None,
            hosted_checkout_id: None,
            return_token: None,
            needs_capture: false,
            captured: false,
            authorized_amount: None,
            refund_ids: Vec::new(),
            capture_id: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status.is_paid()
    }

    /// Non-empty processor payment id, if an authorization or sale succeeded.
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn payment_state(&self) -> PaymentState {
        if self.captured {
            PaymentState::Captured
        } else if self.needs_capture {
            PaymentState::Authorized
        } else if self.status == OrderStatus::Failed {
            PaymentState::Failed
        } else if self.is_paid() {
            PaymentState::AlreadyPaid
        } else if self.hosted_checkout_id.is_some() {
            PaymentState::AwaitingReturn
        } else {
            PaymentState::NotInitiated
        }
    }

    /// Records an authorization that still has to be captured.
    pub fn record_authorization(&mut self, payment_id: &str) {
        self.transaction_id = Some(payment_id.to_string());
        self.needs_capture = true;
        self.captured = false;
        self.authorized_amount = Some(self.total);
    }

    /// Records that funds were captured, either immediately or after an authorization.
    pub fn record_capture(&mut self, capture_id: Option<&str>) {
        self.needs_capture = false;
        self.captured = true;
        if let Some(id) = capture_id {
            self.capture_id = Some(id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(0.01)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(GatewayError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-5.0)),
            Err(GatewayError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_sub_cent_amount_has_no_minor_units() {
        let amount = Amount::new(dec!(0.004)).unwrap();
        assert!(matches!(
            amount.minor_units(),
            Err(GatewayError::InvalidAmount(_))
        ));
        assert_eq!(Amount::new(dec!(0.005)).unwrap().minor_units().unwrap(), 1);
    }

    #[test]
    fn test_minor_units_round_half_away_from_zero() {
        assert_eq!(to_minor_units(dec!(100.00)).unwrap(), 10000);
        assert_eq!(to_minor_units(dec!(19.995)).unwrap(), 2000);
        assert_eq!(to_minor_units(dec!(0.125)).unwrap(), 13);
        assert_eq!(to_minor_units(dec!(40)).unwrap(), 4000);
    }

    #[test]
    fn test_authorization_then_capture_keeps_flags_exclusive() {
        let mut order = Order::new(1, dec!(100.00), "AUD");
        order.record_authorization("pay_1");
        assert!(order.needs_capture && !order.captured);
        assert_eq!(order.authorized_amount, Some(dec!(100.00)));
        assert_eq!(order.payment_state(), PaymentState::Authorized);

        order.record_capture(Some("cap_1"));
        assert!(!order.needs_capture && order.captured);
        assert_eq!(order.capture_id.as_deref(), Some("cap_1"));
        assert_eq!(order.payment_state(), PaymentState::Captured);
    }

    #[test]
    fn test_payment_state_derivation() {
        let mut order = Order::new(7, dec!(10), "AUD");
        assert_eq!(order.payment_state(), PaymentState::NotInitiated);
        order.hosted_checkout_id = Some("hc".into());
        assert_eq!(order.payment_state(), PaymentState::AwaitingReturn);
        order.status = OrderStatus::Failed;
        assert_eq!(order.payment_state(), PaymentState::Failed);
        order.status = OrderStatus::Completed;
        assert_eq!(order.payment_state(), PaymentState::AlreadyPaid);
    }

    #[test]
    fn test_empty_transaction_id_is_absent() {
        let mut order = Order::new(1, dec!(1), "AUD");
        order.transaction_id = Some(String::new());
        assert!(order.transaction_id().is_none());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&OrderStatus::OnHold).unwrap();
        assert_eq!(json, "\"on-hold\"");
        assert_eq!(OrderStatus::PendingPayment.to_string(), "pending-payment");
    }
}
