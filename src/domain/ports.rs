use super::audit::AuditEntry;
use super::order::{Order, OrderId, OrderStatus};
use super::processor::{HostedCheckout, HostedCheckoutStatus, StatusReport};
use super::session::PaymentSession;
use crate::error::{Result, TransportError};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// The host's order store. The gateway never creates or deletes orders.
///
/// Implementations must serialise writers per order; the gateway structures each
/// mutation as load, check preconditions, then a single save.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn load(&self, id: OrderId) -> Result<Option<Order>>;
    async fn save(&self, order: &Order) -> Result<()>;
    /// Records the payment as complete: stores the transaction id, moves the order
    /// to its paid state and persists it.
    async fn mark_paid(&self, order: &mut Order, transaction_id: &str) -> Result<()>;
    async fn add_note(&self, order: &Order, note: &str) -> Result<()>;
    /// Sets the status, persists the order and records the note in one write.
    async fn transition_status(&self, order: &mut Order, status: OrderStatus, note: &str)
    -> Result<()>;
    /// The host's own bookkeeping of refunds already issued for this order.
    async fn total_already_refunded(&self, order: &Order) -> Result<Decimal>;
    /// Adds an accepted refund to the total reported by `total_already_refunded`.
    async fn record_refund(&self, order: &Order, amount: Decimal) -> Result<()>;
}

/// The hosted-checkout processor's remote API. Each call is one request/response.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    async fn create_hosted_checkout(
        &self,
        session: &PaymentSession,
    ) -> std::result::Result<HostedCheckout, TransportError>;

    async fn get_hosted_checkout_status(
        &self,
        hosted_checkout_id: &str,
    ) -> std::result::Result<HostedCheckoutStatus, TransportError>;

    async fn capture_payment(
        &self,
        payment_id: &str,
        amount_minor_units: i64,
    ) -> std::result::Result<StatusReport, TransportError>;

    async fn refund_payment(
        &self,
        payment_id: &str,
        amount_minor_units: i64,
        currency: &str,
    ) -> std::result::Result<StatusReport, TransportError>;
}

/// Append-only sink for the transaction log. Appending never blocks on I/O and never fails.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: AuditEntry);
}

pub type OrderStoreBox = Box<dyn OrderStore>;
pub type PaymentClientBox = Box<dyn PaymentClient>;
