use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::error::{GatewayError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;

/// One row of the orders seed file.
///
/// Only `id`, `total` and `currency` are required; the payment columns let a file
/// describe orders that were already authorized or captured.
#[derive(Debug, Deserialize)]
struct OrderRecord {
    id: OrderId,
    /// Parsed as text so the amount keeps its exact scale.
    total: String,
    currency: String,
    #[serde(default)]
    status: Option<OrderStatus>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    needs_capture: Option<bool>,
    #[serde(default)]
    captured: Option<bool>,
}

impl TryFrom<OrderRecord> for Order {
    type Error = GatewayError;

    fn try_from(record: OrderRecord) -> Result<Self> {
        let total = Decimal::from_str(&record.total).map_err(|e| {
            GatewayError::InvalidAmount(format!("order {} total '{}': {e}", record.id, record.total))
        })?;
        let mut order = Order::new(record.id, total, record.currency);
        order.status = record.status.unwrap_or_default();
        order.transaction_id = record.transaction_id.filter(|id| !id.is_empty());
        order.captured = record.captured.unwrap_or(false);
        // A captured order never awaits capture.
        order.needs_capture = record.needs_capture.unwrap_or(false) && !order.captured;
        if order.needs_capture || order.captured {
            order.authorized_amount = Some(order.total);
        }
        Ok(order)
    }
}

/// Reads orders from a CSV source.
///
/// Wraps `csv::Reader` and yields one `Result<Order>` per row, trimming whitespace
/// and accepting rows that omit the trailing optional columns.
pub struct OrderReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OrderReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes orders.
    pub fn orders(self) -> impl Iterator<Item = Result<Order>> {
        self.reader
            .into_deserialize::<OrderRecord>()
            .map(|result| result.map_err(GatewayError::from).and_then(Order::try_from))
    }
}
