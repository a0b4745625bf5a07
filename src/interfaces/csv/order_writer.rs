use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct OrderRow<'a> {
    id: OrderId,
    total: Decimal,
    currency: &'a str,
    status: OrderStatus,
    transaction_id: &'a str,
    needs_capture: bool,
    captured: bool,
}

impl<'a> From<&'a Order> for OrderRow<'a> {
    fn from(order: &'a Order) -> Self {
        Self {
            id: order.id,
            total: order.total,
            currency: &order.currency,
            status: order.status,
            transaction_id: order.transaction_id().unwrap_or(""),
            needs_capture: order.needs_capture,
            captured: order.captured,
        }
    }
}

/// Writes order payment state as CSV, in the same column layout the reader accepts.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_orders<'a>(&mut self, orders: impl IntoIterator<Item = &'a Order>) -> Result<()> {
        for order in orders {
            self.writer.serialize(OrderRow::from(order))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
