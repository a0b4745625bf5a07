use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::ports::OrderStore;
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredOrder {
    order: Order,
    notes: Vec<String>,
    refunded: Decimal,
}

/// A thread-safe in-memory order store.
///
/// Keeps each order together with its notes and the host's refund total.
/// Used by the CLI and by tests; writers are serialised by the `RwLock`.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, StoredOrder>>>,
}

impl InMemoryOrderStore {
    /// Creates a new, empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an order, discarding any existing notes.
    pub async fn insert(&self, order: Order) {
        let mut orders = self.orders.write().await;
        orders.insert(
            order.id,
            StoredOrder {
                order,
                notes: Vec::new(),
                refunded: Decimal::ZERO,
            },
        );
    }

    pub async fn notes(&self, id: OrderId) -> Vec<String> {
        let orders = self.orders.read().await;
        orders.get(&id).map(|o| o.notes.clone()).unwrap_or_default()
    }

    pub async fn all_orders(&self) -> Vec<Order> {
        let orders = self.orders.read().await;
        let mut all: Vec<Order> = orders.values().map(|o| o.order.clone()).collect();
        all.sort_by_key(|o| o.id);
        all
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn load(&self, id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id).map(|o| o.order.clone()))
    }

    async fn save(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders
            .entry(order.id)
            .and_modify(|stored| stored.order = order.clone())
            .or_insert_with(|| StoredOrder {
                order: order.clone(),
                notes: Vec::new(),
                refunded: Decimal::ZERO,
            });
        Ok(())
    }

    async fn mark_paid(&self, order: &mut Order, transaction_id: &str) -> Result<()> {
        order.transaction_id = Some(transaction_id.to_string());
        if !order.status.is_paid() {
            order.status = OrderStatus::Processing;
        }
        self.save(order).await
    }

    async fn add_note(&self, order: &Order, note: &str) -> Result<()> {
        let mut orders = self.orders.write().await;
        if let Some(stored) = orders.get_mut(&order.id) {
            stored.notes.push(note.to_string());
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        order: &mut Order,
        status: OrderStatus,
        note: &str,
    ) -> Result<()> {
        order.status = status;
        let mut orders = self.orders.write().await;
        let stored = orders.entry(order.id).or_insert_with(|| StoredOrder {
            order: order.clone(),
            notes: Vec::new(),
            refunded: Decimal::ZERO,
        });
        stored.order = order.clone();
        stored.notes.push(note.to_string());
        Ok(())
    }

    async fn total_already_refunded(&self, order: &Order) -> Result<Decimal> {
        let orders = self.orders.read().await;
        Ok(orders
            .get(&order.id)
            .map(|o| o.refunded)
            .unwrap_or(Decimal::ZERO))
    }

    async fn record_refund(&self, order: &Order, amount: Decimal) -> Result<()> {
        let mut orders = self.orders.write().await;
        let stored = orders.entry(order.id).or_insert_with(|| StoredOrder {
            order: order.clone(),
            notes: Vec::new(),
            refunded: Decimal::ZERO,
        });
        stored.refunded += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_in_memory_order_store() {
        let store = InMemoryOrderStore::new();
        let order = Order::new(1, dec!(100.0), "AUD");

        store.insert(order.clone()).await;
        let retrieved = store.load(1).await.unwrap().unwrap();
        assert_eq!(retrieved, order);

        assert!(store.load(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_keeps_notes() {
        let store = InMemoryOrderStore::new();
        let mut order = Order::new(1, dec!(10.0), "AUD");
        store.insert(order.clone()).await;
        store.add_note(&order, "first").await.unwrap();

        order.hosted_checkout_id = Some("hc_1".into());
        store.save(&order).await.unwrap();

        assert_eq!(store.notes(1).await, vec!["first".to_string()]);
        let loaded = store.load(1).await.unwrap().unwrap();
        assert_eq!(loaded.hosted_checkout_id.as_deref(), Some("hc_1"));
    }

    #[tokio::test]
    async fn test_mark_paid_and_transition() {
        let store = InMemoryOrderStore::new();
        let mut order = Order::new(5, dec!(20.0), "AUD");
        store.insert(order.clone()).await;

        store
            .transition_status(&mut order, OrderStatus::OnHold, "held")
            .await
            .unwrap();
        assert_eq!(store.load(5).await.unwrap().unwrap().status, OrderStatus::OnHold);

        store.mark_paid(&mut order, "pay_5").await.unwrap();
        let loaded = store.load(5).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Processing);
        assert_eq!(loaded.transaction_id.as_deref(), Some("pay_5"));
        assert_eq!(store.notes(5).await, vec!["held".to_string()]);
    }

    #[tokio::test]
    async fn test_refund_bookkeeping() {
        let store = InMemoryOrderStore::new();
        let order = Order::new(9, dec!(100.0), "AUD");
        store.insert(order.clone()).await;

        assert_eq!(store.total_already_refunded(&order).await.unwrap(), dec!(0));
        store.record_refund(&order, dec!(25.50)).await.unwrap();
        store.record_refund(&order, dec!(4.50)).await.unwrap();
        assert_eq!(store.total_already_refunded(&order).await.unwrap(), dec!(30.00));
    }
}
