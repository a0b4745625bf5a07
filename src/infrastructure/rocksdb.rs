use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::ports::OrderStore;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for order records.
pub const CF_ORDERS: &str = "orders";
/// Column Family for the notes attached to each order.
pub const CF_NOTES: &str = "notes";
/// Column Family for the host's refunded total per order.
pub const CF_REFUNDS: &str = "refunds";

/// A persistent order store backed by RocksDB.
///
/// Orders, notes and refund totals live in separate Column Families keyed by the
/// big-endian order id, each value encoded as JSON. Note appends are read-modify-write,
/// so writers go through a single async lock.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBOrderStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBOrderStore {
    /// Opens or creates a RocksDB instance at the specified path, creating the
    /// order, note and refund column families when missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_ORDERS, CF_NOTES, CF_REFUNDS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| GatewayError::Storage(format!("{name} column family not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, family: &str, id: OrderId) -> Result<Option<T>> {
        let cf = self.cf(family)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| GatewayError::Storage(format!("Deserialization error: {e}"))),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, batch: &mut WriteBatch, family: &str, id: OrderId, value: &T) -> Result<()> {
        let cf = self.cf(family)?;
        let bytes = serde_json::to_vec(value)
            .map_err(|e| GatewayError::Storage(format!("Serialization error: {e}")))?;
        batch.put_cf(cf, id.to_be_bytes(), bytes);
        Ok(())
    }

    fn with_note(&self, batch: &mut WriteBatch, id: OrderId, note: &str) -> Result<()> {
        let mut notes: Vec<String> = self.get_json(CF_NOTES, id)?.unwrap_or_default();
        notes.push(note.to_string());
        self.put_json(batch, CF_NOTES, id, &notes)
    }

    pub async fn notes(&self, id: OrderId) -> Result<Vec<String>> {
        Ok(self.get_json(CF_NOTES, id)?.unwrap_or_default())
    }

    pub async fn all_orders(&self) -> Result<Vec<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        let mut orders = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let order: Order = serde_json::from_slice(&value)
                .map_err(|e| GatewayError::Storage(format!("Failed to deserialize order: {e}")))?;
            orders.push(order);
        }
        Ok(orders)
    }
}

#[async_trait]
impl OrderStore for RocksDBOrderStore {
    async fn load(&self, id: OrderId) -> Result<Option<Order>> {
        self.get_json(CF_ORDERS, id)
    }

    async fn save(&self, order: &Order) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_ORDERS, order.id, order)?;
        self.db.write(batch)?;
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
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        self.with_note(&mut batch, order.id, note)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn transition_status(&self, order: &mut Order, status: OrderStatus, note: &str) -> Result<()> {
        order.status = status;
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_ORDERS, order.id, order)?;
        self.with_note(&mut batch, order.id, note)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn total_already_refunded(&self, order: &Order) -> Result<Decimal> {
        Ok(self.get_json(CF_REFUNDS, order.id)?.unwrap_or(Decimal::ZERO))
    }

    async fn record_refund(&self, order: &Order, amount: Decimal) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let current: Decimal = self.get_json(CF_REFUNDS, order.id)?.unwrap_or(Decimal::ZERO);
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_REFUNDS, order.id, &(current + amount))?;
        self.db.write(batch)?;
        Ok(())
    }
}
