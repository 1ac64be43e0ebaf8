// ============================================================================
// Storage Connector - Row-level access to the relational store
// ============================================================================
//
// A `Storage` hands out sessions. A session is one connection (or one
// transaction) owned by a single repository operation and threaded through
// every read and write of that operation. Dropping a session releases the
// connection and rolls back anything not committed.
//
// Sessions speak in rows, one table at a time. Assembling rows into the order
// aggregate is the repository's job.
//
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// How an order reference is compared against the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceMatch {
    /// SQL `LIKE` semantics: `%` and `_` are wildcards, `\` escapes
    #[default]
    Pattern,
    Exact,
}

/// Whether a read takes a row lock held until the session ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    None,
    ForUpdate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngredientRow {
    pub id: i32,
    pub name: String,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DishRow {
    pub id: i32,
    pub name: String,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DishOrderRow {
    pub id: i32,
    pub id_order: i32,
    pub id_dish: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub id: i32,
    pub reference: String,
    pub creation_datetime: DateTime<Utc>,
    pub order_type: String,
    pub status: String,
}

#[async_trait]
pub trait Storage: Send + Sync {
    type Session: StorageSession;

    /// Plain session: every statement commits on its own
    async fn acquire(&self) -> DataResult<Self::Session>;

    /// Transactional session: nothing is visible to others until `commit`
    async fn begin(&self) -> DataResult<Self::Session>;
}

#[async_trait]
pub trait StorageSession: Send {
    /// Ingredients associated with a dish through `dish_ingredient`
    async fn ingredient_rows_by_dish(&mut self, dish_id: i32) -> DataResult<Vec<IngredientRow>>;

    async fn dish_row(&mut self, dish_id: i32) -> DataResult<Option<DishRow>>;

    async fn dish_order_rows(&mut self, order_id: i32) -> DataResult<Vec<DishOrderRow>>;

    /// First order whose reference matches, lowest id first
    async fn order_row_by_reference(
        &mut self,
        reference: &str,
        lock: RowLock,
    ) -> DataResult<Option<OrderRow>>;

    /// Next value of the sequence backing `table.column`, if there is one
    async fn next_serial_value(&mut self, table: &str, column: &str) -> DataResult<Option<i64>>;

    /// Insert the row, or on id conflict overwrite reference, type and status.
    /// `creation_datetime` of an existing row is never overwritten.
    async fn upsert_order(&mut self, row: &OrderRow) -> DataResult<()>;

    async fn commit(self) -> DataResult<()>;
}
