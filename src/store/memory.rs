//! In-process storage with the same row semantics as the PostgreSQL backend.
//!
//! Tables live behind one mutex. Transactions are serialized: `begin` waits
//! for the storage-wide transaction lock and keeps it until commit or drop.
//! Order rows upserted inside a transaction are logged per session, visible
//! to that session only, and replayed onto the tables on commit; dropping the
//! session discards the log. Sequences are shared and never roll back, as in
//! PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::{
    DishOrderRow, DishRow, IngredientRow, OrderRow, ReferenceMatch, RowLock, Storage,
    StorageSession,
};
use crate::domain::order::{OrderStatus, OrderType};
use crate::error::DataResult;

const SERIAL_TABLES: [&str; 4] = ["order", "dish_order", "dish", "ingredient"];

#[derive(Debug, Clone, Default)]
struct Tables {
    orders: BTreeMap<i32, OrderRow>,
    dish_orders: BTreeMap<i32, DishOrderRow>,
    dishes: BTreeMap<i32, DishRow>,
    ingredients: BTreeMap<i32, IngredientRow>,
    dish_ingredients: Vec<(i32, i32)>,
}

type Sequences = HashMap<(String, String), i64>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn next_value(sequences: &Mutex<Sequences>, table: &str, column: &str) -> Option<i64> {
    if column != "id" || !SERIAL_TABLES.contains(&table) {
        return None;
    }
    let mut sequences = lock(sequences);
    let value = sequences
        .entry((table.to_string(), column.to_string()))
        .or_insert(0);
    *value += 1;
    Some(*value)
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<Mutex<Tables>>,
    sequences: Arc<Mutex<Sequences>>,
    transaction_lock: Arc<AsyncMutex<()>>,
    reference_match: ReferenceMatch,
}

impl MemoryStorage {
    pub fn new(reference_match: ReferenceMatch) -> Self {
        Self {
            reference_match,
            ..Self::default()
        }
    }

    fn next_id(&self, table: &str) -> i32 {
        next_value(&self.sequences, table, "id")
            .and_then(|value| i32::try_from(value).ok())
            .expect("seeded tables have an id sequence within integer range")
    }

    // ------------------------------------------------------------------------
    // Seeding helpers (rows written outside any session)
    // ------------------------------------------------------------------------

    pub fn insert_ingredient(&self, name: &str, unit_price: f64) -> i32 {
        let id = self.next_id("ingredient");
        lock(&self.tables).ingredients.insert(
            id,
            IngredientRow { id, name: name.to_string(), unit_price },
        );
        id
    }

    /// Insert a dish and associate it with existing ingredients
    pub fn insert_dish(&self, name: &str, unit_price: f64, ingredient_ids: &[i32]) -> i32 {
        let id = self.next_id("dish");
        let mut tables = lock(&self.tables);
        tables.dishes.insert(id, DishRow { id, name: name.to_string(), unit_price });
        tables
            .dish_ingredients
            .extend(ingredient_ids.iter().map(|&ingredient_id| (id, ingredient_id)));
        id
    }

    pub fn insert_order(
        &self,
        reference: &str,
        creation_datetime: DateTime<Utc>,
        order_type: OrderType,
        status: OrderStatus,
    ) -> i32 {
        let id = self.next_id("order");
        lock(&self.tables).orders.insert(
            id,
            OrderRow {
                id,
                reference: reference.to_string(),
                creation_datetime,
                order_type: order_type.as_str().to_string(),
                status: status.as_str().to_string(),
            },
        );
        id
    }

    pub fn insert_dish_order(&self, order_id: i32, dish_id: i32, quantity: i32) -> i32 {
        let id = self.next_id("dish_order");
        lock(&self.tables).dish_orders.insert(
            id,
            DishOrderRow { id, id_order: order_id, id_dish: dish_id, quantity },
        );
        id
    }

    /// Raw order row, bypassing reference matching
    pub fn order_row(&self, id: i32) -> Option<OrderRow> {
        lock(&self.tables).orders.get(&id).cloned()
    }

    pub fn order_count(&self) -> usize {
        lock(&self.tables).orders.len()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    type Session = MemorySession;

    async fn acquire(&self) -> DataResult<MemorySession> {
        Ok(MemorySession {
            storage: self.clone(),
            transaction: None,
        })
    }

    async fn begin(&self) -> DataResult<MemorySession> {
        let guard = self.transaction_lock.clone().lock_owned().await;
        Ok(MemorySession {
            storage: self.clone(),
            transaction: Some(Transaction {
                _guard: guard,
                pending_orders: BTreeMap::new(),
            }),
        })
    }
}

/// Open transaction: holds the storage-wide transaction lock until commit or
/// drop, and logs upserted order rows instead of writing them through.
struct Transaction {
    _guard: OwnedMutexGuard<()>,
    pending_orders: BTreeMap<i32, OrderRow>,
}

pub struct MemorySession {
    storage: MemoryStorage,
    transaction: Option<Transaction>,
}

impl MemorySession {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        lock(&self.storage.tables)
    }

    /// Committed order rows overlaid with this session's uncommitted writes
    fn visible_orders(&self) -> BTreeMap<i32, OrderRow> {
        let mut orders = self.tables().orders.clone();
        if let Some(tx) = &self.transaction {
            orders.extend(tx.pending_orders.iter().map(|(id, row)| (*id, row.clone())));
        }
        orders
    }
}

/// Insert the row, or overwrite reference, type and status of the existing one
fn apply_upsert(orders: &mut BTreeMap<i32, OrderRow>, row: &OrderRow) {
    match orders.get_mut(&row.id) {
        Some(existing) => {
            existing.reference = row.reference.clone();
            existing.order_type = row.order_type.clone();
            existing.status = row.status.clone();
        }
        None => {
            orders.insert(row.id, row.clone());
        }
    }
}

#[async_trait]
impl StorageSession for MemorySession {
    async fn ingredient_rows_by_dish(&mut self, dish_id: i32) -> DataResult<Vec<IngredientRow>> {
        let t = self.tables();
        Ok(t.dish_ingredients
            .iter()
            .filter(|(id_dish, _)| *id_dish == dish_id)
            .filter_map(|(_, id_ingredient)| t.ingredients.get(id_ingredient).cloned())
            .collect())
    }

    async fn dish_row(&mut self, dish_id: i32) -> DataResult<Option<DishRow>> {
        Ok(self.tables().dishes.get(&dish_id).cloned())
    }

    async fn dish_order_rows(&mut self, order_id: i32) -> DataResult<Vec<DishOrderRow>> {
        Ok(self
            .tables()
            .dish_orders
            .values()
            .filter(|row| row.id_order == order_id)
            .cloned()
            .collect())
    }

    // Transactions are serialized by the transaction lock, which already
    // gives every row read inside one the protection of FOR UPDATE.
    async fn order_row_by_reference(
        &mut self,
        reference: &str,
        _lock: RowLock,
    ) -> DataResult<Option<OrderRow>> {
        let mode = self.storage.reference_match;
        // BTreeMap iterates in id order, so the first match is the lowest id
        Ok(self.visible_orders().into_values().find(|row| match mode {
            ReferenceMatch::Pattern => like_matches(reference, &row.reference),
            ReferenceMatch::Exact => row.reference == reference,
        }))
    }

    async fn next_serial_value(&mut self, table: &str, column: &str) -> DataResult<Option<i64>> {
        Ok(next_value(&self.storage.sequences, table, column))
    }

    async fn upsert_order(&mut self, row: &OrderRow) -> DataResult<()> {
        match &mut self.transaction {
            Some(tx) => {
                let mut merged = match tx.pending_orders.get(&row.id) {
                    Some(pending) => pending.clone(),
                    None => match lock(&self.storage.tables).orders.get(&row.id) {
                        Some(committed) => committed.clone(),
                        None => row.clone(),
                    },
                };
                merged.reference = row.reference.clone();
                merged.order_type = row.order_type.clone();
                merged.status = row.status.clone();
                tx.pending_orders.insert(row.id, merged);
            }
            None => apply_upsert(&mut lock(&self.storage.tables).orders, row),
        }
        Ok(())
    }

    async fn commit(self) -> DataResult<()> {
        if let Some(tx) = self.transaction {
            let mut tables = lock(&self.storage.tables);
            for row in tx.pending_orders.values() {
                apply_upsert(&mut tables.orders, row);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LikeToken {
    AnySequence,
    AnyChar,
    Literal(char),
}

/// None for a pattern ending in a lone escape, which PostgreSQL rejects
fn tokenize_like(pattern: &str) -> Option<Vec<LikeToken>> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::AnySequence,
            '_' => LikeToken::AnyChar,
            '\\' => LikeToken::Literal(chars.next()?),
            other => LikeToken::Literal(other),
        });
    }
    Some(tokens)
}

/// SQL `LIKE` with the default `\` escape character.
/// A malformed pattern matches nothing.
pub fn like_matches(pattern: &str, value: &str) -> bool {
    let Some(tokens) = tokenize_like(pattern) else {
        return false;
    };
    let value: Vec<char> = value.chars().collect();

    // matched[j]: the tokens consumed so far match value[..j]
    let mut matched = vec![false; value.len() + 1];
    matched[0] = true;

    for token in tokens {
        let mut next = vec![false; value.len() + 1];
        for j in 0..=value.len() {
            next[j] = match token {
                LikeToken::AnySequence => matched[j] || (j > 0 && next[j - 1]),
                LikeToken::AnyChar => j > 0 && matched[j - 1],
                LikeToken::Literal(c) => j > 0 && matched[j - 1] && value[j - 1] == c,
            };
        }
        matched = next;
    }

    matched[value.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_literal_and_wildcards() {
        assert!(like_matches("ORD-001", "ORD-001"));
        assert!(!like_matches("ORD-001", "ORD-0011"));
        assert!(like_matches("ORD-%", "ORD-001"));
        assert!(like_matches("%001", "ORD-001"));
        assert!(like_matches("ORD-00_", "ORD-007"));
        assert!(!like_matches("ORD-00_", "ORD-00"));
        assert!(like_matches("%", ""));
        assert!(!like_matches("", "x"));
    }

    #[test]
    fn test_like_escape() {
        assert!(like_matches("100\\%", "100%"));
        assert!(!like_matches("100\\%", "1000"));
        assert!(like_matches("a\\_b", "a_b"));
        assert!(!like_matches("a\\_b", "acb"));
    }

    #[test]
    fn test_like_trailing_escape_matches_nothing() {
        assert!(!like_matches("ORD\\", "ORD\\"));
        assert!(!like_matches("\\", "\\"));
        assert!(like_matches("ORD\\\\", "ORD\\"));
    }

    #[tokio::test]
    async fn test_sequences_are_per_table() {
        let storage = MemoryStorage::default();
        let mut session = storage.acquire().await.unwrap();

        assert_eq!(session.next_serial_value("order", "id").await.unwrap(), Some(1));
        assert_eq!(session.next_serial_value("order", "id").await.unwrap(), Some(2));
        assert_eq!(session.next_serial_value("dish", "id").await.unwrap(), Some(1));
        assert_eq!(session.next_serial_value("unknown", "id").await.unwrap(), None);
        assert_eq!(session.next_serial_value("order", "reference").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_is_discarded() {
        let storage = MemoryStorage::default();
        let row = OrderRow {
            id: 42,
            reference: "ORD-042".to_string(),
            creation_datetime: Utc::now(),
            order_type: "EAT_IN".to_string(),
            status: "CREATED".to_string(),
        };

        {
            let mut session = storage.begin().await.unwrap();
            session.upsert_order(&row).await.unwrap();
            assert!(session
                .order_row_by_reference("ORD-042", RowLock::ForUpdate)
                .await
                .unwrap()
                .is_some());
        }
        assert!(storage.order_row(42).is_none());

        let mut session = storage.begin().await.unwrap();
        session.upsert_order(&row).await.unwrap();
        session.commit().await.unwrap();
        assert_eq!(storage.order_row(42), Some(row));
    }

    fn order_row(id: i32, reference: &str) -> OrderRow {
        OrderRow {
            id,
            reference: reference.to_string(),
            creation_datetime: Utc::now(),
            order_type: "EAT_IN".to_string(),
            status: "CREATED".to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overlapping_transactions_keep_both_rows() {
        let storage = MemoryStorage::default();

        let mut first = storage.begin().await.unwrap();
        first.upsert_order(&order_row(1, "ORD-1")).await.unwrap();

        // Waits on the transaction lock until `first` commits
        let other = storage.clone();
        let second = tokio::spawn(async move {
            let mut session = other.begin().await.unwrap();
            session.upsert_order(&order_row(2, "ORD-2")).await.unwrap();
            session.commit().await.unwrap();
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(storage.order_row(2).is_none());
        first.commit().await.unwrap();
        second.await.unwrap();

        assert!(storage.order_row(1).is_some());
        assert!(storage.order_row(2).is_some());
    }

    #[tokio::test]
    async fn test_uncommitted_rows_are_private_to_the_session() {
        let storage = MemoryStorage::default();
        let mut tx = storage.begin().await.unwrap();
        tx.upsert_order(&order_row(5, "ORD-5")).await.unwrap();

        let mut reader = storage.acquire().await.unwrap();
        assert!(reader
            .order_row_by_reference("ORD-5", RowLock::None)
            .await
            .unwrap()
            .is_none());

        tx.commit().await.unwrap();
        assert!(reader
            .order_row_by_reference("ORD-5", RowLock::None)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_commit_does_not_clobber_direct_writes() {
        let storage = MemoryStorage::default();
        let mut tx = storage.begin().await.unwrap();
        tx.upsert_order(&order_row(100, "ORD-TX")).await.unwrap();

        let seeded =
            storage.insert_order("ORD-SEED", Utc::now(), OrderType::EatIn, OrderStatus::Created);
        tx.commit().await.unwrap();

        assert!(storage.order_row(seeded).is_some());
        assert_eq!(storage.order_row(100).unwrap().reference, "ORD-TX");
    }

    #[tokio::test]
    async fn test_upsert_keeps_creation_datetime() {
        let storage = MemoryStorage::default();
        let created = Utc::now() - chrono::Duration::days(1);
        let id = storage.insert_order("ORD-1", created, OrderType::EatIn, OrderStatus::Created);

        let mut session = storage.acquire().await.unwrap();
        session
            .upsert_order(&OrderRow {
                id,
                reference: "ORD-1-B".to_string(),
                creation_datetime: Utc::now(),
                order_type: "TAKE_AWAY".to_string(),
                status: "READY".to_string(),
            })
            .await
            .unwrap();

        let stored = storage.order_row(id).unwrap();
        assert_eq!(stored.creation_datetime, created);
        assert_eq!(stored.reference, "ORD-1-B");
        assert_eq!(stored.order_type, "TAKE_AWAY");
        assert_eq!(stored.status, "READY");
    }

    #[tokio::test]
    async fn test_exact_mode_ignores_wildcards() {
        let storage = MemoryStorage::new(ReferenceMatch::Exact);
        storage.insert_order("ORD-1", Utc::now(), OrderType::EatIn, OrderStatus::Created);

        let mut session = storage.acquire().await.unwrap();
        assert!(session
            .order_row_by_reference("ORD-%", RowLock::None)
            .await
            .unwrap()
            .is_none());
        assert!(session
            .order_row_by_reference("ORD-1", RowLock::None)
            .await
            .unwrap()
            .is_some());
    }
}
