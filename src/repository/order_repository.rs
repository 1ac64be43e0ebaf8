use std::sync::Arc;
use std::time::Instant;

use crate::domain::order::{Dish, Order, OrderStatus, OrderType};
use crate::error::{DataError, DataResult, ErrorKind};
use crate::metrics::Metrics;
use crate::store::{OrderRow, RowLock, Storage, StorageSession};

use super::readers::{find_dish_by_id, find_dish_orders_by_order};
use super::serial::next_serial_value;

const ORDER_TABLE: &str = "order";
const ORDER_ID_COLUMN: &str = "id";

// ============================================================================
// Order Repository
// ============================================================================
//
// Orchestrates: Session → Order row → Dish-order lines → Dishes → Ingredients
//
// Each public operation owns exactly one session and passes it down to every
// reader. Saves run in a transaction so the delivered-order guard and the
// upsert see the same locked row.
//
// ============================================================================

pub struct OrderRepository<S: Storage> {
    storage: S,
    metrics: Arc<Metrics>,
}

impl<S: Storage> OrderRepository<S> {
    pub fn new(storage: S, metrics: Arc<Metrics>) -> Self {
        Self { storage, metrics }
    }

    /// Load the full aggregate of the first order matching `reference`
    pub async fn find_order_by_reference(&self, reference: &str) -> DataResult<Order> {
        let started = Instant::now();

        let result = async {
            let mut session = self.storage.acquire().await?;
            load_order(&mut session, reference, RowLock::None).await
        }
        .await;

        self.record("find_order_by_reference", started, &result);
        result
    }

    pub async fn find_dish_by_id(&self, dish_id: i32) -> DataResult<Dish> {
        let started = Instant::now();

        let result = async {
            let mut session = self.storage.acquire().await?;
            find_dish_by_id(&mut session, dish_id).await
        }
        .await;

        self.record("find_dish_by_id", started, &result);
        result
    }

    /// Insert or update the order row, then return the reloaded aggregate.
    ///
    /// Only the order row is written; dish-order lines are left untouched.
    /// Both the delivered check and the final reload look the order up by
    /// `order.reference`, not by id. If a save changes the reference of an
    /// existing order, the check runs against whatever row the new reference
    /// resolves to.
    pub async fn save_order(&self, order: &Order) -> DataResult<Order> {
        let started = Instant::now();
        let result = self.save_order_in_transaction(order).await;
        self.record("save_order", started, &result);
        result
    }

    async fn save_order_in_transaction(&self, order: &Order) -> DataResult<Order> {
        let mut session = self.storage.begin().await?;

        let id = match order.id {
            Some(id) => {
                let existing = session
                    .order_row_by_reference(&order.reference, RowLock::ForUpdate)
                    .await?
                    .ok_or_else(|| DataError::not_found("Order", &order.reference))?;

                let status: OrderStatus = existing.status.parse()?;
                if let Err(err) = status.ensure_modifiable() {
                    self.metrics.record_guard_rejection();
                    tracing::warn!(
                        order_id = existing.id,
                        reference = %order.reference,
                        status = %status,
                        "Refusing to modify order"
                    );
                    return Err(err);
                }
                id
            }
            None => {
                let id = next_serial_value(&mut session, ORDER_TABLE, ORDER_ID_COLUMN).await?;
                self.metrics.record_serial_allocation();
                id
            }
        };

        session
            .upsert_order(&OrderRow {
                id,
                reference: order.reference.clone(),
                creation_datetime: order.created_at,
                order_type: order.order_type.as_str().to_string(),
                status: order.status.as_str().to_string(),
            })
            .await?;

        let saved = load_order(&mut session, &order.reference, RowLock::None).await?;
        session.commit().await?;

        tracing::info!(
            order_id = id,
            reference = %order.reference,
            status = %order.status,
            created = order.id.is_none(),
            "✅ Saved order"
        );

        Ok(saved)
    }

    fn record<T>(&self, operation: &str, started: Instant, result: &DataResult<T>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(err) => match err.kind() {
                ErrorKind::NotFound => "not_found",
                ErrorKind::InvalidState => "invalid_state",
                ErrorKind::Storage => "storage",
            },
        };
        self.metrics
            .record_operation(operation, outcome, started.elapsed().as_secs_f64());
    }
}

/// Order row plus its lines, on a session the caller owns
async fn load_order<T: StorageSession>(
    session: &mut T,
    reference: &str,
    lock: RowLock,
) -> DataResult<Order> {
    let row = session
        .order_row_by_reference(reference, lock)
        .await?
        .ok_or_else(|| DataError::not_found("Order", reference))?;

    let order_type: OrderType = row.order_type.parse()?;
    let status: OrderStatus = row.status.parse()?;
    let dish_orders = find_dish_orders_by_order(session, row.id).await?;

    tracing::debug!(
        order_id = row.id,
        reference = %row.reference,
        line_count = dish_orders.len(),
        "Loaded order"
    );

    Ok(Order {
        id: Some(row.id),
        reference: row.reference,
        created_at: row.creation_datetime,
        order_type,
        status,
        dish_orders,
    })
}

// ============================================================================
// Unit Tests
// ============================================================================
