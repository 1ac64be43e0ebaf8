use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use super::value_objects::{DishOrder, OrderStatus, OrderType};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// Root of the aggregate: the order row plus the dish-order lines it owns.
// Lines are loaded with the order and never written by the save path.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity (None until persisted)
    pub id: Option<i32>,
    pub reference: String,

    // State
    pub created_at: DateTime<Utc>,
    pub order_type: OrderType,
    pub status: OrderStatus,

    // Composition
    pub dish_orders: Vec<DishOrder>,
}

impl Order {
    /// A new, unsaved order with no lines
    pub fn new(reference: impl Into<String>, order_type: OrderType, status: OrderStatus) -> Self {
        Self {
            id: None,
            reference: reference.into(),
            created_at: Utc::now(),
            order_type,
            status,
            dish_orders: Vec::new(),
        }
    }

    pub fn total_amount(&self) -> f64 {
        self.dish_orders.iter().map(DishOrder::line_total).sum()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
