use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DataError, DataResult, StorageError};

// ============================================================================
// Order Value Objects
// ============================================================================
//
// Dish and Ingredient are read-only snapshots copied into the order aggregate
// at load time. Enum variants are stored as their upper-case names.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    EatIn,
    TakeAway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Ready,
    Delivered,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::EatIn => "EAT_IN",
            OrderType::TakeAway => "TAKE_AWAY",
        }
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Ready => "READY",
            OrderStatus::Delivered => "DELIVERED",
        }
    }

    /// No field of an order may be written once it reaches a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }

    /// Fails with `InvalidState` when an order in this status may no longer be written
    pub fn ensure_modifiable(&self) -> DataResult<()> {
        if self.is_terminal() {
            return Err(DataError::InvalidState(
                "A delivered order cannot be modified".to_string(),
            ));
        }
        Ok(())
    }
}

impl FromStr for OrderType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EAT_IN" => Ok(OrderType::EatIn),
            "TAKE_AWAY" => Ok(OrderType::TakeAway),
            other => Err(StorageError::Decode(format!("unknown order type '{}'", other))),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(OrderStatus::Created),
            "READY" => Ok(OrderStatus::Ready),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            other => Err(StorageError::Decode(format!("unknown order status '{}'", other))),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i32,
    pub name: String,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub id: i32,
    pub name: String,
    pub unit_price: f64,
    pub ingredients: Vec<Ingredient>,
}

impl Dish {
    /// Sum of the unit prices of every ingredient in the dish
    pub fn ingredient_cost(&self) -> f64 {
        self.ingredients.iter().map(|i| i.unit_price).sum()
    }
}

/// One line of an order: a quantity of a single dish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DishOrder {
    pub id: i32,
    pub quantity: i32,
    pub dish: Dish,
}

impl DishOrder {
    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.dish.unit_price
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
