// ============================================================================
// Repository Layer - Order aggregate persistence
// ============================================================================
//
// - readers:           ingredients, dishes and dish-order lines from rows
// - serial:            next identifier for a new root entity
// - order_repository:  lookup by reference and guarded upsert
//
// ============================================================================

pub mod readers;
pub mod serial;
pub mod order_repository;

pub use readers::{find_dish_by_id, find_dish_orders_by_order, find_ingredients_by_dish};
pub use serial::next_serial_value;
pub use order_repository::OrderRepository;
