// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (OrderType, OrderStatus, Dish, Ingredient, DishOrder)
// - Aggregate (Order, the root loaded and saved by the repository)
//
// ============================================================================

pub mod value_objects;
pub mod aggregate;

// Re-export for convenience
pub use value_objects::*;
pub use aggregate::*;
