//! Order aggregate persistence for the mini dish domain.
//!
//! Orders are made of dish-order lines, dishes are made of ingredients. The
//! [`repository::OrderRepository`] loads the whole graph from four tables and
//! saves the order row through a guarded upsert: once an order is delivered it
//! can no longer be written.

pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod repository;
pub mod store;

pub use domain::order::{Dish, DishOrder, Ingredient, Order, OrderStatus, OrderType};
pub use error::{DataError, DataResult, ErrorKind, StorageError};
pub use repository::OrderRepository;
