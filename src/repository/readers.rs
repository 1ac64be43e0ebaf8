use crate::domain::order::{Dish, DishOrder, Ingredient};
use crate::error::{DataError, DataResult};
use crate::store::StorageSession;

// ============================================================================
// Entity Readers
// ============================================================================
//
// Build dish-order lines, dishes and ingredients from rows, on the session the
// caller owns. Loading is nested and serial: one dish query per line, one
// ingredient query per dish.
//
// ============================================================================

/// Ingredients of a dish, in the order the store returns them.
/// A dish without ingredients yields an empty list, not an error.
pub async fn find_ingredients_by_dish<S: StorageSession>(
    session: &mut S,
    dish_id: i32,
) -> DataResult<Vec<Ingredient>> {
    let rows = session.ingredient_rows_by_dish(dish_id).await?;

    Ok(rows
        .into_iter()
        .map(|row| Ingredient {
            id: row.id,
            name: row.name,
            unit_price: row.unit_price,
        })
        .collect())
}

/// A dish together with its full ingredient list
pub async fn find_dish_by_id<S: StorageSession>(session: &mut S, dish_id: i32) -> DataResult<Dish> {
    let row = session
        .dish_row(dish_id)
        .await?
        .ok_or_else(|| DataError::not_found("Dish", dish_id))?;

    let ingredients = find_ingredients_by_dish(session, dish_id).await?;

    tracing::debug!(
        dish_id = dish_id,
        ingredient_count = ingredients.len(),
        "Loaded dish"
    );

    Ok(Dish {
        id: row.id,
        name: row.name,
        unit_price: row.unit_price,
        ingredients,
    })
}

/// Dish-order lines of an order, each with its dish resolved
pub async fn find_dish_orders_by_order<S: StorageSession>(
    session: &mut S,
    order_id: i32,
) -> DataResult<Vec<DishOrder>> {
    let rows = session.dish_order_rows(order_id).await?;

    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        let dish = find_dish_by_id(session, row.id_dish).await?;
        lines.push(DishOrder {
            id: row.id,
            quantity: row.quantity,
            dish,
        });
    }

    Ok(lines)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderStatus, OrderType};
    use crate::error::ErrorKind;
    use crate::store::{MemoryStorage, Storage};
    use chrono::Utc;

    #[tokio::test]
    async fn test_dish_without_ingredients_has_empty_list() {
        let storage = MemoryStorage::default();
        let dish_id = storage.insert_dish("Water", 1.0, &[]);

        let mut session = storage.acquire().await.unwrap();
        assert!(find_ingredients_by_dish(&mut session, dish_id).await.unwrap().is_empty());

        let dish = find_dish_by_id(&mut session, dish_id).await.unwrap();
        assert_eq!(dish.name, "Water");
        assert!(dish.ingredients.is_empty());
    }

    #[tokio::test]
    async fn test_missing_dish_is_not_found() {
        let storage = MemoryStorage::default();
        let mut session = storage.acquire().await.unwrap();

        let err = find_dish_by_id(&mut session, -1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Dish not found: -1");
    }

    #[tokio::test]
    async fn test_dish_carries_its_ingredients_only() {
        let storage = MemoryStorage::default();
        let flour = storage.insert_ingredient("Flour", 1.0);
        let egg = storage.insert_ingredient("Egg", 0.5);
        let tomato = storage.insert_ingredient("Tomato", 0.8);
        let pasta = storage.insert_dish("Pasta", 9.5, &[flour, egg]);
        storage.insert_dish("Salad", 6.0, &[tomato]);

        let mut session = storage.acquire().await.unwrap();
        let dish = find_dish_by_id(&mut session, pasta).await.unwrap();

        let mut names: Vec<_> = dish.ingredients.iter().map(|i| i.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Egg", "Flour"]);
    }

    #[tokio::test]
    async fn test_lines_resolve_their_dishes() {
        let storage = MemoryStorage::default();
        let cheese = storage.insert_ingredient("Cheese", 2.0);
        let pizza = storage.insert_dish("Pizza", 12.0, &[cheese]);
        let soup = storage.insert_dish("Soup", 5.0, &[]);
        let order_id =
            storage.insert_order("ORD-1", Utc::now(), OrderType::EatIn, OrderStatus::Created);
        let other_id =
            storage.insert_order("ORD-2", Utc::now(), OrderType::EatIn, OrderStatus::Created);
        storage.insert_dish_order(order_id, pizza, 1);
        storage.insert_dish_order(order_id, soup, 3);
        storage.insert_dish_order(other_id, soup, 1);

        let mut session = storage.acquire().await.unwrap();
        let lines = find_dish_orders_by_order(&mut session, order_id).await.unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].dish.name, "Pizza");
        assert_eq!(lines[0].dish.ingredients.len(), 1);
        assert_eq!(lines[1].dish.name, "Soup");
        assert_eq!(lines[1].quantity, 3);
    }

    #[tokio::test]
    async fn test_line_with_dangling_dish_fails_whole_load() {
        let storage = MemoryStorage::default();
        let order_id =
            storage.insert_order("ORD-1", Utc::now(), OrderType::EatIn, OrderStatus::Created);
        storage.insert_dish_order(order_id, 999, 1);

        let mut session = storage.acquire().await.unwrap();
        let err = find_dish_orders_by_order(&mut session, order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
