//! PostgreSQL storage backed by a `sqlx::PgPool`.
//!
//! All SQL is runtime-checked (`sqlx::query_as`, not `sqlx::query_as!`) so the
//! crate builds without a live database. Numeric prices are read as `float8`
//! and `creation_datetime` holds UTC wall-clock time in a `timestamp` column.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures_util::TryStreamExt;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use super::{
    DishOrderRow, DishRow, IngredientRow, OrderRow, ReferenceMatch, RowLock, Storage,
    StorageSession,
};
use crate::error::DataResult;

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
    reference_match: ReferenceMatch,
}

impl PgStorage {
    pub fn new(pool: PgPool, reference_match: ReferenceMatch) -> Self {
        Self { pool, reference_match }
    }
}

#[async_trait]
impl Storage for PgStorage {
    type Session = PgSession;

    async fn acquire(&self) -> DataResult<PgSession> {
        let conn = self.pool.acquire().await?;
        Ok(PgSession {
            inner: SessionInner::Pooled(conn),
            reference_match: self.reference_match,
        })
    }

    async fn begin(&self) -> DataResult<PgSession> {
        let tx = self.pool.begin().await?;
        Ok(PgSession {
            inner: SessionInner::Tx(tx),
            reference_match: self.reference_match,
        })
    }
}

enum SessionInner {
    Pooled(PoolConnection<Postgres>),
    Tx(Transaction<'static, Postgres>),
}

/// One pooled connection or one open transaction.
/// Dropping it returns the connection to the pool; an open transaction rolls back.
pub struct PgSession {
    inner: SessionInner,
    reference_match: ReferenceMatch,
}

impl PgSession {
    fn conn(&mut self) -> &mut PgConnection {
        match &mut self.inner {
            SessionInner::Pooled(conn) => &mut **conn,
            SessionInner::Tx(tx) => &mut **tx,
        }
    }
}

fn order_by_reference_sql(reference_match: ReferenceMatch, lock: RowLock) -> String {
    let predicate = match reference_match {
        ReferenceMatch::Pattern => "reference LIKE $1",
        ReferenceMatch::Exact => "reference = $1",
    };
    let lock_clause = match lock {
        RowLock::None => "",
        RowLock::ForUpdate => " FOR UPDATE",
    };
    format!(
        r#"SELECT id, reference, creation_datetime, type, status
           FROM "order"
           WHERE {predicate}
           ORDER BY id
           LIMIT 1{lock_clause}"#
    )
}

#[async_trait]
impl StorageSession for PgSession {
    async fn ingredient_rows_by_dish(&mut self, dish_id: i32) -> DataResult<Vec<IngredientRow>> {
        let rows = sqlx::query_as::<_, (i32, String, f64)>(
            r#"
            SELECT i.id, i.name, i.unit_price::float8
            FROM ingredient i
            JOIN dish_ingredient di ON di.id_ingredient = i.id
            WHERE di.id_dish = $1
            "#,
        )
        .bind(dish_id)
        .fetch(self.conn())
        .map_ok(|(id, name, unit_price)| IngredientRow { id, name, unit_price })
        .try_collect()
        .await?;

        Ok(rows)
    }

    async fn dish_row(&mut self, dish_id: i32) -> DataResult<Option<DishRow>> {
        let row = sqlx::query_as::<_, (i32, String, f64)>(
            "SELECT id, name, unit_price::float8 FROM dish WHERE id = $1",
        )
        .bind(dish_id)
        .fetch_optional(self.conn())
        .await?;

        Ok(row.map(|(id, name, unit_price)| DishRow { id, name, unit_price }))
    }

    async fn dish_order_rows(&mut self, order_id: i32) -> DataResult<Vec<DishOrderRow>> {
        let rows = sqlx::query_as::<_, (i32, i32, i32, i32)>(
            "SELECT id, id_order, id_dish, quantity FROM dish_order WHERE id_order = $1",
        )
        .bind(order_id)
        .fetch(self.conn())
        .map_ok(|(id, id_order, id_dish, quantity)| DishOrderRow {
            id,
            id_order,
            id_dish,
            quantity,
        })
        .try_collect()
        .await?;

        Ok(rows)
    }

    async fn order_row_by_reference(
        &mut self,
        reference: &str,
        lock: RowLock,
    ) -> DataResult<Option<OrderRow>> {
        let sql = order_by_reference_sql(self.reference_match, lock);

        let row = sqlx::query_as::<_, (i32, String, NaiveDateTime, String, String)>(&sql)
            .bind(reference)
            .fetch_optional(self.conn())
            .await?;

        Ok(row.map(|(id, reference, created, order_type, status)| OrderRow {
            id,
            reference,
            creation_datetime: DateTime::<Utc>::from_naive_utc_and_offset(created, Utc),
            order_type,
            status,
        }))
    }

    async fn next_serial_value(&mut self, table: &str, column: &str) -> DataResult<Option<i64>> {
        let value = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT nextval(pg_get_serial_sequence($1, $2))",
        )
        .bind(table)
        .bind(column)
        .fetch_optional(self.conn())
        .await?;

        Ok(value.flatten())
    }

    async fn upsert_order(&mut self, row: &OrderRow) -> DataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO "order" (id, reference, creation_datetime, type, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET reference = EXCLUDED.reference,
                type = EXCLUDED.type,
                status = EXCLUDED.status
            "#,
        )
        .bind(row.id)
        .bind(&row.reference)
        .bind(row.creation_datetime.naive_utc())
        .bind(&row.order_type)
        .bind(&row.status)
        .execute(self.conn())
        .await?;

        Ok(())
    }

    async fn commit(self) -> DataResult<()> {
        match self.inner {
            SessionInner::Tx(tx) => tx.commit().await?,
            SessionInner::Pooled(_) => {}
        }
        Ok(())
    }
}
