//! PostgreSQL implementation of the item store.

use std::time::Duration;

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::adjustment_error;
use super::models::ItemRow;
use crate::config::AppConfig;
use crate::domain::{Item, ItemChanges, ItemId};
use crate::error::InventoryError;

/// PostgreSQL-backed item store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresItemStore {
    pool: PgPool,
}

fn persistence(err: sqlx::Error) -> InventoryError {
    InventoryError::PersistenceError(err.to_string())
}

/// Maps a write failure, turning a unique violation on `sku` into a
/// conflict.
fn write_error(err: sqlx::Error, sku: &str) -> InventoryError {
    if let sqlx::Error::Database(db) = &err
        && db.is_unique_violation()
    {
        return InventoryError::SkuAlreadyExists(sku.to_string());
    }
    persistence(err)
}

impl PostgresItemStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`sqlx::Error`] if the database is unreachable.
    pub async fn connect(config: &AppConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies pending migrations from `migrations/`.
    ///
    /// # Errors
    ///
    /// Returns a [`sqlx::migrate::MigrateError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Inserts a new item.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::SkuAlreadyExists`] on a duplicate SKU, or a
    /// [`InventoryError::PersistenceError`] on database failure.
    pub async fn create(&self, item: &Item) -> Result<Item, InventoryError> {
        sqlx::query_as::<_, ItemRow>(
            "INSERT INTO items (id, sku, name, description, quantity, price, low_stock_threshold, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id, sku, name, description, quantity, price, low_stock_threshold, created_at, updated_at",
        )
        .bind(*item.id.as_uuid())
        .bind(&item.sku)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.low_stock_threshold)
        .bind(item.created_at)
        .bind(item.updated_at)
        .fetch_one(&self.pool)
        .await
        .map(Item::from)
        .map_err(|e| write_error(e, &item.sku))
    }

    /// Loads an item by id.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::ItemNotFound`] if no row matches.
    pub async fn get(&self, id: ItemId) -> Result<Item, InventoryError> {
        sqlx::query_as::<_, ItemRow>(
            "SELECT id, sku, name, description, quantity, price, low_stock_threshold, created_at, updated_at \
             FROM items WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?
        .map(Item::from)
        .ok_or(InventoryError::ItemNotFound(id))
    }

    /// Loads one page of items, newest first, plus the total item count.
    ///
    /// # Errors
    ///
    /// Returns a [`InventoryError::PersistenceError`] on database failure.
    pub async fn list(&self, page: u32, limit: u32) -> Result<(Vec<Item>, u64), InventoryError> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, sku, name, description, quantity, price, low_stock_threshold, created_at, updated_at \
             FROM items ORDER BY created_at DESC, sku ASC LIMIT $1 OFFSET $2",
        )
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await
            .map_err(persistence)?;

        Ok((
            rows.into_iter().map(Item::from).collect(),
            u64::try_from(total).unwrap_or(0),
        ))
    }

    /// Writes the set fields of `changes` and returns the stored item.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::ItemNotFound`] if the item is gone, or
    /// [`InventoryError::SkuAlreadyExists`] if the new SKU is taken.
    pub async fn update(&self, id: ItemId, changes: &ItemChanges) -> Result<Item, InventoryError> {
        if changes.is_empty() {
            return self.get(id).await;
        }

        let mut query = QueryBuilder::<Postgres>::new("UPDATE items SET ");
        let mut set = query.separated(", ");
        if let Some(sku) = &changes.sku {
            set.push("sku = ").push_bind_unseparated(sku.clone());
        }
        if let Some(name) = &changes.name {
            set.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(description) = &changes.description {
            set.push("description = ")
                .push_bind_unseparated(description.clone());
        }
        if let Some(quantity) = changes.quantity {
            set.push("quantity = ").push_bind_unseparated(quantity);
        }
        if let Some(price) = changes.price {
            set.push("price = ").push_bind_unseparated(price);
        }
        if let Some(threshold) = changes.low_stock_threshold {
            set.push("low_stock_threshold = ")
                .push_bind_unseparated(threshold);
        }
        set.push("updated_at = ").push_bind_unseparated(Utc::now());

        query.push(" WHERE id = ").push_bind(*id.as_uuid());
        query.push(
            " RETURNING id, sku, name, description, quantity, price, low_stock_threshold, created_at, updated_at",
        );

        let sku = changes.sku.as_deref().unwrap_or_default();
        query
            .build_query_as::<ItemRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, sku))?
            .map(Item::from)
            .ok_or(InventoryError::ItemNotFound(id))
    }

    /// Adds `delta` to the quantity in one conditional statement, so
    /// concurrent adjustments can never drive it below zero.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::ItemNotFound`] or
    /// [`InventoryError::InsufficientStock`].
    pub async fn adjust_quantity(&self, id: ItemId, delta: i32) -> Result<Item, InventoryError> {
        let updated = sqlx::query_as::<_, ItemRow>(
            "UPDATE items SET quantity = quantity + $1, updated_at = NOW() \
             WHERE id = $2 AND quantity::BIGINT + $1 BETWEEN 0 AND 2147483647 \
             RETURNING id, sku, name, description, quantity, price, low_stock_threshold, created_at, updated_at",
        )
        .bind(i64::from(delta))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;

        match updated {
            Some(row) => Ok(Item::from(row)),
            None => Err(adjustment_error(&self.get(id).await?, delta)),
        }
    }

    /// Deletes an item.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::ItemNotFound`] if no row was deleted.
    pub async fn delete(&self, id: ItemId) -> Result<(), InventoryError> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(persistence)?;

        if result.rows_affected() == 0 {
            return Err(InventoryError::ItemNotFound(id));
        }
        Ok(())
    }

    /// Sums `quantity * price` over all items.
    ///
    /// # Errors
    ///
    /// Returns a [`InventoryError::PersistenceError`] on database failure.
    pub async fn total_stock_value(&self) -> Result<f64, InventoryError> {
        sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(SUM(quantity * price), 0)::DOUBLE PRECISION FROM items",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(persistence)
    }

    /// Items at or below their own threshold, or `global_threshold` when
    /// they have none. Lowest quantity first.
    ///
    /// # Errors
    ///
    /// Returns a [`InventoryError::PersistenceError`] on database failure.
    pub async fn low_stock(&self, global_threshold: i32) -> Result<Vec<Item>, InventoryError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, sku, name, description, quantity, price, low_stock_threshold, created_at, updated_at \
             FROM items WHERE quantity <= COALESCE(low_stock_threshold, $1) \
             ORDER BY quantity ASC, name ASC",
        )
        .bind(global_threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// The `limit` items with the highest stock value.
    ///
    /// # Errors
    ///
    /// Returns a [`InventoryError::PersistenceError`] on database failure.
    pub async fn most_valuable(&self, limit: u32) -> Result<Vec<Item>, InventoryError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, sku, name, description, quantity, price, low_stock_threshold, created_at, updated_at \
             FROM items ORDER BY (quantity * price) DESC, name ASC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        Ok(rows.into_iter().map(Item::from).collect())
    }
}
