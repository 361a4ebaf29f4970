//! The storage collaborator: one connection, CRUD over the products table.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::database_ops::schema::{self, ConvergenceReport};
use crate::error::StoreResult;
use crate::normalization::price::RawPrice;
use crate::util::env;

/// A product row as stored. `price` stays raw; the price normalizer is the
/// single place that interprets it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub id: i64,
    pub name: String,
    pub price: RawPrice,
    pub description: Option<String>,
    pub img_path: Option<String>,
    pub category: Option<String>,
}

/// Fields accepted by insert and update: the record minus its identifier.
#[derive(Debug, Clone, Default)]
pub struct ProductData {
    pub name: String,
    pub price: RawPrice,
    pub description: Option<String>,
    pub img_path: Option<String>,
    pub category: Option<String>,
}

/// One storage connection. Opening runs schema convergence, so every consumer
/// sees the target shape no matter which historical generation wrote the
/// database file. No pooling: each request opens, works and drops.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open at the conventional location (`DATABASE_PATH` or data/database.db).
    pub fn open_default() -> StoreResult<Self> {
        Self::open(env::database_path())
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        let busy_ms: u64 = env::env_parse("SQLITE_BUSY_TIMEOUT_MS", 3_000);
        conn.busy_timeout(Duration::from_millis(busy_ms))?;

        let report = schema::converge(&mut conn)?;
        debug!(?report, "store opened");
        Ok(Self { conn })
    }

    /// Re-run convergence on the live connection. Safe to call repeatedly;
    /// a converged table reports zero writes.
    pub fn converge(&mut self) -> StoreResult<ConvergenceReport> {
        schema::converge(&mut self.conn)
    }

    /// All products ordered by identifier.
    pub fn list_products(&self) -> StoreResult<Vec<ProductRecord>> {
        let sql = format!(
            "SELECT id, name, price, description, {} AS img_path, category
             FROM products ORDER BY id",
            schema::image_select_expr(&self.conn)?
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    /// A single product, or `None` when the identifier is unknown.
    pub fn get_product(&self, id: i64) -> StoreResult<Option<ProductRecord>> {
        let sql = format!(
            "SELECT id, name, price, description, {} AS img_path, category
             FROM products WHERE id = ?1",
            schema::image_select_expr(&self.conn)?
        );
        Ok(self
            .conn
            .query_row(&sql, [id], row_to_record)
            .optional()?)
    }

    /// Insert a new product and return its identifier. Writes target the
    /// canonical image column only; legacy columns are read-side concerns.
    pub fn insert_product(&self, data: &ProductData) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO products (name, price, description, img_path, category)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                data.name,
                data.price,
                data.description,
                data.img_path,
                data.category
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Update an existing product. `false` when the identifier is unknown.
    pub fn update_product(&self, id: i64, data: &ProductData) -> StoreResult<bool> {
        let updated = self.conn.execute(
            "UPDATE products
             SET name = ?1, price = ?2, description = ?3, img_path = ?4, category = ?5
             WHERE id = ?6",
            params![
                data.name,
                data.price,
                data.description,
                data.img_path,
                data.category,
                id
            ],
        )?;
        Ok(updated > 0)
    }

    /// Delete a product. `false` when the identifier is unknown.
    pub fn delete_product(&self, id: i64) -> StoreResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM products WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ProductRecord> {
    Ok(ProductRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        description: row.get(3)?,
        img_path: row.get(4)?,
        category: row.get(5)?,
    })
}
