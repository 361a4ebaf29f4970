//! Schema convergence for the products table.
//!
//! Three generations of the table exist in the wild, differing in which
//! column holds the image reference (`image_path`, then `image_url`, now
//! `img_path`) and whether `category` exists at all. Convergence transforms
//! whatever shape is on disk into the current one with purely additive,
//! individually idempotent steps; nothing is ever dropped so a process still
//! assuming an older shape loses no data.

use std::collections::HashSet;

use rusqlite::{Connection, Transaction};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::normalization::category::STANDARD_CATEGORY;

/// Canonical image column the current code writes.
pub const IMAGE_COLUMN: &str = "img_path";
/// Previous generation; renamed to [`IMAGE_COLUMN`] when the engine allows.
pub const LEGACY_IMAGE_COLUMN: &str = "image_url";
/// Oldest generation; only ever used as a backfill source.
pub const OLDEST_IMAGE_COLUMN: &str = "image_path";

/// Outcome of one convergence run. `writes` counts every mutating statement
/// and touched row, so an already-converged table reports zero — which is
/// what makes idempotence observable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceReport {
    pub created_table: bool,
    pub renamed_legacy_column: bool,
    pub copied_legacy_values: bool,
    pub backfilled_image_rows: usize,
    pub added_category_column: bool,
    pub backfilled_category_rows: usize,
    pub writes: usize,
}

/// Current column set of the products table. Re-read on every call, never
/// cached: an independently started process may be converging the same file
/// concurrently, and stale column knowledge is how data gets corrupted.
pub fn table_columns(conn: &Connection) -> StoreResult<HashSet<String>> {
    let mut stmt = conn.prepare("PRAGMA table_info(products)")?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut columns = HashSet::new();
    for name in names {
        columns.insert(name?);
    }
    Ok(columns)
}

/// Bring the products table up to the target shape. All steps run inside one
/// transaction; a crash mid-run leaves the previous shape intact and the next
/// run starts over safely. Commits only when something was actually written.
pub fn converge(conn: &mut Connection) -> StoreResult<ConvergenceReport> {
    let tx = conn.transaction()?;
    let mut report = ConvergenceReport::default();

    ensure_table(&tx, &mut report)?;
    ensure_image_column(&tx, &mut report)?;
    backfill_image_column(&tx, &mut report)?;
    ensure_category_column(&tx, &mut report)?;

    if report.writes > 0 {
        tx.commit()?;
        info!(writes = report.writes, "products schema converged");
    } else {
        tx.rollback()?;
        debug!("products schema already converged, no writes");
    }
    Ok(report)
}

fn ensure_table(tx: &Transaction<'_>, report: &mut ConvergenceReport) -> StoreResult<()> {
    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'products')",
        [],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(());
    }
    // The price column deliberately has no affinity: rows carry numbers and
    // free text ("по запросу") side by side.
    tx.execute_batch(&format!(
        "CREATE TABLE products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            price,
            description TEXT,
            {IMAGE_COLUMN} TEXT,
            category TEXT DEFAULT '{STANDARD_CATEGORY}'
        )"
    ))?;
    report.created_table = true;
    report.writes += 1;
    info!("created products table in target shape");
    Ok(())
}

fn ensure_image_column(tx: &Transaction<'_>, report: &mut ConvergenceReport) -> StoreResult<()> {
    let columns = table_columns(tx)?;
    if columns.contains(IMAGE_COLUMN) {
        return Ok(());
    }

    if !columns.contains(LEGACY_IMAGE_COLUMN) {
        tx.execute_batch(&format!("ALTER TABLE products ADD COLUMN {IMAGE_COLUMN} TEXT"))?;
        report.writes += 1;
        info!(column = IMAGE_COLUMN, "added missing image column");
        return Ok(());
    }

    match tx.execute_batch(&format!(
        "ALTER TABLE products RENAME COLUMN {LEGACY_IMAGE_COLUMN} TO {IMAGE_COLUMN}"
    )) {
        Ok(()) => {
            report.renamed_legacy_column = true;
            report.writes += 1;
            info!(
                from = LEGACY_IMAGE_COLUMN,
                to = IMAGE_COLUMN,
                "renamed legacy image column"
            );
        }
        Err(rename_err) => {
            // Engines predating RENAME COLUMN: add the canonical column and
            // copy values across. The legacy column stays behind untouched so
            // writers still assuming the old shape lose nothing.
            warn!(error = %rename_err, "column rename rejected, falling back to add-and-copy");
            let fallback = tx
                .execute_batch(&format!("ALTER TABLE products ADD COLUMN {IMAGE_COLUMN} TEXT"))
                .and_then(|_| {
                    tx.execute(
                        &format!(
                            "UPDATE products SET {IMAGE_COLUMN} = {LEGACY_IMAGE_COLUMN}
                             WHERE {IMAGE_COLUMN} IS NULL OR TRIM({IMAGE_COLUMN}) = ''"
                        ),
                        [],
                    )
                    .map(|_| ())
                });
            if let Err(copy_err) = fallback {
                return Err(StoreError::ImageColumn(format!(
                    "rename failed ({rename_err}); add-and-copy failed ({copy_err})"
                )));
            }
            report.copied_legacy_values = true;
            report.writes += 1;
        }
    }
    Ok(())
}

fn backfill_image_column(tx: &Transaction<'_>, report: &mut ConvergenceReport) -> StoreResult<()> {
    let columns = table_columns(tx)?;
    if !columns.contains(OLDEST_IMAGE_COLUMN) || !columns.contains(IMAGE_COLUMN) {
        return Ok(());
    }
    // Only fill blanks; a populated canonical value is always the freshest.
    let updated = tx.execute(
        &format!(
            "UPDATE products SET {IMAGE_COLUMN} = {OLDEST_IMAGE_COLUMN}
             WHERE ({IMAGE_COLUMN} IS NULL OR TRIM({IMAGE_COLUMN}) = '')
               AND {OLDEST_IMAGE_COLUMN} IS NOT NULL
               AND TRIM({OLDEST_IMAGE_COLUMN}) <> ''"
        ),
        [],
    )?;
    if updated > 0 {
        report.backfilled_image_rows = updated;
        report.writes += updated;
        info!(rows = updated, from = OLDEST_IMAGE_COLUMN, "backfilled image references");
    }
    Ok(())
}

fn ensure_category_column(tx: &Transaction<'_>, report: &mut ConvergenceReport) -> StoreResult<()> {
    let columns = table_columns(tx)?;
    if columns.contains("category") {
        return Ok(());
    }
    tx.execute_batch(&format!(
        "ALTER TABLE products ADD COLUMN category TEXT DEFAULT '{STANDARD_CATEGORY}'"
    ))?;
    report.added_category_column = true;
    report.writes += 1;
    let updated = tx.execute(
        &format!(
            "UPDATE products SET category = '{STANDARD_CATEGORY}'
             WHERE category IS NULL OR TRIM(category) = ''"
        ),
        [],
    )?;
    report.backfilled_category_rows = updated;
    report.writes += updated;
    info!(rows = updated, "added category column, backfilled blanks");
    Ok(())
}

/// SQL expression selecting the freshest image reference, derived from the
/// columns that exist right now. Read paths go through this instead of
/// assuming convergence has already run in this process.
pub fn image_select_expr(conn: &Connection) -> StoreResult<String> {
    let columns = table_columns(conn)?;
    let mut sources: Vec<String> = [IMAGE_COLUMN, LEGACY_IMAGE_COLUMN, OLDEST_IMAGE_COLUMN]
        .into_iter()
        .filter(|column| columns.contains(*column))
        .map(|column| format!("NULLIF(TRIM({column}), '')"))
        .collect();

    Ok(match sources.len() {
        0 => "NULL".to_string(),
        1 => sources.remove(0),
        _ => format!("COALESCE({})", sources.join(", ")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_connection() -> Connection {
        Connection::open_in_memory().expect("in-memory sqlite")
    }

    #[test]
    fn fresh_database_gets_target_shape() {
        let mut conn = raw_connection();
        let report = converge(&mut conn).unwrap();
        assert!(report.created_table);
        assert!(report.writes >= 1);

        let columns = table_columns(&conn).unwrap();
        for expected in ["id", "name", "price", "description", IMAGE_COLUMN, "category"] {
            assert!(columns.contains(expected), "missing column {expected}");
        }
    }

    #[test]
    fn second_run_writes_nothing() {
        let mut conn = raw_connection();
        converge(&mut conn).unwrap();
        let second = converge(&mut conn).unwrap();
        assert_eq!(second, ConvergenceReport::default());
    }

    #[test]
    fn legacy_image_url_column_is_carried_over() {
        let mut conn = raw_connection();
        conn.execute_batch(
            "CREATE TABLE products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                price,
                description TEXT,
                image_url TEXT
            );
            INSERT INTO products (name, price, image_url)
            VALUES ('Стела №1', 45000, 'uploads/stela1.jpg');",
        )
        .unwrap();

        let report = converge(&mut conn).unwrap();
        assert!(report.renamed_legacy_column || report.copied_legacy_values);

        let value: Option<String> = conn
            .query_row(
                &format!("SELECT {IMAGE_COLUMN} FROM products WHERE name = 'Стела №1'"),
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(value.as_deref(), Some("uploads/stela1.jpg"));
    }

    #[test]
    fn oldest_column_backfills_only_blanks() {
        let mut conn = raw_connection();
        conn.execute_batch(
            "CREATE TABLE products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                price,
                description TEXT,
                img_path TEXT,
                image_path TEXT,
                category TEXT
            );
            INSERT INTO products (name, price, img_path, image_path, category) VALUES
                ('A', 1000, '', 'old/a.jpg', 'Стандартный'),
                ('B', 2000, 'new/b.jpg', 'old/b.jpg', 'Стандартный');",
        )
        .unwrap();

        let report = converge(&mut conn).unwrap();
        assert_eq!(report.backfilled_image_rows, 1);

        let a: Option<String> = conn
            .query_row("SELECT img_path FROM products WHERE name = 'A'", [], |r| r.get(0))
            .unwrap();
        let b: Option<String> = conn
            .query_row("SELECT img_path FROM products WHERE name = 'B'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(a.as_deref(), Some("old/a.jpg"));
        assert_eq!(b.as_deref(), Some("new/b.jpg"));
    }

    #[test]
    fn category_column_added_with_fallback() {
        let mut conn = raw_connection();
        conn.execute_batch(
            "CREATE TABLE products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                price,
                description TEXT,
                img_path TEXT
            );
            INSERT INTO products (name, price) VALUES ('A', 1000);",
        )
        .unwrap();

        let report = converge(&mut conn).unwrap();
        assert!(report.added_category_column);

        let category: Option<String> = conn
            .query_row("SELECT category FROM products WHERE name = 'A'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(category.as_deref(), Some(STANDARD_CATEGORY));
    }

    #[test]
    fn oldest_shape_converges_to_newest_semantics() {
        // A table created under the oldest known shape must answer image
        // queries identically to one created directly in the target shape.
        let mut old = raw_connection();
        old.execute_batch(
            "CREATE TABLE products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                price,
                description TEXT,
                image_path TEXT
            );
            INSERT INTO products (name, price, image_path)
            VALUES ('Стела', 45000, 'uploads/stela.jpg');",
        )
        .unwrap();
        converge(&mut old).unwrap();

        let mut new = raw_connection();
        converge(&mut new).unwrap();
        new.execute(
            "INSERT INTO products (name, price, img_path) VALUES ('Стела', 45000, 'uploads/stela.jpg')",
            [],
        )
        .unwrap();

        for conn in [&old, &new] {
            let expr = image_select_expr(conn).unwrap();
            let image: Option<String> = conn
                .query_row(
                    &format!("SELECT {expr} FROM products WHERE name = 'Стела'"),
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(image.as_deref(), Some("uploads/stela.jpg"));
        }
    }

    #[test]
    fn image_expr_prefers_canonical_column() {
        let mut conn = raw_connection();
        conn.execute_batch(
            "CREATE TABLE products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                price,
                img_path TEXT,
                image_path TEXT,
                category TEXT
            );
            INSERT INTO products (name, price, img_path, image_path)
            VALUES ('A', 1, 'new.jpg', 'old.jpg');",
        )
        .unwrap();
        converge(&mut conn).unwrap();

        let expr = image_select_expr(&conn).unwrap();
        let image: String = conn
            .query_row(&format!("SELECT {expr} FROM products"), [], |row| row.get(0))
            .unwrap();
        assert_eq!(image, "new.jpg");
    }
}
