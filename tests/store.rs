//! End-to-end flow: open a database, let the schema converge, write rows,
//! project them and drive the catalog operations the way a request handler
//! would.

use std::path::PathBuf;

use anyhow::Result;
use stone_catalog::catalog::filters::{self, SortOrder};
use stone_catalog::catalog::views;
use stone_catalog::normalization::price::RawPrice;
use stone_catalog::{ProductData, Store};

fn data(name: &str, price: RawPrice, category: Option<&str>) -> ProductData {
    ProductData {
        name: name.to_string(),
        price,
        description: Some("Гранит, полировка".to_string()),
        img_path: Some(format!("uploads/{name}.jpg")),
        category: category.map(str::to_string),
    }
}

#[test]
fn catalog_request_flow() -> Result<()> {
    let store = Store::open_in_memory()?;
    store.insert_product(&data("A", RawPrice::from("50000"), Some("Стандартный")))?;
    store.insert_product(&data("B", RawPrice::from("по запросу"), Some("Детский")))?;
    store.insert_product(&data("C", RawPrice::Numeric(120_000.0), Some("Эксклюзивный")))?;

    let rows = store.list_products()?;
    let catalog = views::project(&rows);
    assert_eq!(catalog.len(), 3);

    let bounds = filters::price_bounds(&catalog);
    assert_eq!((bounds.min, bounds.max), (50_000, 120_000));

    // The spec'd landing-page query: everything, cheapest first.
    let listed = filters::filter_and_sort(&catalog, "all", SortOrder::PriceAsc, None, None);
    let names: Vec<&str> = listed.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["A", "C", "B"]);

    // Clamped user range that excludes the exclusive monument.
    let from = filters::clamp_price(Some(10_000), bounds);
    let to = filters::clamp_price(Some(60_000), bounds);
    let in_range = filters::filter_and_sort(&catalog, "all", SortOrder::PriceAsc, from, to);
    let names: Vec<&str> = in_range.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["A"]);

    let facets = filters::catalog_index(&catalog);
    assert_eq!(facets[0].slug, "all");
    assert_eq!(facets[0].count, 3);

    let target = catalog.iter().find(|v| v.name == "C").unwrap();
    let related = filters::similar(target, &catalog);
    // No other exclusive monuments: falls back to the standard category.
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].name, "A");
    Ok(())
}

#[test]
fn legacy_database_converges_on_open() -> Result<()> {
    let path = scratch_path("legacy");
    let _ = std::fs::remove_file(&path);

    // Second-generation file: image lives in image_url, no category column.
    {
        let conn = rusqlite::Connection::open(&path)?;
        conn.execute_batch(
            "CREATE TABLE products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                price,
                description TEXT,
                image_url TEXT
            );
            INSERT INTO products (name, price, image_url)
            VALUES ('Стела №1', '45 000 руб.', 'uploads/stela1.jpg');",
        )?;
    }

    {
        let store = Store::open(&path)?;
        let rows = store.list_products()?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].img_path.as_deref(), Some("uploads/stela1.jpg"));
        assert_eq!(rows[0].category.as_deref(), Some("Стандартный"));

        let catalog = views::project(&rows);
        assert_eq!(catalog[0].numeric_price, Some(45_000.0));
        assert_eq!(catalog[0].image_url, "/static/uploads/stela1.jpg");
    }

    // Re-opening finds a converged table and performs zero writes.
    {
        let mut store = Store::open(&path)?;
        let report = store.converge()?;
        assert_eq!(report.writes, 0);
    }

    let _ = std::fs::remove_file(&path);
    Ok(())
}

fn scratch_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("stone-catalog-{tag}-{}.db", std::process::id()))
}
