//! Per-request projection of stored rows into display-ready views.

use serde::Serialize;

use crate::database_ops::products::ProductRecord;
use crate::normalization::category::{self, ResolvedCategory};
use crate::normalization::price::{self, PriceDisplay};

/// Display-ready projection of one product row. Rebuilt on every read and
/// never persisted; everything a template needs is precomputed here.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: i64,
    pub name: String,
    pub numeric_price: Option<f64>,
    pub price: PriceDisplay,
    pub description: String,
    /// Stored label as-is; kept as the grouping key fallback.
    #[serde(skip)]
    pub raw_category: Option<String>,
    pub category: ResolvedCategory,
    pub image_url: String,
    pub link: String,
}

impl ProductView {
    pub fn from_record(record: &ProductRecord) -> Self {
        let normalized = price::normalize(&record.price);
        Self {
            id: record.id,
            name: record.name.clone(),
            numeric_price: normalized.numeric,
            price: normalized.display,
            description: format_description(record.description.as_deref()),
            raw_category: record.category.clone(),
            category: category::resolve(record.category.as_deref()),
            image_url: resolve_image_path(record.img_path.as_deref()),
            link: format!("/product/{}", record.id),
        }
    }

    /// Prefix and amount joined for plain-text contexts.
    pub fn price_text(&self) -> String {
        self.price.full_text()
    }
}

/// Build views for every row. Total: malformed fields degrade to empty or
/// placeholder values per the normalizers, never to an error.
pub fn project(rows: &[ProductRecord]) -> Vec<ProductView> {
    rows.iter().map(ProductView::from_record).collect()
}

/// Return a web-accessible path for a stored image reference. Absolute URLs
/// and rooted paths pass through; everything else lands under /static/.
pub fn resolve_image_path(value: Option<&str>) -> String {
    let raw = value.unwrap_or("").trim();
    if raw.is_empty() {
        return String::new();
    }
    let lowered = raw.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return raw.to_string();
    }
    if raw.starts_with('/') {
        return raw.to_string();
    }
    let normalized = raw.trim_start_matches(['.', '/']);
    if normalized.starts_with("static/") {
        format!("/{normalized}")
    } else {
        format!("/static/{normalized}")
    }
}

/// Normalize stored line breaks to `<br>`. Escaping the rest of the text is
/// the template layer's concern.
pub fn format_description(value: Option<&str>) -> String {
    match value {
        None => String::new(),
        Some(text) => text.replace("\r\n", "\n").replace('\n', "<br>"),
    }
}
