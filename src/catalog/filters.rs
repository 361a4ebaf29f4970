//! Grouping, facets, price bounds and filtering over built views.
//!
//! Every function here is pure and total: inputs are borrowed view slices,
//! outputs are fresh collections, and there is no shared state, so calls are
//! safe from any number of request threads.

use indexmap::IndexMap;
use serde::Serialize;

use crate::catalog::views::ProductView;
use crate::normalization::category::{
    self, ResolvedCategory, CATEGORY_PRESETS, NO_CATEGORY_LABEL, STANDARD_CATEGORY,
};

/// Category filter value that disables category filtering.
pub const ALL_FACET_SLUG: &str = "all";
pub const ALL_FACET_LABEL: &str = "Все памятники";

/// Catalog sort orders as they arrive from the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    PriceAsc,
    PriceDesc,
    Category,
    Name,
}

impl SortOrder {
    /// Unknown strings fall back to the default ascending-price order.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "price-desc" => SortOrder::PriceDesc,
            "category" => SortOrder::Category,
            "name" => SortOrder::Name,
            _ => SortOrder::PriceAsc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::PriceAsc => "price-asc",
            SortOrder::PriceDesc => "price-desc",
            SortOrder::Category => "category",
            SortOrder::Name => "name",
        }
    }
}

/// One selectable sort option for the catalog toolbar.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SortOption {
    pub value: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
}

pub const SORT_OPTIONS: &[SortOption] = &[
    SortOption { value: "price-asc", label: "По цене ↑", icon: "arrow-up" },
    SortOption { value: "price-desc", label: "По цене ↓", icon: "arrow-down" },
    SortOption { value: "category", label: "По категории", icon: "grid" },
    SortOption { value: "name", label: "По названию", icon: "letters" },
];

/// Products of one category, in incoming row order.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryGroup {
    /// Raw grouping key: the stored label, or the no-category fallback.
    pub key: String,
    pub display: String,
    pub slug: String,
    pub items: Vec<ProductView>,
}

/// Partition views by category. Groups come out in resolver order (presets
/// in declared position, unknowns after them by label); rows inside a group
/// keep their incoming order.
pub fn group_by_category(views: &[ProductView]) -> Vec<CategoryGroup> {
    struct Bucket {
        key: String,
        resolved: ResolvedCategory,
        items: Vec<ProductView>,
    }

    let mut buckets: IndexMap<String, Bucket> = IndexMap::new();
    for view in views {
        let key = view
            .raw_category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_CATEGORY_LABEL)
            .to_string();
        let bucket = buckets
            .entry(view.category.slug.clone())
            .or_insert_with(|| Bucket {
                key,
                resolved: view.category.clone(),
                items: Vec::new(),
            });
        bucket.items.push(view.clone());
    }

    let mut entries: Vec<Bucket> = buckets.into_values().collect();
    entries.sort_by(|a, b| a.resolved.order_key().cmp(&b.resolved.order_key()));
    entries
        .into_iter()
        .map(|bucket| CategoryGroup {
            key: bucket.key,
            display: bucket.resolved.label,
            slug: bucket.resolved.slug,
            items: bucket.items,
        })
        .collect()
}

/// One entry of the category filter strip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryFacet {
    pub slug: String,
    pub label: String,
    pub count: usize,
}

/// Facet list for the catalog sidebar: "all" first with the total count,
/// every preset (zero counts included) in declared order, then whatever
/// unknown categories are actually present, ordered by label.
pub fn catalog_index(views: &[ProductView]) -> Vec<CategoryFacet> {
    let mut by_slug: IndexMap<String, (String, usize)> = IndexMap::new();
    for view in views {
        let entry = by_slug
            .entry(view.category.slug.clone())
            .or_insert_with(|| (view.category.label.clone(), 0));
        entry.1 += 1;
    }

    let mut facets = vec![CategoryFacet {
        slug: ALL_FACET_SLUG.to_string(),
        label: ALL_FACET_LABEL.to_string(),
        count: views.len(),
    }];

    for preset in CATEGORY_PRESETS {
        let count = by_slug
            .shift_remove(preset.slug)
            .map(|(_, count)| count)
            .unwrap_or(0);
        facets.push(CategoryFacet {
            slug: preset.slug.to_string(),
            label: preset.label.to_string(),
            count,
        });
    }

    let mut remaining: Vec<CategoryFacet> = by_slug
        .into_iter()
        .map(|(slug, (label, count))| CategoryFacet { slug, label, count })
        .collect();
    remaining.sort_by(|a, b| a.label.cmp(&b.label));
    facets.extend(remaining);
    facets
}

/// Inclusive numeric price range over the catalog. `{0, 0}` means no view
/// carries a numeric price; callers must treat that as "filtering disabled",
/// not as a zero-width range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBounds {
    pub min: i64,
    pub max: i64,
}

pub fn price_bounds(views: &[ProductView]) -> PriceBounds {
    let mut min = f64::INFINITY;
    let mut max = 0.0f64;
    for view in views {
        if let Some(value) = view.numeric_price {
            min = min.min(value);
            max = max.max(value);
        }
    }
    if !min.is_finite() || max <= 0.0 {
        return PriceBounds { min: 0, max: 0 };
    }
    PriceBounds {
        min: min as i64,
        max: max as i64,
    }
}

/// Clamp a requested bound into the catalog range. Absent when the range is
/// degenerate (no price data) or the value itself is absent.
pub fn clamp_price(value: Option<i64>, bounds: PriceBounds) -> Option<i64> {
    let value = value?;
    if bounds.max <= bounds.min {
        return None;
    }
    Some(value.clamp(bounds.min, bounds.max))
}

/// Step for the price slider, coarser as the span grows.
pub fn slider_step(bounds: PriceBounds) -> i64 {
    let span = (bounds.max - bounds.min).max(1);
    match span {
        ..=10_000 => 1_000,
        ..=50_000 => 5_000,
        ..=200_000 => 10_000,
        _ => 20_000,
    }
}

/// Apply category and price filters, then sort.
///
/// The category filter is skipped for `"all"`. The price filter activates
/// only when both bounds are present and `price_to > price_from` strictly:
/// a zero-width or inverted range after clamping disables price filtering
/// rather than yielding an empty catalog.
pub fn filter_and_sort(
    views: &[ProductView],
    category: &str,
    sort: SortOrder,
    price_from: Option<i64>,
    price_to: Option<i64>,
) -> Vec<ProductView> {
    let range = match (price_from, price_to) {
        (Some(from), Some(to)) if to > from => Some((from as f64, to as f64)),
        _ => None,
    };

    let mut filtered: Vec<ProductView> = views
        .iter()
        .filter(|view| {
            if category != ALL_FACET_SLUG && view.category.slug != category {
                return false;
            }
            match range {
                None => true,
                Some((from, to)) => {
                    matches!(view.numeric_price, Some(value) if value >= from && value <= to)
                }
            }
        })
        .cloned()
        .collect();

    match sort {
        SortOrder::PriceAsc => filtered.sort_by(|a, b| price_key(a).cmp(&price_key(b))),
        SortOrder::PriceDesc => {
            // Ascending sort then a full reverse: items without a numeric
            // price surface first under descending order. Long-standing
            // catalog behavior, kept as is.
            filtered.sort_by(|a, b| price_key(a).cmp(&price_key(b)));
            filtered.reverse();
        }
        SortOrder::Category => filtered.sort_by(|a, b| category_key(a).cmp(&category_key(b))),
        SortOrder::Name => filtered.sort_by_key(|view| view.name.to_lowercase()),
    }
    filtered
}

// Absent prices sort last under ascending order; ties break by name.
fn price_key(view: &ProductView) -> (bool, i64, String) {
    match view.numeric_price {
        Some(value) => (false, value as i64, view.name.to_lowercase()),
        None => (true, 0, view.name.to_lowercase()),
    }
}

fn category_key(view: &ProductView) -> (String, String) {
    (view.category.label.to_lowercase(), view.name.to_lowercase())
}

/// Same-category neighbours of `target`, excluding itself. Falls back to the
/// standard category, then to everything else. Incoming order is preserved;
/// no re-sort.
pub fn similar(target: &ProductView, views: &[ProductView]) -> Vec<ProductView> {
    let same: Vec<ProductView> = views
        .iter()
        .filter(|view| view.id != target.id && view.category.slug == target.category.slug)
        .cloned()
        .collect();
    if !same.is_empty() {
        return same;
    }

    let standard_slug = category::resolve(Some(STANDARD_CATEGORY)).slug;
    let standard: Vec<ProductView> = views
        .iter()
        .filter(|view| view.id != target.id && view.category.slug == standard_slug)
        .cloned()
        .collect();
    if !standard.is_empty() {
        return standard;
    }

    views
        .iter()
        .filter(|view| view.id != target.id)
        .cloned()
        .collect()
}
