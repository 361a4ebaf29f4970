use serde::Serialize;

/// Display label used when a product has no category at all.
pub const NO_CATEGORY_LABEL: &str = "Без категории";

/// Slug used when derivation from a freeform label yields nothing.
pub const UNCATEGORIZED_SLUG: &str = "uncategorized";

/// Canonical category name the fallback paths converge to (schema backfill,
/// "similar products" fallback).
pub const STANDARD_CATEGORY: &str = "Стандартный";

/// One entry of the fixed preset table.
#[derive(Debug, Clone, Copy)]
pub struct CategoryPreset {
    pub slug: &'static str,
    pub label: &'static str,
    /// Canonical name first, historical display-name aliases after it.
    pub names: &'static [&'static str],
}

/// Known categories in their display order. Matching is case-insensitive
/// against every alias, so rows written under old display names still land
/// in the right bucket.
pub const CATEGORY_PRESETS: &[CategoryPreset] = &[
    CategoryPreset {
        slug: "standartnye",
        label: "Стандартные",
        names: &["Стандартный", "Стандартные памятники"],
    },
    CategoryPreset {
        slug: "semeinye",
        label: "Семейные",
        names: &["Семейный", "Семейные памятники"],
    },
    CategoryPreset {
        slug: "eksklyuzivnye",
        label: "Эксклюзивные",
        names: &["Эксклюзивный", "Эксклюзивные памятники"],
    },
    CategoryPreset {
        slug: "detskie",
        label: "Детские",
        names: &["Детский", "Детские памятники"],
    },
];

/// A raw category label classified against the preset table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    /// Index into [`CATEGORY_PRESETS`].
    Preset(usize),
    /// Anything the preset table does not know; trimmed original text,
    /// possibly empty.
    Freeform(String),
}

impl Category {
    pub fn classify(raw: Option<&str>) -> Self {
        let trimmed = raw.unwrap_or("").trim();
        if !trimmed.is_empty() {
            let lowered = trimmed.to_lowercase();
            for (index, preset) in CATEGORY_PRESETS.iter().enumerate() {
                if preset.names.iter().any(|name| name.to_lowercase() == lowered) {
                    return Category::Preset(index);
                }
            }
        }
        Category::Freeform(trimmed.to_string())
    }
}

/// Fully resolved category: what grouping, facets and templates consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedCategory {
    pub slug: String,
    pub label: String,
    #[serde(skip)]
    pub preset_index: Option<usize>,
}

impl ResolvedCategory {
    /// Preset categories keep their declared position; everything unknown
    /// sorts after all presets, secondarily by display label. Deterministic
    /// regardless of row insertion order.
    pub fn order_key(&self) -> (usize, String) {
        (
            self.preset_index.unwrap_or(CATEGORY_PRESETS.len()),
            self.label.clone(),
        )
    }
}

/// Map a raw, possibly inconsistent category label to its canonical slug,
/// display label and ordering position. Total: unknown labels derive a slug,
/// absent labels fall back to the "no category" bucket.
pub fn resolve(raw: Option<&str>) -> ResolvedCategory {
    match Category::classify(raw) {
        Category::Preset(index) => {
            let preset = &CATEGORY_PRESETS[index];
            ResolvedCategory {
                slug: preset.slug.to_string(),
                label: preset.label.to_string(),
                preset_index: Some(index),
            }
        }
        Category::Freeform(text) if text.is_empty() => ResolvedCategory {
            slug: UNCATEGORIZED_SLUG.to_string(),
            label: NO_CATEGORY_LABEL.to_string(),
            preset_index: None,
        },
        Category::Freeform(text) => ResolvedCategory {
            slug: derive_slug(&text),
            label: text,
            preset_index: None,
        },
    }
}

/// Look up a preset by its slug.
pub fn preset_by_slug(slug: &str) -> Option<&'static CategoryPreset> {
    let lowered = slug.trim().to_ascii_lowercase();
    CATEGORY_PRESETS.iter().find(|preset| preset.slug == lowered)
}

/// Lowercase, collapse every non-alphanumeric run into a single hyphen, trim
/// leading/trailing hyphens. Unicode-aware, so Cyrillic labels survive.
pub fn derive_slug(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_hyphen = false;
    for c in raw.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    if slug.is_empty() {
        UNCATEGORIZED_SLUG.to_string()
    } else {
        slug
    }
}
