use rusqlite::types::{FromSql, FromSqlResult, Null, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

/// Marker recognized (case-insensitively, as a substring) inside stored
/// price text: "price on request".
pub const PRICE_REQUEST_TEXT: &str = "по запросу";

/// Currency suffix appended to formatted numeric prices.
pub const CURRENCY_SUFFIX: &str = "₽";

/// Prefix shown before concrete prices ("from").
pub const PRICE_PREFIX: &str = "от";

/// A price value exactly as the database holds it. The column has no declared
/// affinity, so numbers and free text coexist; this is the single boundary
/// type everything downstream interprets through [`normalize`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum RawPrice {
    Numeric(f64),
    Text(String),
    #[default]
    Absent,
}

impl FromSql for RawPrice {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => RawPrice::Absent,
            ValueRef::Integer(v) => RawPrice::Numeric(v as f64),
            ValueRef::Real(v) => RawPrice::Numeric(v),
            ValueRef::Text(t) => RawPrice::Text(String::from_utf8_lossy(t).into_owned()),
            // A blob in the price column is unusable; degrade rather than fail.
            ValueRef::Blob(_) => RawPrice::Absent,
        })
    }
}

impl ToSql for RawPrice {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            RawPrice::Numeric(v) => ToSqlOutput::from(*v),
            RawPrice::Text(t) => ToSqlOutput::from(t.as_str()),
            RawPrice::Absent => ToSqlOutput::from(Null),
        })
    }
}

impl From<f64> for RawPrice {
    fn from(value: f64) -> Self {
        RawPrice::Numeric(value)
    }
}

impl From<&str> for RawPrice {
    fn from(value: &str) -> Self {
        RawPrice::Text(value.to_string())
    }
}

/// What templates render for a price: an optional prefix ("from") and the
/// amount or placeholder text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceDisplay {
    pub prefix: &'static str,
    pub text: String,
}

impl PriceDisplay {
    fn placeholder() -> Self {
        Self {
            prefix: "",
            text: PRICE_REQUEST_TEXT.to_string(),
        }
    }

    /// Prefix and text joined for plain-text contexts.
    pub fn full_text(&self) -> String {
        if self.prefix.is_empty() {
            self.text.clone()
        } else {
            format!("{} {}", self.prefix, self.text)
        }
    }
}

/// Canonical interpretation of one raw price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedPrice {
    pub numeric: Option<f64>,
    pub display: PriceDisplay,
}

/// Extract a numeric value if the raw price carries one.
///
/// Text is salvaged by stripping everything that is not an ASCII digit, so
/// "50 000 руб." parses as 50000. Text containing the request marker never
/// yields a number, no matter what digits surround it.
pub fn parse_numeric(raw: &RawPrice) -> Option<f64> {
    match raw {
        RawPrice::Numeric(v) if v.is_finite() => Some(*v),
        RawPrice::Numeric(_) | RawPrice::Absent => None,
        RawPrice::Text(text) => {
            let text = text.trim();
            if text.is_empty() || text.to_lowercase().contains(PRICE_REQUEST_TEXT) {
                return None;
            }
            let digits: String = text.chars().filter(char::is_ascii_digit).collect();
            if digits.is_empty() {
                return None;
            }
            digits.parse::<f64>().ok()
        }
    }
}

/// Format a price amount with single-space thousands grouping, no decimals.
pub fn format_number(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let len = digits.len();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    if value < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Total interpretation of a raw price: never fails, every unusable input
/// degrades to the "price on request" placeholder.
pub fn normalize(raw: &RawPrice) -> NormalizedPrice {
    let numeric = parse_numeric(raw);
    let display = match numeric {
        Some(value) => PriceDisplay {
            prefix: PRICE_PREFIX,
            text: format!("{} {}", format_number(value), CURRENCY_SUFFIX),
        },
        None => fallback_display(raw),
    };
    NormalizedPrice { numeric, display }
}

/// Display for prices with no parseable number. Text with real content (at
/// least one alphanumeric character, no request marker) passes through
/// verbatim; currency-symbol-only or blank strings get the placeholder.
fn fallback_display(raw: &RawPrice) -> PriceDisplay {
    let text = match raw {
        RawPrice::Text(t) => t.trim(),
        _ => "",
    };
    let has_content = text.chars().any(char::is_alphanumeric);
    if !has_content || text.to_lowercase().contains(PRICE_REQUEST_TEXT) {
        PriceDisplay::placeholder()
    } else {
        PriceDisplay {
            prefix: PRICE_PREFIX,
            text: text.to_string(),
        }
    }
}
