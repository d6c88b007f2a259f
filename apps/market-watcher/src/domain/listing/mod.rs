//! Listing Record Types
//!
//! Normalized projection of a "new item" announcement from the market feed.
//!
//! # Field Policy
//!
//! The feed payload is loosely typed: any field may be missing, and numeric
//! values sometimes arrive as strings and sometimes as numbers. Extraction is
//! driven by [`ItemField`], an explicit list of the keys we care about, each
//! with its own default:
//!
//! | Field | Key | Default |
//! |-------|-----|---------|
//! | market name | `i_market_name` | `""` |
//! | quality | `i_quality` | `"--"` |
//! | price | `ui_price` | `""` |
//! | currency | `ui_currency` | `""` |
//! | float | `ui_float` | omitted |
//! | stickers | `stickers` | omitted |
//! | inspect link | `inspect_url` | omitted |

use std::fmt;

use serde_json::{Map, Value};

/// Width of the `=` banner framing each rendered record.
pub const BANNER_WIDTH: usize = 50;

/// Placeholders the feed uses for "no float value".
const NIL_PLACEHOLDERS: &[&str] = &["nil", "<nil>"];

// =============================================================================
// Field Policy
// =============================================================================

/// Fields extracted from an item payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemField {
    /// Full market name, e.g. `AK-47 | Redline (Field-Tested)`.
    MarketName,
    /// Item quality / rarity label.
    Quality,
    /// Listing price.
    Price,
    /// Currency of the listing price.
    Currency,
    /// Wear float value.
    Float,
    /// Applied sticker identifiers.
    Stickers,
    /// In-game inspect link.
    InspectUrl,
}

impl ItemField {
    /// Get all item fields in render order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::MarketName,
            Self::Quality,
            Self::Price,
            Self::Currency,
            Self::Float,
            Self::Stickers,
            Self::InspectUrl,
        ]
    }

    /// Payload key this field is read from.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::MarketName => "i_market_name",
            Self::Quality => "i_quality",
            Self::Price => "ui_price",
            Self::Currency => "ui_currency",
            Self::Float => "ui_float",
            Self::Stickers => "stickers",
            Self::InspectUrl => "inspect_url",
        }
    }

    /// Value used when the key is absent (or `null`).
    #[must_use]
    pub const fn default_value(self) -> &'static str {
        match self {
            Self::Quality => "--",
            _ => "",
        }
    }
}

/// Read a scalar field as text, applying the field's default.
///
/// Strings are returned verbatim, numbers with two decimals, and any other
/// JSON value in its compact textual form. `null` counts as absent.
#[must_use]
pub fn text_field(payload: &Map<String, Value>, field: ItemField) -> String {
    match payload.get(field.key()) {
        None | Some(Value::Null) => field.default_value().to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n
            .as_f64()
            .map_or_else(|| n.to_string(), |f| format!("{f:.2}")),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Read the sticker list as integer-formatted identifiers, preserving order.
///
/// Numeric ids are rendered without a fractional part. Ids sent as strings
/// are kept as-is; anything else in the array is skipped.
#[must_use]
pub fn sticker_ids(payload: &Map<String, Value>) -> Vec<String> {
    let Some(Value::Array(stickers)) = payload.get(ItemField::Stickers.key()) else {
        return Vec::new();
    };

    stickers
        .iter()
        .filter_map(|sticker| match sticker {
            Value::Number(n) => n.as_f64().map(|f| format!("{f:.0}")),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .collect()
}

/// Undo the `\/` escaping the feed applies to inspect links.
#[must_use]
pub fn normalize_inspect_url(raw: &str) -> String {
    raw.replace("\\/", "/")
}

fn is_trivial_float(value: &str) -> bool {
    value.is_empty() || NIL_PLACEHOLDERS.contains(&value)
}

// =============================================================================
// Item Record
// =============================================================================

/// A newly listed item, ready to be written to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    /// Market name of the item.
    pub market_name: String,
    /// Quality label (`--` when unknown).
    pub quality: String,
    /// Listing price as sent by the feed.
    pub price: String,
    /// Price currency.
    pub currency: String,
    /// Wear float, when the feed reports a meaningful one.
    pub float: Option<String>,
    /// Sticker identifiers in feed order.
    pub stickers: Vec<String>,
    /// Inspect link with escaped slashes normalized.
    pub inspect_url: Option<String>,
}

impl ItemRecord {
    /// Build a record from a decoded item payload.
    #[must_use]
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        let float = Some(text_field(payload, ItemField::Float)).filter(|f| !is_trivial_float(f));
        let inspect_url = Some(text_field(payload, ItemField::InspectUrl))
            .filter(|url| !url.is_empty())
            .map(|url| normalize_inspect_url(&url));

        Self {
            market_name: text_field(payload, ItemField::MarketName),
            quality: text_field(payload, ItemField::Quality),
            price: text_field(payload, ItemField::Price),
            currency: text_field(payload, ItemField::Currency),
            float,
            stickers: sticker_ids(payload),
            inspect_url,
        }
    }
}

impl fmt::Display for ItemRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let banner = "=".repeat(BANNER_WIDTH);

        writeln!(f, "{banner}")?;
        writeln!(f, "Item: {}", self.market_name)?;
        writeln!(f, "Quality: {}", self.quality)?;
        writeln!(f, "Price: {} {}", self.price, self.currency)?;

        if let Some(float) = &self.float {
            writeln!(f, "Float: {float}")?;
        }

        if !self.stickers.is_empty() {
            writeln!(f, "Stickers:")?;
            for id in &self.stickers {
                writeln!(f, "  - ID: {id}")?;
            }
        }

        if let Some(url) = &self.inspect_url {
            writeln!(f, "Inspect: {url}")?;
        }

        write!(f, "{banner}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    #[test_case(json!("12.50"), "12.50" ; "string kept verbatim")]
    #[test_case(json!(12.5), "12.50" ; "float two decimals")]
    #[test_case(json!(7), "7.00" ; "integer two decimals")]
    #[test_case(json!(true), "true" ; "bool stringified")]
    #[test_case(json!([1, 2]), "[1,2]" ; "array compact json")]
    #[test_case(Value::Null, "" ; "null treated as absent")]
    fn price_formatting(value: Value, expected: &str) {
        let map = payload(json!({ "ui_price": value }));
        assert_eq!(text_field(&map, ItemField::Price), expected);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let map = Map::new();
        assert_eq!(text_field(&map, ItemField::MarketName), "");
        assert_eq!(text_field(&map, ItemField::Quality), "--");
        assert_eq!(text_field(&map, ItemField::Currency), "");
    }

    #[test]
    fn every_field_has_a_distinct_key() {
        let mut keys: Vec<_> = ItemField::all().iter().map(|f| f.key()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), ItemField::all().len());
    }

    #[test]
    fn sticker_ids_preserve_order_and_drop_fraction() {
        let map = payload(json!({ "stickers": [5012.0, 17, "88", null, {"id": 1}] }));
        assert_eq!(sticker_ids(&map), vec!["5012", "17", "88"]);
    }

    #[test]
    fn sticker_ids_absent_or_wrong_type() {
        assert!(sticker_ids(&Map::new()).is_empty());
        let map = payload(json!({ "stickers": "none" }));
        assert!(sticker_ids(&map).is_empty());
    }

    #[test]
    fn inspect_url_slashes_normalized() {
        assert_eq!(
            normalize_inspect_url(r"steam:\/\/rungame\/730\/+csgo_econ_action_preview"),
            "steam://rungame/730/+csgo_econ_action_preview"
        );
    }

    #[test_case(json!({}), None ; "absent")]
    #[test_case(json!({ "ui_float": "" }), None ; "empty")]
    #[test_case(json!({ "ui_float": "nil" }), None ; "nil placeholder")]
    #[test_case(json!({ "ui_float": "<nil>" }), None ; "bracketed nil placeholder")]
    #[test_case(json!({ "ui_float": null }), None ; "json null")]
    #[test_case(json!({ "ui_float": "0.0712" }), Some("0.0712") ; "string float")]
    #[test_case(json!({ "ui_float": 0.25 }), Some("0.25") ; "numeric float")]
    fn float_only_when_meaningful(value: Value, expected: Option<&str>) {
        let record = ItemRecord::from_payload(&payload(value));
        assert_eq!(record.float.as_deref(), expected);
    }

    #[test]
    fn render_minimal_record() {
        let map = payload(json!({
            "i_market_name": "AK-47",
            "ui_price": "12.50",
            "ui_currency": "USD"
        }));
        let rendered = ItemRecord::from_payload(&map).to_string();
        let banner = "=".repeat(BANNER_WIDTH);

        assert_eq!(
            rendered,
            format!("{banner}\nItem: AK-47\nQuality: --\nPrice: 12.50 USD\n{banner}")
        );
    }

    #[test]
    fn render_full_record() {
        let map = payload(json!({
            "i_market_name": "M4A4 | Howl (Minimal Wear)",
            "i_quality": "Contraband",
            "ui_price": 4321.5,
            "ui_currency": "RUB",
            "ui_float": "0.0801",
            "stickers": [101, 202],
            "inspect_url": "steam:\\/\\/rungame\\/730"
        }));
        let rendered = ItemRecord::from_payload(&map).to_string();

        assert!(rendered.contains("Item: M4A4 | Howl (Minimal Wear)\n"));
        assert!(rendered.contains("Quality: Contraband\n"));
        assert!(rendered.contains("Price: 4321.50 RUB\n"));
        assert!(rendered.contains("Float: 0.0801\n"));
        assert!(rendered.contains("Stickers:\n  - ID: 101\n  - ID: 202\n"));
        assert!(rendered.contains("Inspect: steam://rungame/730\n"));
    }
}
