//! Shape checks for pass.json values.
//!
//! Every structured value the pass format knows about (barcodes, beacons,
//! locations, NFC payloads, fields, personalization descriptors) has a typed
//! record in [`types`]. A JSON value *fits* a shape when it deserializes into
//! that record and passes the record's extra [`Shape::check`].
//!
//! Validation never fails the caller. Arrays are filtered, keeping only the
//! elements that fit, and the caller gets back how many were dropped so it
//! can log them:
//!
//! ```
//! use passkit::schema::{filter_valid, Beacon};
//! use serde_json::json;
//!
//! let beacons = vec![
//!     json!({ "proximityUUID": "E2C56DB5-DFFB-48D2-B060-D0F5A71096E0", "major": 1 }),
//!     json!({ "major": 70000 }),
//!     json!({}),
//! ];
//! let filtered = filter_valid::<Beacon>(&beacons);
//! assert_eq!(filtered.accepted.len(), 1);
//! assert_eq!(filtered.rejected, 2);
//! ```

pub mod overrides;
pub mod types;

pub use overrides::Overrides;
pub use types::{
    Barcode, BarcodeFormat, Beacon, DataDetectorType, DateStyle, Field, FieldValue, Location,
    Nfc, NumberStyle, Personalization, PersonalizationField, TextAlignment, TransitType,
};

use chrono::DateTime;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::OnceLock;

/// A typed record a JSON value can be validated against.
pub trait Shape: DeserializeOwned {
    /// Name used in diagnostics.
    const NAME: &'static str;

    /// Constraints serde cannot express (lengths, non-empty lists).
    fn check(&self) -> bool {
        true
    }
}

/// Result of filtering a list through a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Filtered<T> {
    /// Items that fit the shape, in their original order.
    pub accepted: Vec<T>,
    /// Number of items dropped.
    pub rejected: usize,
}

impl<T> Filtered<T> {
    fn from_partition(total: usize, accepted: Vec<T>) -> Self {
        let rejected = total - accepted.len();
        Self { accepted, rejected }
    }
}

/// Parse `value` as `T`, returning `None` if it does not fit.
pub fn parse<T: Shape>(value: &Value) -> Option<T> {
    let parsed: T = serde_json::from_value(value.clone()).ok()?;
    parsed.check().then_some(parsed)
}

/// Whether `value` fits the shape `T`.
pub fn is_valid<T: Shape>(value: &Value) -> bool {
    parse::<T>(value).is_some()
}

/// Keep the elements of `values` that are non-empty objects fitting `T`.
///
/// Accepted elements are returned untouched so attributes the record does
/// not model still reach the final pass.json.
pub fn filter_valid<T: Shape>(values: &[Value]) -> Filtered<Value> {
    let accepted: Vec<Value> = values
        .iter()
        .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
        .filter(|v| is_valid::<T>(v))
        .cloned()
        .collect();
    Filtered::from_partition(values.len(), accepted)
}

/// Keep the typed items whose [`Shape::check`] passes.
pub fn filter_checked<T: Shape>(items: Vec<T>) -> Filtered<T> {
    let total = items.len();
    let accepted = items.into_iter().filter(|item| item.check()).collect();
    Filtered::from_partition(total, accepted)
}

fn rgb_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*rgb\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*\)\s*$")
            .expect("static regex")
    })
}

/// Whether `value` is an `rgb(r, g, b)` color with components in 0..=255.
pub fn is_valid_rgb(value: &str) -> bool {
    let Some(caps) = rgb_pattern().captures(value) else {
        return false;
    };
    (1..=3).all(|i| caps[i].parse::<u16>().is_ok_and(|c| c <= 255))
}

/// Whether `value` is a W3C date with a time zone, as pass.json dates are.
///
/// Seconds may be omitted (`2026-03-14T20:30+02:00`).
pub fn is_valid_w3c_date(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%:z").is_ok()
}
