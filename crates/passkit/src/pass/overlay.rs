//! Merging template properties with overrides into the final pass.json.

use super::category::{PassCategory, PassStyle};
use super::fields::FieldCollection;
use crate::schema::{self, filter_valid, is_valid, Barcode, Beacon, Location, Nfc, Overrides};
use crate::{Error, Result};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Keys holding `rgb(r, g, b)` colors.
pub const COLOR_KEYS: [&str; 3] = ["backgroundColor", "foregroundColor", "labelColor"];

/// Parse the template's pass.json into an object.
pub fn parse_pass_json(bytes: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Construction(format!(
            "pass.json must contain a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Top-level template properties, schema-checked.
///
/// Style objects are left out; they are handled by [`PassStyle`] and
/// [`FieldCollection`]. Known structured keys are validated: arrays keep
/// only their valid elements, other values are dropped when invalid.
/// Unknown keys pass through untouched.
pub fn template_props(pass_json: &Map<String, Value>) -> Map<String, Value> {
    let mut props = Map::new();

    for (key, value) in pass_json {
        if PassCategory::is_category_key(key) {
            continue;
        }
        let kept = match key.as_str() {
            "barcodes" => validated_array::<Barcode>(key, value),
            "beacons" => validated_array::<Beacon>(key, value),
            "locations" => validated_array::<Location>(key, value),
            "nfc" => validated_value::<Nfc>(key, value),
            "barcode" => validated_value::<Barcode>(key, value),
            "expirationDate" | "relevantDate" => validated_date(key, value),
            _ => Some(value.clone()),
        };
        if let Some(kept) = kept {
            props.insert(key.clone(), kept);
        }
    }

    props
}

fn validated_array<T: schema::Shape>(key: &str, value: &Value) -> Option<Value> {
    let Some(items) = value.as_array() else {
        warn!(key = %key, "dropping template property that is not an array");
        return None;
    };
    let filtered = filter_valid::<T>(items);
    if filtered.rejected > 0 {
        warn!(key = %key, shape = T::NAME, rejected = filtered.rejected, "dropping invalid template entries");
    }
    Some(Value::Array(filtered.accepted))
}

fn validated_value<T: schema::Shape>(key: &str, value: &Value) -> Option<Value> {
    if is_valid::<T>(value) {
        Some(value.clone())
    } else {
        warn!(key = %key, shape = T::NAME, "dropping invalid template property");
        None
    }
}

fn validated_date(key: &str, value: &Value) -> Option<Value> {
    if value.as_str().is_some_and(schema::is_valid_w3c_date) {
        Some(value.clone())
    } else {
        warn!(key = %key, "dropping template date that is not a W3C date");
        None
    }
}

/// Apply validated overrides over `props`; overrides win.
pub fn apply_overrides(props: &mut Map<String, Value>, overrides: Overrides) {
    for (key, value) in overrides.into_map() {
        debug!(key = %key, "applying override");
        props.insert(key, value);
    }
}

/// Remove color properties that are not valid `rgb()` strings.
pub fn drop_invalid_colors(props: &mut Map<String, Value>) {
    for key in COLOR_KEYS {
        let valid = match props.get(key) {
            None => continue,
            Some(value) => value.as_str().is_some_and(schema::is_valid_rgb),
        };
        if !valid {
            warn!(key = %key, "dropping invalid color");
            props.remove(key);
        }
    }
}

/// Serialize the final pass.json.
///
/// The merged `props` become the top level; the template's style object is
/// carried over with its field lists and style data rewritten. A property
/// cleared from `props` stays cleared even if the template declared it.
pub fn render_pass_json(
    template: &Map<String, Value>,
    props: &Map<String, Value>,
    style: &PassStyle,
    fields: &FieldCollection,
) -> Result<Vec<u8>> {
    let category = style.category();

    let mut pass_json = props.clone();
    pass_json.retain(|key, _| !PassCategory::is_category_key(key));
    drop_invalid_colors(&mut pass_json);

    let mut content = match template.get(category.key()) {
        Some(Value::Object(content)) => content.clone(),
        _ => Map::new(),
    };
    fields.write_into(&mut content)?;
    style.write_into(&mut content)?;
    pass_json.insert(category.key().to_string(), Value::Object(content));

    Ok(serde_json::to_vec(&Value::Object(pass_json))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::fields::FieldSlot;
    use crate::schema::{Field, TransitType};
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_pass_json_rejects_non_object() {
        assert!(matches!(parse_pass_json(b"[1, 2]"), Err(Error::Construction(_))));
        assert!(matches!(parse_pass_json(b"{ broken"), Err(Error::Json(_))));
    }

    #[test]
    fn test_template_props_excludes_style_and_filters_arrays() {
        let pass_json = object(json!({
            "formatVersion": 1,
            "storeCard": { "primaryFields": [] },
            "locations": [
                { "latitude": 1.0, "longitude": 2.0 },
                { "latitude": "x" },
                {}
            ],
            "nfc": { "message": 42 },
            "customKey": { "anything": true },
            "expirationDate": "soon",
            "relevantDate": "2026-05-01T09:00:00Z"
        }));
        let props = template_props(&pass_json);

        assert!(!props.contains_key("expirationDate"));
        assert_eq!(props["relevantDate"], json!("2026-05-01T09:00:00Z"));

        assert!(!props.contains_key("storeCard"));
        assert!(!props.contains_key("nfc"));
        assert_eq!(props["locations"], json!([{ "latitude": 1.0, "longitude": 2.0 }]));
        assert_eq!(props["formatVersion"], json!(1));
        assert_eq!(props["customKey"], json!({ "anything": true }));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut props = object(json!({ "serialNumber": "template", "description": "keep" }));
        let overrides = Overrides {
            serial_number: Some("override".into()),
            ..Default::default()
        };
        apply_overrides(&mut props, overrides);
        assert_eq!(props["serialNumber"], json!("override"));
        assert_eq!(props["description"], json!("keep"));
    }

    #[test]
    fn test_drop_invalid_colors() {
        let mut props = object(json!({
            "backgroundColor": "rgb(10,20,30)",
            "foregroundColor": "rgb(300,0,0)",
            "labelColor": 7
        }));
        drop_invalid_colors(&mut props);
        assert!(props.contains_key("backgroundColor"));
        assert!(!props.contains_key("foregroundColor"));
        assert!(!props.contains_key("labelColor"));
    }

    #[test]
    fn test_render_replaces_fields_and_keeps_style_extras() {
        let template = object(json!({
            "formatVersion": 1,
            "boardingPass": {
                "primaryFields": [{ "key": "old", "value": "x" }],
                "customStyleKey": "kept"
            },
            "coupon": {}
        }));
        let props = object(json!({ "formatVersion": 1, "serialNumber": "abc" }));
        let style = PassStyle::BoardingPass {
            transit_type: Some(TransitType::Train),
        };
        let mut fields = FieldCollection::new();
        fields.insert(FieldSlot::Primary, Field::new("from", "MIL")).unwrap();

        let bytes = render_pass_json(&template, &props, &style, &fields).unwrap();
        let rendered: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(rendered["serialNumber"], json!("abc"));
        assert!(rendered.get("coupon").is_none());
        let content = &rendered["boardingPass"];
        assert_eq!(content["customStyleKey"], json!("kept"));
        assert_eq!(content["transitType"], json!("PKTransitTypeTrain"));
        assert_eq!(content["primaryFields"], json!([{ "key": "from", "value": "MIL" }]));
    }

    #[test]
    fn test_render_boarding_pass_without_transit_type_fails() {
        let template = object(json!({ "boardingPass": {} }));
        let style = PassStyle::BoardingPass { transit_type: None };
        let result = render_pass_json(&template, &Map::new(), &style, &FieldCollection::new());
        assert!(matches!(result, Err(Error::TransitTypeRequired)));
    }

    #[test]
    fn test_render_drops_invalid_template_color() {
        let template = object(json!({ "generic": {}, "labelColor": "blue" }));
        let props = template_props(&template);
        let bytes =
            render_pass_json(&template, &props, &PassStyle::Generic, &FieldCollection::new()).unwrap();
        let rendered: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(rendered.get("labelColor").is_none());
    }
}
