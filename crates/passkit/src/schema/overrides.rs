//! Caller-supplied overrides of top-level pass.json keys.
//!
//! Only a fixed set of keys can be overridden. Anything else is dropped while
//! validating; a whitelisted key whose value has the wrong shape is dropped
//! too. Neither case is an error.

use super::{filter_valid, is_valid, is_valid_rgb, is_valid_w3c_date, Barcode, Beacon, Location, Nfc, Shape};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Keys an [`Overrides`] record may carry.
pub const OVERRIDABLE_KEYS: &[&str] = &[
    "serialNumber",
    "description",
    "organizationName",
    "passTypeIdentifier",
    "teamIdentifier",
    "appLaunchURL",
    "associatedStoreIdentifiers",
    "userInfo",
    "webServiceURL",
    "authenticationToken",
    "sharingProhibited",
    "backgroundColor",
    "foregroundColor",
    "labelColor",
    "groupingIdentifier",
    "suppressStripShine",
    "logoText",
    "maxDistance",
    "semantics",
    "expirationDate",
    "voided",
    "relevantDate",
    "beacons",
    "locations",
    "barcodes",
    "nfc",
];

const MIN_AUTHENTICATION_TOKEN_LEN: usize = 16;

/// Validated overrides, applied over the template's properties.
///
/// Build one in code with the struct fields, or from untrusted JSON with
/// [`Overrides::from_json`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_type_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_identifier: Option<String>,
    #[serde(default, rename = "appLaunchURL", skip_serializing_if = "Option::is_none")]
    pub app_launch_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_store_identifiers: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<Value>,
    #[serde(default, rename = "webServiceURL", skip_serializing_if = "Option::is_none")]
    pub web_service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharing_prohibited: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_strip_shine: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantics: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voided: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beacons: Option<Vec<Beacon>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Location>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcodes: Option<Vec<Barcode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfc: Option<Nfc>,
}

impl Overrides {
    /// Validate untrusted JSON into overrides.
    ///
    /// Fails only when `value` is not a JSON object. Unknown keys and
    /// values of the wrong shape are dropped and logged.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            Error::Construction(format!("overrides must be a JSON object, got {value}"))
        })?;

        let mut clean = Map::new();
        for (key, value) in object {
            if !OVERRIDABLE_KEYS.contains(&key.as_str()) {
                debug!(key = %key, "dropping override key outside the whitelist");
                continue;
            }
            match validate_value(key, value) {
                Some(valid) => {
                    clean.insert(key.clone(), valid);
                }
                None => warn!(key = %key, "dropping override with invalid value"),
            }
        }

        if clean.contains_key("webServiceURL") && !clean.contains_key("authenticationToken") {
            warn!("dropping webServiceURL override without authenticationToken");
            clean.remove("webServiceURL");
        }

        Ok(serde_json::from_value(Value::Object(clean))?)
    }

    /// The overrides as pass.json keys, omitting unset ones.
    pub fn into_map(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Shape-check one whitelisted key, returning the value to keep.
fn validate_value(key: &str, value: &Value) -> Option<Value> {
    let valid = match key {
        "beacons" => return filtered_array::<Beacon>(key, value),
        "locations" => return filtered_array::<Location>(key, value),
        "barcodes" => return filtered_array::<Barcode>(key, value),
        "nfc" => is_valid::<Nfc>(value),
        "associatedStoreIdentifiers" => value
            .as_array()
            .is_some_and(|ids| ids.iter().all(|id| id.is_u64())),
        "userInfo" | "semantics" => value.is_object() || value.is_array(),
        "sharingProhibited" | "suppressStripShine" | "voided" => value.is_boolean(),
        "maxDistance" => value.as_f64().is_some_and(|d| d > 0.0),
        "authenticationToken" => value
            .as_str()
            .is_some_and(|t| t.len() >= MIN_AUTHENTICATION_TOKEN_LEN),
        "webServiceURL" => value
            .as_str()
            .is_some_and(|url| url.starts_with("https://") || url.starts_with("http://")),
        "expirationDate" | "relevantDate" => value.as_str().is_some_and(is_valid_w3c_date),
        "backgroundColor" | "foregroundColor" | "labelColor" => {
            value.as_str().is_some_and(is_valid_rgb)
        }
        _ => value.is_string(),
    };
    valid.then(|| value.clone())
}

fn filtered_array<T: Shape>(key: &str, value: &Value) -> Option<Value> {
    let items = value.as_array()?;
    let filtered = filter_valid::<T>(items);
    if filtered.rejected > 0 {
        warn!(key = %key, shape = T::NAME, rejected = filtered.rejected, "dropping invalid override entries");
    }
    Some(Value::Array(filtered.accepted))
}
