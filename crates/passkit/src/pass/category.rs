//! Pass styles.
//!
//! pass.json carries exactly one style key (`boardingPass`, `coupon`, ...)
//! whose object holds the field lists. Boarding passes additionally need a
//! transit type, which lives in the [`PassStyle::BoardingPass`] payload.

use crate::schema::TransitType;
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// The closed set of pass style keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassCategory {
    BoardingPass,
    Coupon,
    EventTicket,
    Generic,
    StoreCard,
}

impl PassCategory {
    /// Detection order when a template declares several styles.
    pub const ALL: [PassCategory; 5] = [
        PassCategory::BoardingPass,
        PassCategory::Coupon,
        PassCategory::EventTicket,
        PassCategory::Generic,
        PassCategory::StoreCard,
    ];

    /// The pass.json key of this style.
    pub fn key(&self) -> &'static str {
        match self {
            PassCategory::BoardingPass => "boardingPass",
            PassCategory::Coupon => "coupon",
            PassCategory::EventTicket => "eventTicket",
            PassCategory::Generic => "generic",
            PassCategory::StoreCard => "storeCard",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    pub fn is_category_key(key: &str) -> bool {
        Self::from_key(key).is_some()
    }

    /// Find the style declared by a pass.json object.
    pub fn detect(pass_json: &Map<String, Value>) -> Result<Self> {
        let mut declared = Self::ALL.into_iter().filter(|c| pass_json.contains_key(c.key()));
        let category = declared.next().ok_or(Error::MissingCategory)?;
        for extra in declared {
            warn!(
                kept = category.key(),
                ignored = extra.key(),
                "pass.json declares more than one style"
            );
        }
        Ok(category)
    }
}

impl fmt::Display for PassCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A pass style with its style-specific data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStyle {
    BoardingPass { transit_type: Option<TransitType> },
    Coupon,
    EventTicket,
    Generic,
    StoreCard,
}

impl PassStyle {
    /// Build the style from the template's style object.
    ///
    /// An unknown `transitType` in the template is dropped, leaving the
    /// boarding pass without one until the caller sets it.
    pub fn from_template(category: PassCategory, content: &Map<String, Value>) -> Self {
        match category {
            PassCategory::BoardingPass => {
                let transit_type = content.get("transitType").and_then(|v| {
                    let parsed = v.as_str().and_then(|s| s.parse::<TransitType>().ok());
                    if parsed.is_none() {
                        warn!(value = %v, "dropping invalid transitType from template");
                    }
                    parsed
                });
                PassStyle::BoardingPass { transit_type }
            }
            PassCategory::Coupon => PassStyle::Coupon,
            PassCategory::EventTicket => PassStyle::EventTicket,
            PassCategory::Generic => PassStyle::Generic,
            PassCategory::StoreCard => PassStyle::StoreCard,
        }
    }

    pub fn category(&self) -> PassCategory {
        match self {
            PassStyle::BoardingPass { .. } => PassCategory::BoardingPass,
            PassStyle::Coupon => PassCategory::Coupon,
            PassStyle::EventTicket => PassCategory::EventTicket,
            PassStyle::Generic => PassCategory::Generic,
            PassStyle::StoreCard => PassCategory::StoreCard,
        }
    }

    pub fn transit_type(&self) -> Option<TransitType> {
        match self {
            PassStyle::BoardingPass { transit_type } => *transit_type,
            _ => None,
        }
    }

    /// Set the transit type. Only boarding passes carry one.
    pub fn set_transit_type(&mut self, value: TransitType) -> Result<()> {
        match self {
            PassStyle::BoardingPass { transit_type } => {
                *transit_type = Some(value);
                Ok(())
            }
            other => Err(Error::Construction(format!(
                "{} passes do not have a transit type",
                other.category()
            ))),
        }
    }

    /// Write the style-specific keys into the style object.
    ///
    /// Fails with [`Error::TransitTypeRequired`] for a boarding pass that
    /// still has no transit type.
    pub fn write_into(&self, content: &mut Map<String, Value>) -> Result<()> {
        match self {
            PassStyle::BoardingPass { transit_type: None } => Err(Error::TransitTypeRequired),
            PassStyle::BoardingPass {
                transit_type: Some(transit_type),
            } => {
                content.insert(
                    "transitType".to_string(),
                    Value::String(transit_type.as_str().to_string()),
                );
                Ok(())
            }
            _ => {
                content.remove("transitType");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_detect_category() {
        let pass = object(json!({ "description": "x", "storeCard": {} }));
        assert_eq!(PassCategory::detect(&pass).unwrap(), PassCategory::StoreCard);
    }

    #[test]
    fn test_detect_missing_category() {
        let pass = object(json!({ "description": "x" }));
        assert!(matches!(PassCategory::detect(&pass), Err(Error::MissingCategory)));
    }

    #[test]
    fn test_detect_prefers_fixed_order() {
        let pass = object(json!({ "storeCard": {}, "coupon": {} }));
        assert_eq!(PassCategory::detect(&pass).unwrap(), PassCategory::Coupon);
    }

    #[test]
    fn test_boarding_pass_reads_transit_type() {
        let content = object(json!({ "transitType": "PKTransitTypeAir" }));
        let style = PassStyle::from_template(PassCategory::BoardingPass, &content);
        assert_eq!(style.transit_type(), Some(TransitType::Air));
    }

    #[test]
    fn test_boarding_pass_drops_invalid_transit_type() {
        let content = object(json!({ "transitType": "PKTransitTypeRocket" }));
        let style = PassStyle::from_template(PassCategory::BoardingPass, &content);
        assert_eq!(style, PassStyle::BoardingPass { transit_type: None });
    }

    #[test]
    fn test_write_requires_transit_type_for_boarding_pass() {
        let mut content = Map::new();
        let style = PassStyle::BoardingPass { transit_type: None };
        assert!(matches!(style.write_into(&mut content), Err(Error::TransitTypeRequired)));

        let mut style = style;
        style.set_transit_type(TransitType::Bus).unwrap();
        style.write_into(&mut content).unwrap();
        assert_eq!(content["transitType"], json!("PKTransitTypeBus"));
    }

    #[test]
    fn test_write_strips_transit_type_from_other_styles() {
        let mut content = object(json!({ "transitType": "PKTransitTypeAir" }));
        PassStyle::StoreCard.write_into(&mut content).unwrap();
        assert!(!content.contains_key("transitType"));
    }

    #[test]
    fn test_set_transit_type_on_coupon_fails() {
        let mut style = PassStyle::Coupon;
        assert!(style.set_transit_type(TransitType::Air).is_err());
    }
}
