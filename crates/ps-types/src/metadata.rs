//! Parameter metadata: the qualifying fields (unit, component, reaction,
//! target unit) that narrow a canonical parameter down to concrete
//! coefficient entries.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::SensitivityError;

/// One component of a coefficient index.
///
/// Unit and reaction identifiers are usually integers; components, utilities
/// and heat levels are names. UI-produced records may carry unit uids as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum IndexPart {
    Int(i64),
    Text(String),
}

impl IndexPart {
    /// Interpret a loosely-typed record field as an index part.
    ///
    /// Integral floats (as produced by spreadsheet exports) become `Int`.
    /// Null, booleans and containers yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Int(i))
                } else {
                    let f = n.as_f64()?;
                    (f.fract() == 0.0 && f.is_finite()).then(|| Self::Int(f as i64))
                }
            }
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for IndexPart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&value).ok_or_else(|| {
            serde::de::Error::custom(format!("expected an integer or a name, found {value}"))
        })
    }
}

/// Null and blank strings mean "not given"; anything else must be a valid
/// index part.
fn optional_part<'de, D>(deserializer: D) -> Result<Option<IndexPart>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(None),
        _ => IndexPart::from_json(&value).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("expected an integer or a name, found {value}"))
        }),
    }
}

impl fmt::Display for IndexPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for IndexPart {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for IndexPart {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<&str> for IndexPart {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for IndexPart {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// The metadata fields update routines know how to consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    UnitNumber,
    TargetUnit,
    Component,
    ReactionNumber,
}

impl MetadataField {
    /// Canonical field name used downstream of the sweep expander.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnitNumber => "Unit_Number",
            Self::TargetUnit => "Target_Unit",
            Self::Component => "Component",
            Self::ReactionNumber => "Reaction_Number",
        }
    }
}

/// Metadata block carried alongside a parameter range through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterMetadata {
    #[serde(
        rename = "Unit_Number",
        default,
        deserialize_with = "optional_part",
        skip_serializing_if = "Option::is_none"
    )]
    pub unit_number: Option<IndexPart>,
    #[serde(
        rename = "Target_Unit",
        default,
        deserialize_with = "optional_part",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_unit: Option<IndexPart>,
    #[serde(
        rename = "Component",
        default,
        deserialize_with = "optional_part",
        skip_serializing_if = "Option::is_none"
    )]
    pub component: Option<IndexPart>,
    #[serde(
        rename = "Reaction_Number",
        default,
        deserialize_with = "optional_part",
        skip_serializing_if = "Option::is_none"
    )]
    pub reaction_number: Option<IndexPart>,
    /// Any further descriptive fields, passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ParameterMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(mut self, unit: impl Into<IndexPart>) -> Self {
        self.unit_number = Some(unit.into());
        self
    }

    pub fn with_target_unit(mut self, unit: impl Into<IndexPart>) -> Self {
        self.target_unit = Some(unit.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<IndexPart>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_reaction(mut self, reaction: impl Into<IndexPart>) -> Self {
        self.reaction_number = Some(reaction.into());
        self
    }

    pub fn get(&self, field: MetadataField) -> Option<&IndexPart> {
        match field {
            MetadataField::UnitNumber => self.unit_number.as_ref(),
            MetadataField::TargetUnit => self.target_unit.as_ref(),
            MetadataField::Component => self.component.as_ref(),
            MetadataField::ReactionNumber => self.reaction_number.as_ref(),
        }
    }

    /// Fetch a field an update routine cannot work without.
    pub fn require(
        &self,
        field: MetadataField,
        label: &str,
    ) -> Result<IndexPart, SensitivityError> {
        self.get(field)
            .cloned()
            .ok_or_else(|| SensitivityError::MissingMetadata {
                label: label.to_string(),
                field: field.as_str().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn index_part_from_loose_json() {
        assert_eq!(IndexPart::from_json(&json!(7)), Some(IndexPart::Int(7)));
        assert_eq!(IndexPart::from_json(&json!(7.0)), Some(IndexPart::Int(7)));
        assert_eq!(IndexPart::from_json(&json!(7.5)), None);
        assert_eq!(
            IndexPart::from_json(&json!("CO2")),
            Some(IndexPart::Text("CO2".into()))
        );
        assert_eq!(IndexPart::from_json(&json!(null)), None);
        assert_eq!(IndexPart::from_json(&json!("  ")), None);
    }

    #[test]
    fn metadata_uses_canonical_field_names() {
        let meta = ParameterMetadata::new().with_unit(7).with_component("CO2");
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value, json!({"Unit_Number": 7, "Component": "CO2"}));
    }

    #[test]
    fn metadata_keeps_unknown_fields() {
        let meta: ParameterMetadata = serde_json::from_value(json!({
            "Unit_Number": 3,
            "Reaction_Number": "R1",
            "Comment": "from sheet 2"
        }))
        .unwrap();
        assert_eq!(meta.unit_number, Some(IndexPart::Int(3)));
        assert_eq!(meta.reaction_number, Some(IndexPart::Text("R1".into())));
        assert_eq!(meta.extra.get("Comment"), Some(&json!("from sheet 2")));
    }

    #[test]
    fn blank_metadata_strings_are_absent() {
        let meta: ParameterMetadata = serde_json::from_value(json!({
            "Unit_Number": 7,
            "Component": "",
            "Target_Unit": "   ",
            "Reaction_Number": null
        }))
        .unwrap();
        assert_eq!(meta.unit_number, Some(IndexPart::Int(7)));
        assert_eq!(meta.component, None);
        assert_eq!(meta.target_unit, None);
        assert_eq!(meta.reaction_number, None);
        assert!(meta.extra.is_empty());

        assert!(serde_json::from_value::<ParameterMetadata>(json!({"Component": true})).is_err());
    }

    #[test]
    fn index_part_deserializes_integral_floats() {
        let part: IndexPart = serde_json::from_value(json!(4.0)).unwrap();
        assert_eq!(part, IndexPart::Int(4));
        assert!(serde_json::from_value::<IndexPart>(json!(4.5)).is_err());
    }

    #[test]
    fn require_names_missing_field() {
        let meta = ParameterMetadata::new().with_unit(2);
        let err = meta
            .require(MetadataField::Component, "Yield factor (xi)")
            .unwrap_err();
        assert_eq!(
            err,
            SensitivityError::MissingMetadata {
                label: "Yield factor (xi)".into(),
                field: "Component".into(),
            }
        );
        assert_eq!(
            meta.require(MetadataField::UnitNumber, "x").unwrap(),
            IndexPart::Int(2)
        );
    }
}
