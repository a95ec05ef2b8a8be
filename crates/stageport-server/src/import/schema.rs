//! Column schemas keyed by source type
//!
//! A schema is the ordered list of column mappings for one source type. Order
//! is positional: entry `i` describes column `i` of the staged file, ignored
//! columns included.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::{ImportError, ImportResult};

/// Marks a column as the alternate identifier of its object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdColumnType {
    HubspotAlternateId,
}

/// Positional rule mapping a source column to a destination property
///
/// Serialized with the bulk-import API's field names; absent optionals are
/// omitted so the mapping is passed through as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub column_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_object_type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_column_type: Option<IdColumnType>,
}

impl ColumnMapping {
    /// A column that is skipped on import but keeps its position
    pub fn ignored(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            column_object_type_id: None,
            property_name: None,
            ignored: true,
            id_column_type: None,
        }
    }

    pub fn property(column_name: impl Into<String>, property_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            column_object_type_id: None,
            property_name: Some(property_name.into()),
            ignored: false,
            id_column_type: None,
        }
    }

    pub fn with_object_type(mut self, object_type_id: impl Into<String>) -> Self {
        self.column_object_type_id = Some(object_type_id.into());
        self
    }

    pub fn as_alternate_id(mut self) -> Self {
        self.id_column_type = Some(IdColumnType::HubspotAlternateId);
        self
    }

    pub fn is_alternate_id(&self) -> bool {
        self.id_column_type == Some(IdColumnType::HubspotAlternateId)
    }

    /// Either ignored without a property, or mapped to a property
    pub fn validate(&self) -> Result<(), String> {
        if self.column_name.is_empty() {
            return Err("column name must not be empty".to_string());
        }
        match (self.ignored, &self.property_name) {
            (true, Some(property)) => Err(format!(
                "column '{}' is ignored but maps to property '{}'",
                self.column_name, property
            )),
            (false, None) => Err(format!(
                "column '{}' needs a propertyName or ignored = true",
                self.column_name
            )),
            _ => Ok(()),
        }
    }
}

/// Immutable lookup from source type to its column mappings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Vec<ColumnMapping>>,
}

impl SchemaRegistry {
    /// Validate every mapping and freeze the registry
    pub fn new(schemas: BTreeMap<String, Vec<ColumnMapping>>) -> ImportResult<Self> {
        for (source_type, mappings) in &schemas {
            if mappings.is_empty() {
                return Err(ImportError::config(format!(
                    "schema for source type '{}' has no columns",
                    source_type
                )));
            }
            for mapping in mappings {
                mapping.validate().map_err(|reason| {
                    ImportError::config(format!("schema '{}': {}", source_type, reason))
                })?;
            }
        }

        Ok(Self { schemas })
    }

    pub fn get(&self, source_type: &str) -> ImportResult<&[ColumnMapping]> {
        self.schemas
            .get(source_type)
            .map(Vec::as_slice)
            .ok_or_else(|| ImportError::UnknownSourceType {
                source_type: source_type.to_string(),
                file_name: None,
            })
    }

    pub fn contains(&self, source_type: &str) -> bool {
        self.schemas.contains_key(source_type)
    }

    pub fn source_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn widgets() -> Vec<ColumnMapping> {
        vec![ColumnMapping::ignored("A"), ColumnMapping::property("B", "x")]
    }

    #[test]
    fn test_get_returns_mappings_in_order() {
        let registry =
            SchemaRegistry::new(BTreeMap::from([("widgets".to_string(), widgets())])).unwrap();

        assert_eq!(registry.get("widgets").unwrap(), widgets().as_slice());
        assert!(registry.contains("widgets"));
    }

    #[test]
    fn test_get_unknown_source_type() {
        let registry = SchemaRegistry::default();
        let err = registry.get("gadgets").unwrap_err();
        assert!(matches!(
            err,
            ImportError::UnknownSourceType { ref source_type, file_name: None } if source_type == "gadgets"
        ));
    }

    #[test]
    fn test_rejects_ignored_column_with_property() {
        let mut bad = ColumnMapping::ignored("A");
        bad.property_name = Some("x".to_string());
        let result = SchemaRegistry::new(BTreeMap::from([("widgets".to_string(), vec![bad])]));
        assert!(matches!(result, Err(ImportError::Config(_))));
    }

    #[test]
    fn test_rejects_unmapped_column() {
        let mut bad = ColumnMapping::property("B", "x");
        bad.property_name = None;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_wire_format_omits_absent_fields() {
        let mappings = vec![
            ColumnMapping::ignored("A"),
            ColumnMapping::property("Key_Number", "key_number")
                .with_object_type("0-8")
                .as_alternate_id(),
        ];

        assert_eq!(
            serde_json::to_value(&mappings).unwrap(),
            json!([
                { "columnName": "A", "ignored": true },
                {
                    "columnName": "Key_Number",
                    "columnObjectTypeId": "0-8",
                    "propertyName": "key_number",
                    "idColumnType": "HUBSPOT_ALTERNATE_ID"
                }
            ])
        );
        assert!(mappings[1].is_alternate_id());
    }
}
