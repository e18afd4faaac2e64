//! Column naming
//!
//! Dynamics returns lookup columns as `_<name>_value` and, when asked for
//! annotations, display values as `<name>@OData.Community.Display.V1.FormattedValue`.
//! Neither is a valid storage column name, so every raw property name is
//! mapped once per run:
//!
//! | raw                                                   | output                        |
//! |-------------------------------------------------------|-------------------------------|
//! | `_parentaccountid_value`                              | `fk_parentaccountid_value`    |
//! | `statuscode@OData.Community.Display.V1.FormattedValue` | `statuscode_formattedValue`  |
//! | `_ownerid_value@OData.Community.Display.V1.FormattedValue` | `fk_ownerid_value_formattedValue` |
//! | `@odata.etag`                                         | dropped                       |
//! | `name`                                                | `name`                        |

use crate::api::constants::FORMATTED_VALUE_ANNOTATION;
use crate::api::query::result::Row;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Prefix marking lookup (foreign-key style) columns
pub const REFERENCE_PREFIX: &str = "fk";

/// Suffix replacing the formatted-value annotation
pub const FORMATTED_VALUE_SUFFIX: &str = "_formattedValue";

const ODATA_ANNOTATION_MARKER: &str = "@odata";

fn is_formatted_value(name: &str) -> bool {
    name.contains(FORMATTED_VALUE_ANNOTATION)
}

fn shorten_formatted_value(name: &str) -> String {
    format!("{}{}", name.replace(FORMATTED_VALUE_ANNOTATION, ""), FORMATTED_VALUE_SUFFIX)
}

/// Output column name for a raw property name, `None` when the property is never written
pub fn map_column_name(raw: &str) -> Option<String> {
    if raw.starts_with('_') {
        let cleaned = if is_formatted_value(raw) {
            shorten_formatted_value(raw)
        } else {
            raw.to_string()
        };
        Some(format!("{}{}", REFERENCE_PREFIX, cleaned))
    } else if is_formatted_value(raw) {
        Some(shorten_formatted_value(raw))
    } else if raw.contains(ODATA_ANNOTATION_MARKER) {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Frozen mapping from raw property names to output column names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl ColumnMap {
    /// Build the map from the union of keys across all rows.
    ///
    /// Keys are ordered by raw name, so the result depends only on the set of
    /// keys and not on row order.
    pub fn from_rows(rows: &[Row]) -> Self {
        let keys: BTreeSet<&str> = rows.iter().flat_map(|row| row.keys().map(String::as_str)).collect();
        Self::from_sorted_keys(keys)
    }

    pub fn from_keys<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::from_sorted_keys(keys.into_iter().collect())
    }

    fn from_sorted_keys(keys: BTreeSet<&str>) -> Self {
        let mut entries = Vec::new();
        let mut index = HashMap::new();
        let mut taken = HashSet::new();

        for raw in keys {
            let Some(mapped) = map_column_name(raw) else {
                continue;
            };
            if !taken.insert(mapped.clone()) {
                log::warn!("Column \"{}\" maps to already used name \"{}\", skipping it", raw, mapped);
                continue;
            }
            index.insert(raw.to_string(), entries.len());
            entries.push((raw.to_string(), mapped));
        }

        Self { entries, index }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, raw: &str) -> Option<&str> {
        self.index.get(raw).map(|&i| self.entries[i].1.as_str())
    }

    /// Output column names in header order
    pub fn columns(&self) -> Vec<String> {
        self.entries.iter().map(|(_, mapped)| mapped.clone()).collect()
    }

    /// Render a row in header order; unknown keys are ignored, missing ones are empty
    pub fn project(&self, row: &Row) -> Vec<String> {
        self.entries
            .iter()
            .map(|(raw, _)| row.get(raw).map(render_value).unwrap_or_default())
            .collect()
    }

    /// Number of keys in the row that have no column in this map
    pub fn unmapped_keys(&self, row: &Row) -> usize {
        row.keys()
            .filter(|k| !self.index.contains_key(k.as_str()) && map_column_name(k).is_some())
            .count()
    }
}

/// CSV cell text for a JSON value
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
