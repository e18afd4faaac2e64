//! Page handling
//!
//! Parses one OData collection response into rows and a continuation link.

use crate::api::constants::NEXT_LINK_KEY;
use crate::error::{ExtractorError, Result};
use serde_json::{Map, Value};

/// A row as returned by the service, keyed by raw property name
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub rows: Vec<Row>,
    pub next_link: Option<String>,
}

impl Page {
    /// Parse an OData collection response body
    pub fn from_json(json: Value) -> Result<Self> {
        let Value::Object(mut envelope) = json else {
            return Err(ExtractorError::Metadata("Page response is not a JSON object".to_string()));
        };

        let values = match envelope.remove("value") {
            Some(Value::Array(values)) => values,
            _ => {
                return Err(ExtractorError::Metadata(
                    "Missing or invalid 'value' array in response".to_string(),
                ));
            }
        };

        let rows = values
            .into_iter()
            .map(|value| match value {
                Value::Object(row) => Ok(row),
                other => Err(ExtractorError::Metadata(format!("Unexpected row in page: {}", other))),
            })
            .collect::<Result<Vec<Row>>>()?;

        let next_link = envelope
            .get(NEXT_LINK_KEY)
            .and_then(|n| n.as_str())
            .filter(|n| !n.is_empty())
            .map(|s| s.to_string());

        Ok(Self { rows, next_link })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check if the server announced more results
    pub fn has_more(&self) -> bool {
        self.next_link.is_some()
    }
}
