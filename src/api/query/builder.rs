//! DataQueryBuilder for fluent query construction

use super::query::DataQuery;

#[derive(Debug, Clone)]
pub struct DataQueryBuilder {
    query: DataQuery,
}

impl DataQueryBuilder {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            query: DataQuery::new(collection),
        }
    }

    /// Select specific columns
    pub fn select<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.query.select = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    /// Append a column to the selection unless already present
    pub fn ensure_selected(mut self, column: &str) -> Self {
        if !self.query.select.is_empty() && !self.query.select.iter().any(|c| c == column) {
            self.query.select.push(column.to_string());
        }
        self
    }

    /// Attach a raw query fragment
    pub fn raw_query(mut self, fragment: Option<&str>) -> Self {
        self.query.query = fragment.filter(|f| !f.trim().is_empty()).map(str::to_string);
        self
    }

    pub fn build(self) -> DataQuery {
        self.query
    }
}
