//! Reusable data query

use crate::api::constants;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataQuery {
    pub collection: String,
    pub select: Vec<String>,
    /// Raw OData query fragment appended verbatim, e.g. `$filter=statecode eq 0`
    pub query: Option<String>,
}

impl DataQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Query string parameters in request order
    pub fn to_query_params(&self) -> Vec<String> {
        let mut params = Vec::new();

        if !self.select.is_empty() {
            let columns: Vec<String> = self
                .select
                .iter()
                .map(|c| urlencoding::encode(c.trim()).into_owned())
                .collect();
            params.push(format!("$select={}", columns.join(",")));
        }

        if let Some(fragment) = self.query.as_deref().map(|q| q.trim().trim_start_matches(['?', '&'])) {
            if !fragment.is_empty() {
                params.push(fragment.to_string());
            }
        }

        params
    }

    /// Full request URL for the first page
    pub fn to_url(&self, base_url: &str) -> String {
        let endpoint = constants::entity_endpoint(base_url, &self.collection);
        let params = self.to_query_params();
        if params.is_empty() {
            endpoint
        } else {
            format!("{}?{}", endpoint, params.join("&"))
        }
    }
}
