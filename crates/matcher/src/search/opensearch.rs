//! OpenSearch / Elasticsearch `_search` client.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use collecta_core::config::OpenSearchConfig;
use collecta_rules::path::KEYWORD_SUFFIX;

use super::{PageRequest, SearchError, SearchIndex};

/// Search index reached over HTTP with reqwest.
pub struct OpenSearchIndex {
    client: reqwest::Client,
    base_url: String,
    index: String,
    cursor_field: String,
    credentials: Option<(String, String)>,
}

impl OpenSearchIndex {
    pub fn new(
        base_url: impl Into<String>,
        index: impl Into<String>,
        cursor_field: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Config(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            index: index.into(),
            cursor_field: cursor_field.into(),
            credentials: None,
        })
    }

    pub fn from_config(config: &OpenSearchConfig) -> Result<Self, SearchError> {
        let mut index = Self::new(&config.url, &config.index, &config.cursor_field, config.timeout())?;
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            index.credentials = Some((user.clone(), pass.clone()));
        }
        Ok(index)
    }

    fn search_url(&self) -> String {
        format!("{}/{}/_search", self.base_url, self.index)
    }

    /// Request body for one page.
    pub fn page_body(&self, request: &PageRequest<'_>) -> Value {
        let sort_field = format!("{}{}", self.cursor_field, KEYWORD_SUFFIX);
        let mut body = json!({
            "query": request.query.to_dsl(),
            "size": request.size,
            "sort": [{ sort_field: { "order": "desc" } }],
            "track_total_hits": true,
        });
        if let Some(after) = request.search_after {
            body["search_after"] = json!([after]);
        }
        body
    }
}

/// Pull `_source` out of every hit.
fn extract_sources(response: Value) -> Result<Vec<Value>, SearchError> {
    let hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Response("missing hits.hits array".to_string()))?;

    hits.iter()
        .map(|hit| {
            hit.get("_source")
                .cloned()
                .ok_or_else(|| SearchError::Response("hit without _source".to_string()))
        })
        .collect()
}

#[async_trait::async_trait]
impl SearchIndex for OpenSearchIndex {
    fn cursor_field(&self) -> &str {
        &self.cursor_field
    }

    async fn search_page(&self, request: PageRequest<'_>) -> Result<Vec<Value>, SearchError> {
        let body = self.page_body(&request);
        debug!(index = %self.index, size = request.size, after = ?request.search_after, "requesting search page");

        let mut builder = self.client.post(self.search_url()).json(&body);
        if let Some((user, pass)) = &self.credentials {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| SearchError::Response(e.to_string()))?;
        extract_sources(json)
    }
}
