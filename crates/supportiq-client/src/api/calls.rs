//! Call-analysis endpoints (`/list`, `/entities`).

use serde_json::Value;

use crate::client::ApiClient;
use crate::error::Result;
use crate::request::ApiRequest;
use crate::types::{ListItem, ListPage, ListPayload};

/// Query parameters for listing calls.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Maximum number of items to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    /// Continuation token from a previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    /// Backend-side filter expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl ListQuery {
    fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(size) = self.page_size.filter(|s| *s > 0) {
            request = request.query("pageSize", size.to_string());
        }
        if let Some(token) = self.next_token.as_deref().filter(|t| !t.is_empty()) {
            request = request.query("nextToken", token);
        }
        if let Some(filter) = self.filter.as_deref().filter(|f| !f.is_empty()) {
            request = request.query("filter", filter);
        }
        request
    }
}

/// Path of one call record; the id is a single encoded segment.
fn item_path(id: &str) -> String {
    format!("list/{}", urlencoding::encode(id))
}

/// Calls API client.
pub struct CallsApi {
    client: ApiClient,
}

impl CallsApi {
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// List analysed calls.
    pub async fn list(&self, query: ListQuery) -> Result<ListPage> {
        let request = query.apply(ApiRequest::get("list"));
        let payload: ListPayload = self.client.request(request).await?.into_json()?;
        let page = ListPage::from(payload);
        tracing::debug!(items = page.items.len(), "Fetched call list");
        Ok(page)
    }

    /// Get one call by ID.
    pub async fn get(&self, id: &str) -> Result<ListItem> {
        self.client.get_json(&item_path(id)).await
    }

    /// Create a call record.
    pub async fn create(&self, item: &ListItem) -> Result<ListItem> {
        self.client.post_json("list", item).await
    }

    /// Replace fields on a call record.
    pub async fn update(&self, id: &str, updates: &ListItem) -> Result<ListItem> {
        self.client
            .put(&item_path(id), updates)
            .await?
            .into_json()
    }

    /// Delete a call record.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&item_path(id)).await?;
        Ok(())
    }

    /// Entity extraction summary. Shape is backend-defined.
    pub async fn entities(&self) -> Result<Value> {
        self.client.get_json("entities").await
    }
}
