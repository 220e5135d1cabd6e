//! Response payloads for the dashboard endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One analysed call recording.
///
/// The backend returns loosely-shaped records; well-known fields are typed
/// and everything else is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ListItem {
    /// Best human label: job name, then name, then id.
    pub fn label(&self) -> &str {
        self.job_name
            .as_deref()
            .or(self.name.as_deref())
            .or(self.id.as_deref())
            .unwrap_or("(unnamed)")
    }
}

/// One page of list results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    pub items: Vec<ListItem>,
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub page_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// The list endpoint answers with either a bare array or a wrapped page.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListPayload {
    Items(Vec<ListItem>),
    Page(ListPage),
}

impl From<ListPayload> for ListPage {
    fn from(payload: ListPayload) -> Self {
        match payload {
            ListPayload::Items(items) => ListPage {
                total_count: items.len(),
                page_size: items.len(),
                next_token: None,
                items,
            },
            ListPayload::Page(page) => page,
        }
    }
}
