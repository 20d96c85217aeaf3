use crate::error::{Result, WikiDbError};
use derive_more::derive::Display;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply body of a successful write.
pub const ACK: &str = "ok";

// row shape of the get-page statement: (id, content)
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("page #{}", id)]
pub struct DbPage {
    pub id: i64,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AllPagesReply {
    pub pages: Vec<String>,
}

/// Reply body of `get-page`. `id` and `rawContent` are only present when the
/// page was found.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PageLookup {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(
        rename = "rawContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub raw_content: Option<String>,
}

impl PageLookup {
    pub fn not_found() -> Self {
        Self {
            found: false,
            id: None,
            raw_content: None,
        }
    }
}

impl From<Option<DbPage>> for PageLookup {
    fn from(row: Option<DbPage>) -> Self {
        match row {
            Some(page) => Self {
                found: true,
                id: Some(page.id),
                raw_content: Some(page.content),
            },
            None => Self::not_found(),
        }
    }
}

// request bodies: every field is optional, missing values reach the
// statement as NULL and fail there

#[derive(Deserialize, Debug, Default)]
pub struct GetPageRequest {
    pub page: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct CreatePageRequest {
    pub title: Option<String>,
    pub markdown: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdatePageRequest {
    pub id: Option<PageIdField>,
    // accepted but not written, updates never rename a page
    #[allow(dead_code)]
    pub title: Option<String>,
    pub markdown: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct DeletePageRequest {
    pub id: Option<PageIdField>,
}

/// Page ids arrive as numbers or as numeric strings (form posts).
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum PageIdField {
    Number(i64),
    Text(String),
}

impl PageIdField {
    pub fn resolve(&self) -> Result<i64> {
        match self {
            PageIdField::Number(id) => Ok(*id),
            PageIdField::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| WikiDbError::Parameter(format!("Invalid page id: {}", text))),
        }
    }
}

pub fn required_id(id: Option<&PageIdField>) -> Result<i64> {
    id.ok_or_else(|| WikiDbError::Parameter("Missing page id".to_string()))?
        .resolve()
}

/// Decodes a request body, treating `null` as an empty object.
pub fn parse_body<T: DeserializeOwned + Default>(body: Value) -> Result<T> {
    if body.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(body)
        .map_err(|e| WikiDbError::Parameter(format!("Malformed request body: {}", e)))
}
