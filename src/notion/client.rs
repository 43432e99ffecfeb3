//! Notion API client: page creation and toggle-block appends.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::DigestError;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const NOTION_VERSION: &str = "2022-06-28";

/// A named collapsible container holding one text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleBlock {
    pub header: String,
    pub body: String,
}

impl ToggleBlock {
    fn to_json(&self) -> Value {
        json!({
            "object": "block",
            "type": "toggle",
            "toggle": {
                "rich_text": [
                    {
                        "type": "text",
                        "text": {"content": self.header},
                        "annotations": {"bold": true, "color": "blue"}
                    }
                ],
                "children": [
                    {
                        "object": "block",
                        "type": "paragraph",
                        "paragraph": {
                            "rich_text": [{"type": "text", "text": {"content": self.body}}]
                        }
                    }
                ]
            }
        })
    }
}

pub trait DocumentStore {
    fn create_page(&self, parent_id: &str, title_property: &str, title: &str) -> Result<String>;
    fn append_block(&self, page_id: &str, block: &ToggleBlock) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct NotionPageResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotionErrorResponse {
    code: Option<String>,
    message: Option<String>,
}

fn api_error(api: &'static str, response: Response) -> DigestError {
    let status = response.status();
    let detail = response
        .json::<NotionErrorResponse>()
        .ok()
        .map(|e| {
            format!(
                "{}: {}",
                e.code.unwrap_or_else(|| "unknown".to_string()),
                e.message.unwrap_or_default()
            )
        })
        .unwrap_or_default();
    DigestError::api(api, Some(format!("http status {status} {detail}").trim().to_string()))
}

pub struct NotionClient {
    http: Client,
    api_base: String,
    token: String,
}

impl NotionClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "notion-version",
            reqwest::header::HeaderValue::from_static(NOTION_VERSION),
        );
        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to create notion api client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }
}

impl DocumentStore for NotionClient {
    fn create_page(&self, parent_id: &str, title_property: &str, title: &str) -> Result<String> {
        let mut properties = serde_json::Map::new();
        properties.insert(
            title_property.to_string(),
            json!({"title": [{"text": {"content": title}}]}),
        );
        let payload = json!({
            "parent": {"database_id": parent_id},
            "properties": properties,
        });

        let response = self
            .http
            .post(format!("{}/v1/pages", self.api_base))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .map_err(|err| DigestError::transport("pages.create", err))?;
        if !response.status().is_success() {
            return Err(api_error("pages.create", response).into());
        }
        let page: NotionPageResponse = response
            .json()
            .map_err(|err| DigestError::transport("pages.create", err))?;
        page.id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| DigestError::api("pages.create", Some("response missing page id".to_string())).into())
    }

    fn append_block(&self, page_id: &str, block: &ToggleBlock) -> Result<()> {
        let payload = json!({ "children": [block.to_json()] });
        let response = self
            .http
            .patch(format!("{}/v1/blocks/{page_id}/children", self.api_base))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .map_err(|err| DigestError::transport("blocks.children.append", err))?;
        if !response.status().is_success() {
            return Err(api_error("blocks.children.append", response).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentStore, NotionClient, ToggleBlock};
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn create_page_sets_title_property_and_returns_id() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/pages")
                .header("notion-version", "2022-06-28")
                .body_includes("\"database_id\":\"DB1\"")
                .body_includes("3월 2주차 업무 요약");
            then.status(200).json_body(json!({"object": "page", "id": "page-1"}));
        });

        let client = NotionClient::new(&server.base_url(), "secret").expect("client");
        let id = client
            .create_page("DB1", "이름", "3월 2주차 업무 요약 (2025-03-10)")
            .expect("create");
        assert_eq!(id, "page-1");
        create.assert_calls(1);
    }

    #[test]
    fn append_block_sends_toggle_with_paragraph_child() {
        let server = MockServer::start();
        let append = server.mock(|when, then| {
            when.method(PATCH)
                .path("/v1/blocks/page-1/children")
                .body_includes("\"type\":\"toggle\"")
                .body_includes("general 채널 요약")
                .body_includes("summary body");
            then.status(200).json_body(json!({"object": "list", "results": []}));
        });

        let client = NotionClient::new(&server.base_url(), "secret").expect("client");
        client
            .append_block(
                "page-1",
                &ToggleBlock {
                    header: "📂 general 채널 요약".to_string(),
                    body: "summary body".to_string(),
                },
            )
            .expect("append");
        append.assert_calls(1);
    }

    #[test]
    fn validation_error_surfaces_notion_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/pages");
            then.status(400).json_body(json!({
                "object": "error",
                "code": "validation_error",
                "message": "이름 is not a property that exists."
            }));
        });

        let client = NotionClient::new(&server.base_url(), "secret").expect("client");
        let err = client.create_page("DB1", "이름", "t").expect_err("should fail");
        assert!(format!("{err:#}").contains("validation_error"));
    }
}
