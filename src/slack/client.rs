//! Slack Web API client for the user directory and channel history reads.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::digest::model::Message;
use crate::error::DigestError;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const HISTORY_PAGE_LIMIT: u32 = 200;
const MAX_HISTORY_PAGES: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryMember {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
}

/// One page of the user directory. `ok=false` ends pagination without being an error.
#[derive(Debug, Clone, Default)]
pub struct UserPage {
    pub ok: bool,
    pub members: Vec<DirectoryMember>,
    pub next_cursor: Option<String>,
    pub error: Option<String>,
}

pub trait ChatProvider {
    fn list_users(&self, cursor: Option<&str>, limit: u32) -> Result<UserPage>;
    /// Every message with `ts >= oldest`, in provider order.
    fn history(&self, channel_id: &str, oldest: &str) -> Result<Vec<Message>>;
    /// The full thread; the first entry is the root itself.
    fn replies(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<Message>>;
    /// At most `limit` messages with `ts >= oldest`, from a single request.
    fn recent(&self, channel_id: &str, oldest: &str, limit: u32) -> Result<Vec<Message>>;
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackUsersListResponse {
    ok: bool,
    #[serde(default)]
    members: Vec<DirectoryMember>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackMessagesResponse {
    ok: bool,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
    #[serde(default)]
    error: Option<String>,
}

fn next_cursor(meta: Option<ResponseMetadata>) -> Option<String> {
    meta.and_then(|m| m.next_cursor)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

pub struct SlackClient {
    http: Client,
    api_base: String,
    token: String,
}

impl SlackClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("chat-digest"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to create slack api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        api: &'static str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .http
            .get(format!("{}/{api}", self.api_base))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .map_err(|err| DigestError::transport(api, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::api(api, Some(format!("http status {status}"))).into());
        }
        let parsed = response
            .json::<T>()
            .map_err(|err| DigestError::transport(api, err))?;
        Ok(parsed)
    }

    /// Follow the cursor to the end. `repeated_root` is the thread parent that
    /// Slack echoes at the top of every replies page; only the first copy is kept.
    fn collect_messages(
        &self,
        api: &'static str,
        base_query: Vec<(&'static str, String)>,
        repeated_root: Option<&str>,
    ) -> Result<Vec<Message>> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        for page_idx in 0..MAX_HISTORY_PAGES {
            let mut query = base_query.clone();
            query.push(("limit", HISTORY_PAGE_LIMIT.to_string()));
            if let Some(cursor) = &cursor {
                query.push(("cursor", cursor.clone()));
            }
            let page: SlackMessagesResponse = self.get_json(api, &query)?;
            if !page.ok {
                return Err(DigestError::api(api, page.error).into());
            }
            match repeated_root {
                Some(root) if page_idx > 0 => {
                    out.extend(page.messages.into_iter().filter(|m| m.ts != root));
                }
                _ => out.extend(page.messages),
            }
            cursor = next_cursor(page.response_metadata);
            if cursor.is_none() {
                return Ok(out);
            }
        }
        tracing::warn!(api, pages = MAX_HISTORY_PAGES, "stopped paging at page cap");
        Ok(out)
    }
}

impl ChatProvider for SlackClient {
    fn list_users(&self, cursor: Option<&str>, limit: u32) -> Result<UserPage> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(cursor) = cursor.filter(|c| !c.trim().is_empty()) {
            query.push(("cursor", cursor.to_string()));
        }
        let response: SlackUsersListResponse = self.get_json("users.list", &query)?;
        Ok(UserPage {
            ok: response.ok,
            members: response.members,
            next_cursor: next_cursor(response.response_metadata),
            error: response.error,
        })
    }

    fn history(&self, channel_id: &str, oldest: &str) -> Result<Vec<Message>> {
        self.collect_messages(
            "conversations.history",
            vec![
                ("channel", channel_id.to_string()),
                ("oldest", oldest.to_string()),
            ],
            None,
        )
    }

    fn recent(&self, channel_id: &str, oldest: &str, limit: u32) -> Result<Vec<Message>> {
        let api = "conversations.history";
        let query = [
            ("channel", channel_id.to_string()),
            ("oldest", oldest.to_string()),
            ("limit", limit.to_string()),
        ];
        let page: SlackMessagesResponse = self.get_json(api, &query)?;
        if !page.ok {
            return Err(DigestError::api(api, page.error).into());
        }
        let mut messages = page.messages;
        messages.truncate(limit as usize);
        Ok(messages)
    }

    fn replies(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<Message>> {
        self.collect_messages(
            "conversations.replies",
            vec![
                ("channel", channel_id.to_string()),
                ("ts", thread_ts.to_string()),
            ],
            Some(thread_ts),
        )
    }
}
