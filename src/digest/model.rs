use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub id: String,
    pub name: String,
}

impl ChannelDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One chat message as returned by the provider and as persisted in artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

impl Message {
    pub fn is_thread_root(&self) -> bool {
        self.thread_ts.as_deref() == Some(self.ts.as_str()) && self.reply_count.unwrap_or(0) > 0
    }

    pub fn is_reply(&self) -> bool {
        self.thread_ts
            .as_deref()
            .is_some_and(|thread_ts| thread_ts != self.ts)
    }

    pub fn author_label(&self) -> &str {
        self.user
            .as_deref()
            .or(self.username.as_deref())
            .or(self.bot_id.as_deref())
            .filter(|value| !value.trim().is_empty())
            .unwrap_or("User")
    }
}

pub type Transcript = Vec<Message>;

/// Read-only user id to display name mapping built once per run.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    names: HashMap<String, String>,
}

impl IdentityMap {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self { names }
    }

    pub fn display_name<'a>(&'a self, user_id: &'a str) -> &'a str {
        self.names
            .get(user_id)
            .map(String::as_str)
            .unwrap_or(user_id)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.names.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Published,
    Collected,
    CollectFailed,
    MissingArtifact,
    SummarizeFailed,
    PublishFailed,
}

impl ChannelStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Collected => "collected",
            Self::CollectFailed => "collect_failed",
            Self::MissingArtifact => "missing_artifact",
            Self::SummarizeFailed => "summarize_failed",
            Self::PublishFailed => "publish_failed",
        }
    }

    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Published | Self::Collected)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelOutcome {
    pub channel: ChannelDescriptor,
    pub status: ChannelStatus,
    pub message_count: usize,
    pub artifact_path: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutcome {
    pub report_title: Option<String>,
    pub report_page_id: Option<String>,
    pub identities_resolved: usize,
    pub channels: Vec<ChannelOutcome>,
    pub archived: usize,
    pub archive_failures: usize,
}

impl RunOutcome {
    pub fn failed_channels(&self) -> usize {
        self.channels
            .iter()
            .filter(|outcome| outcome.status.is_failure())
            .count()
    }
}
