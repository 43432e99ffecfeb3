//! In-process fakes for the external collaborators.

use crate::digest::model::Message;
use crate::llm::provider::{ChatTurn, SummaryModel};
use crate::notion::client::{DocumentStore, ToggleBlock};
use crate::slack::client::{ChatProvider, DirectoryMember, UserPage};
use anyhow::{Result, anyhow};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

pub fn msg(user: &str, text: &str, ts: &str) -> Message {
    Message {
        user: Some(user.to_string()),
        text: text.to_string(),
        ts: ts.to_string(),
        ..Message::default()
    }
}

pub fn root(user: &str, text: &str, ts: &str, reply_count: u32) -> Message {
    Message {
        thread_ts: Some(ts.to_string()),
        reply_count: Some(reply_count),
        ..msg(user, text, ts)
    }
}

pub fn reply(user: &str, text: &str, ts: &str, thread_ts: &str) -> Message {
    Message {
        thread_ts: Some(thread_ts.to_string()),
        ..msg(user, text, ts)
    }
}

#[derive(Default)]
pub struct FakeChat {
    pub users: Vec<DirectoryMember>,
    pub history: HashMap<String, Vec<Message>>,
    pub replies: HashMap<String, Vec<Message>>,
    pub failing_channels: HashSet<String>,
    pub failing_threads: HashSet<String>,
    pub history_calls: RefCell<Vec<(String, String)>>,
    pub reply_calls: RefCell<Vec<String>>,
    pub recent_limits: RefCell<Vec<u32>>,
}

impl FakeChat {
    pub fn with_user(mut self, id: &str, real_name: &str) -> Self {
        self.users.push(DirectoryMember {
            id: id.to_string(),
            name: None,
            real_name: Some(real_name.to_string()),
        });
        self
    }

    pub fn with_history(mut self, channel_id: &str, messages: Vec<Message>) -> Self {
        self.history.insert(channel_id.to_string(), messages);
        self
    }

    pub fn with_replies(mut self, thread_ts: &str, messages: Vec<Message>) -> Self {
        self.replies.insert(thread_ts.to_string(), messages);
        self
    }

    pub fn failing_channel(mut self, channel_id: &str) -> Self {
        self.failing_channels.insert(channel_id.to_string());
        self
    }

    pub fn failing_thread(mut self, thread_ts: &str) -> Self {
        self.failing_threads.insert(thread_ts.to_string());
        self
    }
}

impl ChatProvider for FakeChat {
    fn list_users(&self, _cursor: Option<&str>, _limit: u32) -> Result<UserPage> {
        Ok(UserPage {
            ok: true,
            members: self.users.clone(),
            next_cursor: None,
            error: None,
        })
    }

    fn history(&self, channel_id: &str, oldest: &str) -> Result<Vec<Message>> {
        self.history_calls
            .borrow_mut()
            .push((channel_id.to_string(), oldest.to_string()));
        if self.failing_channels.contains(channel_id) {
            return Err(anyhow!("conversations.history request failed: timed out"));
        }
        Ok(self.history.get(channel_id).cloned().unwrap_or_default())
    }

    fn replies(&self, _channel_id: &str, thread_ts: &str) -> Result<Vec<Message>> {
        self.reply_calls.borrow_mut().push(thread_ts.to_string());
        if self.failing_threads.contains(thread_ts) {
            return Err(anyhow!("conversations.replies request failed: timed out"));
        }
        Ok(self.replies.get(thread_ts).cloned().unwrap_or_default())
    }

    fn recent(&self, channel_id: &str, oldest: &str, limit: u32) -> Result<Vec<Message>> {
        self.recent_limits.borrow_mut().push(limit);
        let mut messages = self.history(channel_id, oldest)?;
        messages.truncate(limit as usize);
        Ok(messages)
    }
}

#[derive(Default)]
pub struct FakeModel {
    pub calls: RefCell<Vec<Vec<ChatTurn>>>,
    pub fail: bool,
}

impl FakeModel {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl SummaryModel for FakeModel {
    fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        self.calls.borrow_mut().push(turns.to_vec());
        if self.fail {
            return Err(anyhow!("model unavailable"));
        }
        Ok(format!("summary #{}", self.calls.borrow().len()))
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub pages: RefCell<Vec<(String, String, String)>>,
    pub blocks: RefCell<Vec<(String, ToggleBlock)>>,
    pub fail_create: bool,
    pub fail_append_headers_containing: Option<String>,
}

impl DocumentStore for FakeStore {
    fn create_page(&self, parent_id: &str, title_property: &str, title: &str) -> Result<String> {
        if self.fail_create {
            return Err(anyhow!("pages.create returned an error: unauthorized"));
        }
        self.pages.borrow_mut().push((
            parent_id.to_string(),
            title_property.to_string(),
            title.to_string(),
        ));
        Ok(format!("page-{}", self.pages.borrow().len()))
    }

    fn append_block(&self, page_id: &str, block: &ToggleBlock) -> Result<()> {
        if let Some(needle) = &self.fail_append_headers_containing
            && block.header.contains(needle.as_str())
        {
            return Err(anyhow!("blocks.children.append returned an error: conflict"));
        }
        self.blocks
            .borrow_mut()
            .push((page_id.to_string(), block.clone()));
        Ok(())
    }
}
