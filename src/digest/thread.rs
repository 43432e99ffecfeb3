use crate::digest::model::{ChannelDescriptor, IdentityMap, Transcript};
use crate::digest::pacing::{PaceGate, Pacer};
use crate::slack::client::ChatProvider;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

const MAX_LOOKBACK_DAYS: u64 = 36_500;

/// Lower-bounded lookback window; there is no upper bound, so it runs up to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectWindow {
    pub oldest: DateTime<Utc>,
}

impl CollectWindow {
    pub fn lookback(now: DateTime<Utc>, days: u64) -> Self {
        let days = i64::try_from(days.min(MAX_LOOKBACK_DAYS)).unwrap_or(0);
        Self {
            oldest: now - Duration::days(days),
        }
    }

    /// Slack-style `seconds.micros` timestamp.
    pub fn oldest_ts(&self) -> String {
        format!("{}.000000", self.oldest.timestamp())
    }
}

/// Flatten a channel's history with thread replies inlined after their root.
///
/// A root-list failure aborts the channel. A failed thread fetch only loses
/// that thread's replies.
pub fn expand(
    provider: &dyn ChatProvider,
    identities: &IdentityMap,
    pacer: &dyn Pacer,
    channel: &ChannelDescriptor,
    window: &CollectWindow,
) -> Result<Transcript> {
    let roots = provider
        .history(&channel.id, &window.oldest_ts())
        .with_context(|| format!("failed to fetch history for #{}", channel.name))?;
    tracing::info!(channel = %channel.name, roots = roots.len(), "root messages fetched");

    let mut transcript: Transcript = Vec::with_capacity(roots.len());
    for root in roots {
        let thread_ts = root.is_thread_root().then(|| root.ts.clone());
        transcript.push(root);

        let Some(thread_ts) = thread_ts else {
            continue;
        };
        match provider.replies(&channel.id, &thread_ts) {
            Ok(replies) => transcript.extend(replies.into_iter().skip(1)),
            Err(err) => {
                let err_text = format!("{err:#}");
                tracing::warn!(
                    channel = %channel.name,
                    thread_ts = %thread_ts,
                    error = %err_text,
                    "thread reply fetch failed; keeping root only"
                );
            }
        }
        pacer.pause(PaceGate::ThreadReply);
    }

    for message in &mut transcript {
        if let Some(user) = message.user.as_mut() {
            let resolved = identities.display_name(user).to_string();
            *user = resolved;
        }
    }

    tracing::info!(channel = %channel.name, messages = transcript.len(), "transcript expanded");
    Ok(transcript)
}
