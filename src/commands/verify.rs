use anyhow::Result;
use chrono::Utc;

use crate::commands::{CommandReport, slack_client};
use crate::digest::config::load_diagnostic_config;
use crate::digest::identity;
use crate::digest::model::{IdentityMap, Message};
use crate::digest::thread::CollectWindow;
use crate::slack::client::ChatProvider;

#[derive(Debug, Clone, Default)]
pub struct VerifyUsersOptions {
    pub user: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VerifyMappingOptions {
    pub channel: String,
    pub limit: usize,
}

pub fn run_users(opts: &VerifyUsersOptions) -> Result<CommandReport> {
    let cfg = load_diagnostic_config()?;
    let chat = slack_client(&cfg)?;
    Ok(check_users(
        &chat,
        cfg.collect.user_page_limit,
        opts.user.as_deref(),
    ))
}

pub fn run_mapping(opts: &VerifyMappingOptions) -> Result<CommandReport> {
    let cfg = load_diagnostic_config()?;
    let chat = slack_client(&cfg)?;
    let window = CollectWindow::lookback(Utc::now(), cfg.collect.lookback_days);
    Ok(check_mapping(
        &chat,
        cfg.collect.user_page_limit,
        &opts.channel,
        &window,
        opts.limit,
    ))
}

fn check_users(chat: &dyn ChatProvider, page_limit: u32, target: Option<&str>) -> CommandReport {
    let mut report = CommandReport::new("verify-users");

    match chat.list_users(None, page_limit) {
        Ok(page) if page.ok => {
            report.detail(format!("users.list=ok first_page={}", page.members.len()));
        }
        Ok(page) => {
            report.issue(format!(
                "users.list returned not ok: {}",
                page.error.as_deref().unwrap_or("unknown error")
            ));
            return report;
        }
        Err(err) => {
            report.issue(format!("users.list failed: {err:#}"));
            return report;
        }
    }

    let Some(target) = target else {
        return report;
    };
    let identities = identity::resolve_all(chat, page_limit);
    report.detail(format!("identities_resolved={}", identities.len()));
    if identities.contains(target) {
        report.detail(format!(
            "user {target} -> {}",
            identities.display_name(target)
        ));
    } else {
        report.issue(format!("user {target} not found in directory"));
    }
    report
}

fn mapping_line(index: usize, message: &Message, identities: &IdentityMap) -> (String, bool) {
    match message.user.as_deref() {
        Some(uid) if identities.contains(uid) => (
            format!("[{index}] {uid} -> {} (mapped)", identities.display_name(uid)),
            true,
        ),
        Some(uid) => (format!("[{index}] {uid} -> {uid} (unmapped)"), false),
        None => (
            format!("[{index}] {} (bot or system message)", message.author_label()),
            false,
        ),
    }
}

fn check_mapping(
    chat: &dyn ChatProvider,
    page_limit: u32,
    channel_id: &str,
    window: &CollectWindow,
    limit: usize,
) -> CommandReport {
    let mut report = CommandReport::new("verify-mapping");
    let identities = identity::resolve_all(chat, page_limit);
    report.detail(format!("identities_resolved={}", identities.len()));

    let limit = u32::try_from(limit).unwrap_or(u32::MAX);
    let messages = match chat.recent(channel_id, &window.oldest_ts(), limit) {
        Ok(messages) => messages,
        Err(err) => {
            report.issue(format!("history for {channel_id} failed: {err:#}"));
            return report;
        }
    };

    report.detail(format!("channel={channel_id} sampled={}", messages.len()));
    let mut with_user = 0usize;
    let mut mapped = 0usize;
    for (idx, message) in messages.iter().enumerate() {
        let (line, was_mapped) = mapping_line(idx + 1, message, &identities);
        report.detail(line);
        if message.user.is_some() {
            with_user += 1;
        }
        if was_mapped {
            mapped += 1;
        }
    }
    if with_user > 0 && mapped == 0 {
        report.issue(format!(
            "none of {with_user} sampled user ids resolved to a display name"
        ));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::{check_mapping, check_users};
    use crate::digest::testing::{FakeChat, msg};
    use crate::digest::thread::CollectWindow;
    use chrono::{TimeZone, Utc};

    fn window() -> CollectWindow {
        CollectWindow::lookback(Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(), 7)
    }

    #[test]
    fn verify_users_finds_target() {
        let chat = FakeChat::default().with_user("U59", "Park Sora");
        let report = check_users(&chat, 100, Some("U59"));
        assert!(report.ok);
        assert!(report.details.iter().any(|d| d == "user U59 -> Park Sora"));

        let report = check_users(&chat, 100, Some("U00"));
        assert!(!report.ok);
    }

    #[test]
    fn verify_mapping_reports_each_sampled_message() {
        let mut bot = msg("", "deploy done", "3.0");
        bot.user = None;
        bot.bot_id = Some("B1".to_string());
        let chat = FakeChat::default()
            .with_user("U1", "Kim Minji")
            .with_history(
                "C1",
                vec![
                    msg("U1", "hi", "5.0"),
                    msg("U9", "who", "4.0"),
                    bot,
                    msg("U1", "beyond limit", "2.0"),
                ],
            );

        let report = check_mapping(&chat, 100, "C1", &window(), 3);
        assert!(report.ok);
        assert!(report.details.contains(&"channel=C1 sampled=3".to_string()));
        assert!(report.details.contains(&"[1] U1 -> Kim Minji (mapped)".to_string()));
        assert!(report.details.contains(&"[2] U9 -> U9 (unmapped)".to_string()));
        assert!(report.details.contains(&"[3] B1 (bot or system message)".to_string()));
        assert_eq!(*chat.recent_limits.borrow(), vec![3]);
    }

    #[test]
    fn verify_mapping_flags_history_failure() {
        let chat = FakeChat::default().failing_channel("C1");
        let report = check_mapping(&chat, 100, "C1", &window(), 5);
        assert!(!report.ok);
    }
}
