pub mod digest_archive;
pub mod digest_collect;
pub mod digest_run;
pub mod digest_status;
pub mod digest_summarize;
pub mod verify;

use anyhow::Result;
use serde::Serialize;

use crate::digest::artifact::FsArtifactStore;
use crate::digest::config::DigestConfig;
use crate::digest::model::RunOutcome;
use crate::digest::paths::DigestPaths;
use crate::slack::client::SlackClient;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

pub fn slack_client(cfg: &DigestConfig) -> Result<SlackClient> {
    SlackClient::new(&cfg.slack_api_base, cfg.slack_token()?)
}

pub fn artifact_store(paths: &DigestPaths) -> FsArtifactStore {
    FsArtifactStore::new(paths.work_dir.clone(), paths.dump_dir.clone())
}

/// Per-channel failures are reported as issues so the exit code reflects them.
pub fn record_run(report: &mut CommandReport, run: &RunOutcome) {
    if let Some(title) = &run.report_title {
        report.detail(format!("report_title={title}"));
    }
    if let Some(page_id) = &run.report_page_id {
        report.detail(format!("report_page_id={page_id}"));
    }
    if run.identities_resolved > 0 {
        report.detail(format!("identities_resolved={}", run.identities_resolved));
    }

    for outcome in &run.channels {
        let mut line = format!(
            "#{} ({}): {} messages={}",
            outcome.channel.name,
            outcome.channel.id,
            outcome.status.as_str(),
            outcome.message_count
        );
        if let Some(path) = &outcome.artifact_path {
            line.push_str(&format!(" artifact={path}"));
        }
        if outcome.status.is_failure() {
            match &outcome.error {
                Some(error) => report.issue(format!("{line}: {error}")),
                None => report.issue(line),
            }
        } else {
            report.detail(line);
        }
    }

    if run.archived > 0 {
        report.detail(format!("archived={}", run.archived));
    }
    if run.archive_failures > 0 {
        report.issue(format!("archive_failures={}", run.archive_failures));
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandReport, record_run};
    use crate::digest::model::{ChannelDescriptor, ChannelOutcome, ChannelStatus, RunOutcome};

    #[test]
    fn failed_channels_become_issues() {
        let run = RunOutcome {
            report_title: Some("3월 2주차 업무 요약 (2025-03-10)".to_string()),
            channels: vec![
                ChannelOutcome {
                    channel: ChannelDescriptor::new("C1", "general"),
                    status: ChannelStatus::Published,
                    message_count: 4,
                    artifact_path: None,
                    error: None,
                },
                ChannelOutcome {
                    channel: ChannelDescriptor::new("C2", "random"),
                    status: ChannelStatus::CollectFailed,
                    message_count: 0,
                    artifact_path: None,
                    error: Some("timed out".to_string()),
                },
            ],
            ..RunOutcome::default()
        };
        let mut report = CommandReport::new("run");
        record_run(&mut report, &run);
        assert!(!report.ok);
        assert!(report.details.iter().any(|d| d == "#general (C1): published messages=4"));
        assert_eq!(
            report.issues,
            vec!["#random (C2): collect_failed messages=0: timed out"]
        );
    }
}
