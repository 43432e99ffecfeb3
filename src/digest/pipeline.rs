use crate::digest::artifact::ArtifactStore;
use crate::digest::config::DigestConfig;
use crate::digest::identity;
use crate::digest::model::{
    ChannelDescriptor, ChannelOutcome, ChannelStatus, IdentityMap, RunOutcome, Transcript,
};
use crate::digest::pacing::{PaceGate, Pacer};
use crate::digest::report::{Report, ReportPublisher};
use crate::digest::summarize::summarize;
use crate::digest::thread::{CollectWindow, expand};
use crate::error::DigestError;
use crate::llm::provider::SummaryModel;
use crate::notion::client::DocumentStore;
use crate::slack::client::ChatProvider;
use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};

/// The instant a run starts and the calendar date it reports under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunClock {
    pub now: DateTime<Utc>,
    pub run_date: NaiveDate,
}

impl RunClock {
    pub fn now(timezone: Option<chrono_tz::Tz>) -> Self {
        let now = Utc::now();
        let run_date = match timezone {
            Some(tz) => now.with_timezone(&tz).date_naive(),
            None => now.with_timezone(&Local).date_naive(),
        };
        Self { now, run_date }
    }
}

pub struct Pipeline<'a> {
    cfg: &'a DigestConfig,
    artifacts: &'a dyn ArtifactStore,
    pacer: &'a dyn Pacer,
    clock: RunClock,
}

fn outcome(
    channel: &ChannelDescriptor,
    status: ChannelStatus,
    message_count: usize,
    artifact_path: Option<String>,
    error: Option<String>,
) -> ChannelOutcome {
    ChannelOutcome {
        channel: channel.clone(),
        status,
        message_count,
        artifact_path,
        error,
    }
}

impl<'a> Pipeline<'a> {
    pub fn new(
        cfg: &'a DigestConfig,
        artifacts: &'a dyn ArtifactStore,
        pacer: &'a dyn Pacer,
        clock: RunClock,
    ) -> Self {
        Self {
            cfg,
            artifacts,
            pacer,
            clock,
        }
    }

    fn window(&self) -> CollectWindow {
        CollectWindow::lookback(self.clock.now, self.cfg.collect.lookback_days)
    }

    fn save(&self, channel: &ChannelDescriptor, transcript: &Transcript) -> Option<String> {
        match self.artifacts.put(channel, self.clock.run_date, transcript) {
            Ok(path) => {
                tracing::info!(channel = %channel.name, path = %path.display(), messages = transcript.len(), "artifact saved");
                Some(path.display().to_string())
            }
            Err(err) => {
                let err_text = format!("{err:#}");
                tracing::warn!(channel = %channel.name, error = %err_text, "artifact save failed");
                None
            }
        }
    }

    fn summarize_and_publish(
        &self,
        model: &dyn SummaryModel,
        publisher: &ReportPublisher<'_>,
        report: &mut Report,
        channel: &ChannelDescriptor,
        transcript: &Transcript,
        max_messages: usize,
    ) -> ChannelOutcome {
        let count = transcript.len();
        let summary = match summarize(model, transcript, max_messages) {
            Ok(summary) => summary,
            Err(err) => {
                let err_text = format!("{err:#}");
                tracing::warn!(channel = %channel.name, error = %err_text, "summarize failed; skipping channel");
                return outcome(channel, ChannelStatus::SummarizeFailed, count, None, Some(err_text));
            }
        };
        match publisher.append_section(report, &channel.name, &summary) {
            Ok(()) => outcome(channel, ChannelStatus::Published, count, None, None),
            Err(err) => {
                let err_text = format!("{err:#}");
                tracing::warn!(channel = %channel.name, error = %err_text, "publish failed; skipping channel");
                outcome(channel, ChannelStatus::PublishFailed, count, None, Some(err_text))
            }
        }
    }

    fn archive_consumed(&self, run: &mut RunOutcome) {
        if !self.cfg.report.archive_after_run {
            return;
        }
        match self.artifacts.archive(self.clock.run_date) {
            Ok(archived) => {
                run.archived = archived.moved.len();
                run.archive_failures = archived.failed.len();
            }
            Err(err) => {
                let err_text = format!("{err:#}");
                tracing::warn!(error = %err_text, "artifact archive scan failed");
            }
        }
    }

    fn resolve_identities(&self, chat: &dyn ChatProvider) -> IdentityMap {
        identity::resolve_all(chat, self.cfg.collect.user_page_limit)
    }

    /// Collect and persist every channel without summarizing.
    pub fn collect(&self, chat: &dyn ChatProvider) -> RunOutcome {
        let identities = self.resolve_identities(chat);
        let window = self.window();
        let mut run = RunOutcome {
            identities_resolved: identities.len(),
            ..RunOutcome::default()
        };

        let total = self.cfg.channels.len();
        for (idx, channel) in self.cfg.channels.iter().enumerate() {
            tracing::info!(progress = %format!("{}/{}", idx + 1, total), channel = %channel.name, id = %channel.id, "collecting channel");
            let channel_outcome = match expand(chat, &identities, self.pacer, channel, &window) {
                Ok(transcript) => {
                    let path = self.save(channel, &transcript);
                    outcome(channel, ChannelStatus::Collected, transcript.len(), path, None)
                }
                Err(err) => {
                    let err_text = format!("{err:#}");
                    tracing::warn!(channel = %channel.name, error = %err_text, "collect failed; skipping channel");
                    outcome(channel, ChannelStatus::CollectFailed, 0, None, Some(err_text))
                }
            };
            run.channels.push(channel_outcome);
            self.pacer.pause(PaceGate::Channel);
        }
        run
    }

    /// One full pass: identities, report page, then collect, save, summarize
    /// and publish per channel. Only report creation is fatal.
    pub fn run(
        &self,
        chat: &dyn ChatProvider,
        model: &dyn SummaryModel,
        store: &dyn DocumentStore,
        parent_id: &str,
    ) -> Result<RunOutcome> {
        let identities = self.resolve_identities(chat);
        let publisher = ReportPublisher::new(store, self.pacer, parent_id, &self.cfg.report.title_property);
        let mut report = publisher.create_report(self.clock.run_date)?;
        let window = self.window();
        let mut run = RunOutcome {
            report_title: Some(report.title.clone()),
            report_page_id: Some(report.page_id.clone()),
            identities_resolved: identities.len(),
            ..RunOutcome::default()
        };

        let total = self.cfg.channels.len();
        for (idx, channel) in self.cfg.channels.iter().enumerate() {
            tracing::info!(progress = %format!("{}/{}", idx + 1, total), channel = %channel.name, id = %channel.id, "processing channel");
            let channel_outcome = match expand(chat, &identities, self.pacer, channel, &window) {
                Ok(transcript) => {
                    let path = self.save(channel, &transcript);
                    ChannelOutcome {
                        artifact_path: path,
                        ..self.summarize_and_publish(
                            model,
                            &publisher,
                            &mut report,
                            channel,
                            &transcript,
                            self.cfg.summary.run_max_messages,
                        )
                    }
                }
                Err(err) => {
                    let err_text = format!("{err:#}");
                    tracing::warn!(channel = %channel.name, error = %err_text, "collect failed; skipping channel");
                    outcome(channel, ChannelStatus::CollectFailed, 0, None, Some(err_text))
                }
            };
            run.channels.push(channel_outcome);
            self.pacer.pause(PaceGate::Channel);
        }

        self.archive_consumed(&mut run);
        tracing::info!(
            sections = report.sections.len(),
            failed = run.failed_channels(),
            archived = run.archived,
            "digest run finished"
        );
        Ok(run)
    }

    /// Second phase of a split run: summarize artifacts written by `collect`.
    pub fn summarize_artifacts(
        &self,
        model: &dyn SummaryModel,
        store: &dyn DocumentStore,
        parent_id: &str,
    ) -> Result<RunOutcome> {
        let publisher = ReportPublisher::new(store, self.pacer, parent_id, &self.cfg.report.title_property);
        let mut report = publisher.create_report(self.clock.run_date)?;
        let mut run = RunOutcome {
            report_title: Some(report.title.clone()),
            report_page_id: Some(report.page_id.clone()),
            ..RunOutcome::default()
        };

        for channel in &self.cfg.channels {
            let path = self.artifacts.location(channel, self.clock.run_date);
            let artifact_path = Some(path.display().to_string());
            let channel_outcome = match self.artifacts.get(channel, self.clock.run_date) {
                Ok(Some(transcript)) => {
                    tracing::info!(channel = %channel.name, path = %path.display(), messages = transcript.len(), "summarizing artifact");
                    ChannelOutcome {
                        artifact_path,
                        ..self.summarize_and_publish(
                            model,
                            &publisher,
                            &mut report,
                            channel,
                            &transcript,
                            self.cfg.summary.summarize_max_messages,
                        )
                    }
                }
                Ok(None) => {
                    tracing::warn!(channel = %channel.name, path = %path.display(), "artifact not found; nothing to summarize");
                    let missing = DigestError::MissingArtifact(path.clone()).to_string();
                    outcome(channel, ChannelStatus::MissingArtifact, 0, artifact_path, Some(missing))
                }
                Err(err) => {
                    let err_text = format!("{err:#}");
                    tracing::warn!(channel = %channel.name, error = %err_text, "artifact unreadable; skipping channel");
                    outcome(channel, ChannelStatus::SummarizeFailed, 0, artifact_path, Some(err_text))
                }
            };
            run.channels.push(channel_outcome);
            self.pacer.pause(PaceGate::Channel);
        }

        self.archive_consumed(&mut run);
        Ok(run)
    }
}
